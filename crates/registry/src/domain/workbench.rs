use crate::domain::{Confirmer, DeviceRegistry, EmployeeRegistry};
use common::domain::RecordStore;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Composition root: both registries over one store, with the device
/// registry following the employee registry's change feed.
pub struct Workbench {
    pub employees: EmployeeRegistry,
    pub devices: DeviceRegistry,
}

impl Workbench {
    pub fn new(store: Arc<dyn RecordStore>, confirmer: Arc<dyn Confirmer>) -> Self {
        let employees = EmployeeRegistry::new(store.clone(), confirmer.clone());
        let mut devices = DeviceRegistry::new(store, confirmer);
        devices.follow_employee_changes(employees.subscribe());
        Self { employees, devices }
    }

    /// Initial fetch of every collection
    #[instrument(skip(self))]
    pub async fn start(&mut self) {
        if let Err(e) = self.employees.load().await {
            warn!(error = %e, "initial employee load failed");
        }
        self.devices.refresh().await;
        debug!(
            employees = self.employees.employees().len(),
            devices = self.devices.devices().len(),
            "workbench started"
        );
    }

    /// Propagate pending employee changes to the device registry.
    ///
    /// Returns whether a device refresh ran.
    pub async fn sync(&mut self) -> bool {
        self.devices.refresh_if_employees_changed().await
    }
}
