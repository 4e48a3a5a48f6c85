use crate::domain::{Confirmer, DeleteOutcome, FormState};
use chrono::Utc;
use common::domain::{
    from_records, to_record, Device, DeviceDraft, DeviceStatus, DomainError, DomainResult,
    Employee, EqFilter, RecordStore, SelectQuery, StatusTag, DEVICES_TABLE, EMPLOYEES_TABLE,
};
use common::garde::validate_struct;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

pub const DELETE_DEVICE_PROMPT: &str = "Are you sure you want to delete this device?";

/// Assignee label for a device without an employee reference
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// Assignee label for a reference that matches no known employee
pub const UNKNOWN_EMPLOYEE_LABEL: &str = "Unknown";

/// Owns the in-memory device list plus its own copy of the employee
/// directory used to resolve assignees.
pub struct DeviceRegistry {
    store: Arc<dyn RecordStore>,
    confirmer: Arc<dyn Confirmer>,
    devices: Vec<Device>,
    directory: Vec<Employee>,
    form: FormState<DeviceDraft>,
    employee_changes: Option<watch::Receiver<u64>>,
    refreshes: u64,
}

impl DeviceRegistry {
    pub fn new(store: Arc<dyn RecordStore>, confirmer: Arc<dyn Confirmer>) -> Self {
        Self {
            store,
            confirmer,
            devices: Vec::new(),
            directory: Vec::new(),
            form: FormState::Closed,
            employee_changes: None,
            refreshes: 0,
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Employees known for assignment and name resolution
    pub fn employee_directory(&self) -> &[Employee] {
        &self.directory
    }

    pub fn form(&self) -> &FormState<DeviceDraft> {
        &self.form
    }

    pub fn draft_mut(&mut self) -> Option<&mut DeviceDraft> {
        self.form.draft_mut()
    }

    /// Number of full refreshes run so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    /// Fetch all devices, newest first. On error the previous list is kept.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> DomainResult<()> {
        let query = SelectQuery::from(DEVICES_TABLE).order("created_at", false);
        let records = self.store.select(query).await?;
        self.devices = from_records(records)?;

        debug!(count = self.devices.len(), "loaded devices");
        Ok(())
    }

    /// Fetch the employee directory ordered by name.
    /// On error the previous directory is kept.
    #[instrument(skip(self))]
    pub async fn load_employee_directory(&mut self) -> DomainResult<()> {
        let query = SelectQuery::from(EMPLOYEES_TABLE).order("name", true);
        let records = self.store.select(query).await?;
        self.directory = from_records(records)?;

        debug!(count = self.directory.len(), "loaded employee directory");
        Ok(())
    }

    /// Run both fetches; failures are logged and leave the old data in place
    pub async fn refresh(&mut self) {
        if let Err(e) = self.load().await {
            warn!(error = %e, "device load failed, keeping previous list");
        }
        if let Err(e) = self.load_employee_directory().await {
            warn!(error = %e, "employee directory load failed, keeping previous directory");
        }
        self.refreshes += 1;
    }

    /// Watch an employee change feed
    pub fn follow_employee_changes(&mut self, changes: watch::Receiver<u64>) {
        self.employee_changes = Some(changes);
    }

    /// Refresh once if the followed feed moved since the last look.
    ///
    /// Any number of changes since then collapse into a single refresh.
    pub async fn refresh_if_employees_changed(&mut self) -> bool {
        let changed = match self.employee_changes.as_mut() {
            Some(changes) => match changes.has_changed() {
                Ok(true) => {
                    let _ = changes.borrow_and_update();
                    true
                }
                Ok(false) => false,
                Err(_) => {
                    debug!("employee change feed closed");
                    false
                }
            },
            None => false,
        };

        if changed {
            debug!("employee change observed, refreshing devices");
            self.refresh().await;
        }
        changed
    }

    /// Open an empty creation form, discarding any open draft
    pub fn open_create_form(&mut self) {
        self.form = FormState::Create {
            draft: DeviceDraft::default(),
        };
    }

    /// Open an edit form prefilled from a loaded device
    pub fn open_edit_form(&mut self, id: &str) -> DomainResult<()> {
        let device = self
            .devices
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| DomainError::DeviceNotFound(id.to_string()))?;

        self.form = FormState::Edit {
            id: device.id.clone(),
            draft: DeviceDraft::from(device),
        };
        Ok(())
    }

    pub fn cancel_form(&mut self) {
        self.form = FormState::Closed;
    }

    /// Create a device from `draft` through the creation form
    pub async fn create(&mut self, draft: DeviceDraft) -> DomainResult<()> {
        self.form = FormState::Create { draft };
        self.submit_form().await
    }

    /// Save `draft` over device `id` through the edit form
    pub async fn update(&mut self, id: &str, draft: DeviceDraft) -> DomainResult<()> {
        self.form = FormState::Edit {
            id: id.to_string(),
            draft,
        };
        self.submit_form().await
    }

    /// Save the open form.
    ///
    /// The draft is normalized at submit time: an empty employee selection is
    /// stored as null and clears `assigned_date`, any selection stamps it with
    /// the current time, and `updated_at` is always stamped. On success the
    /// form closes and the device list reloads; on failure nothing changes.
    #[instrument(skip(self))]
    pub async fn submit_form(&mut self) -> DomainResult<()> {
        let (editing, draft) = match &self.form {
            FormState::Closed => return Err(DomainError::NoOpenForm),
            FormState::Create { draft } => (None, draft),
            FormState::Edit { id, draft } => (Some(id.as_str()), draft),
        };

        validate_struct(draft)?;
        let record = to_record(&draft.normalize(Utc::now()))?;

        match editing {
            Some(id) => {
                self.store
                    .update(DEVICES_TABLE, record, EqFilter::new("id", id))
                    .await?;
                info!(device_id = %id, "device updated");
            }
            None => {
                self.store.insert(DEVICES_TABLE, vec![record]).await?;
                info!(device_name = %draft.device_name, "device created");
            }
        }

        self.form = FormState::Closed;
        if let Err(e) = self.load().await {
            warn!(error = %e, "device reload failed, keeping previous list");
        }
        Ok(())
    }

    /// Delete a device after confirmation
    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: &str) -> DomainResult<DeleteOutcome> {
        if !self.confirmer.confirm(DELETE_DEVICE_PROMPT).await {
            debug!("device delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        self.store
            .delete(DEVICES_TABLE, EqFilter::new("id", id))
            .await?;

        info!("device deleted");
        if let Err(e) = self.load().await {
            warn!(error = %e, "device reload failed, keeping previous list");
        }
        Ok(DeleteOutcome::Deleted)
    }

    /// Display name of the assignee, from the loaded directory only.
    /// An empty reference counts as unassigned.
    pub fn resolve_employee_name(&self, employee_id: Option<&str>) -> &str {
        let Some(employee_id) = employee_id.filter(|id| !id.is_empty()) else {
            return UNASSIGNED_LABEL;
        };
        self.directory
            .iter()
            .find(|e| e.id == employee_id)
            .map_or(UNKNOWN_EMPLOYEE_LABEL, |e| e.name.as_str())
    }

    pub fn status_presentation_tag(status: &DeviceStatus) -> StatusTag {
        status.presentation_tag()
    }
}
