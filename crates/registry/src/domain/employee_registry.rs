use crate::domain::{Confirmer, DeleteOutcome, FormState};
use common::domain::{
    from_records, to_record, DomainError, DomainResult, Employee, EmployeeDraft, EqFilter,
    RecordStore, SelectQuery, EMPLOYEES_TABLE,
};
use common::garde::validate_struct;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

pub const DELETE_EMPLOYEE_PROMPT: &str = "Are you sure you want to delete this employee?";

/// Owns the in-memory employee list and keeps it in step with the store.
///
/// Every successful create or delete bumps a change generation that
/// dependents observe through [`EmployeeRegistry::subscribe`].
pub struct EmployeeRegistry {
    store: Arc<dyn RecordStore>,
    confirmer: Arc<dyn Confirmer>,
    employees: Vec<Employee>,
    form: FormState<EmployeeDraft>,
    changes: watch::Sender<u64>,
}

impl EmployeeRegistry {
    pub fn new(store: Arc<dyn RecordStore>, confirmer: Arc<dyn Confirmer>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            store,
            confirmer,
            employees: Vec::new(),
            form: FormState::Closed,
            changes,
        }
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn form(&self) -> &FormState<EmployeeDraft> {
        &self.form
    }

    pub fn draft_mut(&mut self) -> Option<&mut EmployeeDraft> {
        self.form.draft_mut()
    }

    /// Receiver of the change generation
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Number of changes signalled so far
    pub fn change_generation(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Fetch all employees ordered by name.
    ///
    /// On error the previous collection is kept.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> DomainResult<()> {
        let query = SelectQuery::from(EMPLOYEES_TABLE).order("name", true);
        let records = self.store.select(query).await?;
        self.employees = from_records(records)?;

        debug!(count = self.employees.len(), "loaded employees");
        Ok(())
    }

    /// Open an empty creation form, discarding any open draft
    pub fn open_create_form(&mut self) {
        self.form = FormState::Create {
            draft: EmployeeDraft::default(),
        };
    }

    pub fn cancel_form(&mut self) {
        self.form = FormState::Closed;
    }

    /// Create an employee from `draft` through the creation form
    pub async fn create(&mut self, draft: EmployeeDraft) -> DomainResult<()> {
        self.form = FormState::Create { draft };
        self.submit_form().await
    }

    /// Insert the open draft.
    ///
    /// On success the form closes, the list reloads and a change is signalled.
    /// On failure the form and its draft stay as they were.
    #[instrument(skip(self))]
    pub async fn submit_form(&mut self) -> DomainResult<()> {
        let FormState::Create { draft } = &self.form else {
            return Err(DomainError::NoOpenForm);
        };

        validate_struct(draft)?;
        let record = to_record(draft)?;
        self.store.insert(EMPLOYEES_TABLE, vec![record]).await?;

        info!(name = %draft.name, "employee created");
        self.form = FormState::Closed;
        self.reload().await;
        self.signal_change();
        Ok(())
    }

    /// Delete an employee after confirmation.
    ///
    /// Devices assigned to the employee are left untouched.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: &str) -> DomainResult<DeleteOutcome> {
        if !self.confirmer.confirm(DELETE_EMPLOYEE_PROMPT).await {
            debug!("employee delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        self.store
            .delete(EMPLOYEES_TABLE, EqFilter::new("id", id))
            .await?;

        info!("employee deleted");
        self.reload().await;
        self.signal_change();
        Ok(DeleteOutcome::Deleted)
    }

    async fn reload(&mut self) {
        if let Err(e) = self.load().await {
            warn!(error = %e, "employee reload failed, keeping previous list");
        }
    }

    fn signal_change(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }
}
