use crate::domain::record_store::nullable_string;
use crate::domain::result::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Store table holding employees
pub const EMPLOYEES_TABLE: &str = "employees";

/// Employee entity as returned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub department: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Unsaved values of the employee creation form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Validate)]
pub struct EmployeeDraft {
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(email)]
    pub email: String,
    #[garde(skip)]
    pub department: String,
}

impl EmployeeDraft {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            department: department.into(),
        }
    }

    /// Set a form field by name
    pub fn set_field(&mut self, field: &str, value: &str) -> DomainResult<()> {
        match field {
            "name" => self.name = value.to_string(),
            "email" => self.email = value.to_string(),
            "department" => self.department = value.to_string(),
            other => return Err(DomainError::UnknownField(other.to_string())),
        }
        Ok(())
    }
}
