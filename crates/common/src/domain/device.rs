use crate::domain::record_store::nullable_string;
use crate::domain::result::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store table holding test devices
pub const DEVICES_TABLE: &str = "devices";

/// Device status label.
///
/// Three labels are offered when editing, but the store accepts any text, so
/// unrecognized labels are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceStatus {
    #[default]
    Available,
    Assigned,
    Maintenance,
    Other(String),
}

/// Display category for a status label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusTag {
    Success,
    Info,
    Warning,
    Neutral,
}

impl DeviceStatus {
    /// Labels offered by the editing control
    pub const OFFERED: [DeviceStatus; 3] = [
        DeviceStatus::Available,
        DeviceStatus::Assigned,
        DeviceStatus::Maintenance,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            DeviceStatus::Available => "Available",
            DeviceStatus::Assigned => "Assigned",
            DeviceStatus::Maintenance => "Maintenance",
            DeviceStatus::Other(label) => label,
        }
    }

    pub fn presentation_tag(&self) -> StatusTag {
        match self {
            DeviceStatus::Available => StatusTag::Success,
            DeviceStatus::Assigned => StatusTag::Info,
            DeviceStatus::Maintenance => StatusTag::Warning,
            DeviceStatus::Other(_) => StatusTag::Neutral,
        }
    }
}

impl From<String> for DeviceStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Available" => DeviceStatus::Available,
            "Assigned" => DeviceStatus::Assigned,
            "Maintenance" => DeviceStatus::Maintenance,
            _ => DeviceStatus::Other(label),
        }
    }
}

impl From<&str> for DeviceStatus {
    fn from(label: &str) -> Self {
        DeviceStatus::from(label.to_string())
    }
}

impl From<DeviceStatus> for String {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test device entity as returned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub device_name: String,
    pub device_type: String,
    pub serial_number: String,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub assigned_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub notes: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Unsaved values of the device create/edit form.
///
/// `employee_id` is the assignment selector: empty means unassigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct DeviceDraft {
    #[garde(length(min = 1))]
    pub device_name: String,
    #[garde(length(min = 1))]
    pub device_type: String,
    #[garde(length(min = 1))]
    pub serial_number: String,
    #[garde(skip)]
    pub employee_id: String,
    #[garde(skip)]
    pub status: DeviceStatus,
    #[garde(skip)]
    pub notes: String,
}

/// Normalized column values written for a device save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceChanges {
    pub device_name: String,
    pub device_type: String,
    pub serial_number: String,
    pub employee_id: Option<String>,
    pub status: DeviceStatus,
    pub notes: String,
    pub assigned_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceDraft {
    /// Set a form field by name
    pub fn set_field(&mut self, field: &str, value: &str) -> DomainResult<()> {
        match field {
            "device_name" | "name" => self.device_name = value.to_string(),
            "device_type" | "type" => self.device_type = value.to_string(),
            "serial_number" | "serial" => self.serial_number = value.to_string(),
            "employee_id" | "employee" => self.employee_id = value.to_string(),
            "status" => self.status = DeviceStatus::from(value),
            "notes" => self.notes = value.to_string(),
            other => return Err(DomainError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Derive the stored values at save time `now`.
    ///
    /// An empty selection is stored as a null reference with no assignment
    /// date; any selection stamps `assigned_date` with `now`.
    pub fn normalize(&self, now: DateTime<Utc>) -> DeviceChanges {
        let employee_id = if self.employee_id.is_empty() {
            None
        } else {
            Some(self.employee_id.clone())
        };
        let assigned_date = employee_id.as_ref().map(|_| now);

        DeviceChanges {
            device_name: self.device_name.clone(),
            device_type: self.device_type.clone(),
            serial_number: self.serial_number.clone(),
            employee_id,
            status: self.status.clone(),
            notes: self.notes.clone(),
            assigned_date,
            updated_at: now,
        }
    }
}

impl From<&Device> for DeviceDraft {
    fn from(device: &Device) -> Self {
        Self {
            device_name: device.device_name.clone(),
            device_type: device.device_type.clone(),
            serial_number: device.serial_number.clone(),
            employee_id: device.employee_id.clone().unwrap_or_default(),
            status: device.status.clone(),
            notes: device.notes.clone(),
        }
    }
}
