use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A single row as exchanged with the store: column name -> JSON value
pub type Record = serde_json::Map<String, Value>;

/// Equality filter on one column
#[derive(Debug, Clone, PartialEq)]
pub struct EqFilter {
    pub column: String,
    pub value: Value,
}

impl EqFilter {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Sort order for a select
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// Select request against one table, built with chained filters
///
/// ```
/// use common::domain::SelectQuery;
///
/// let query = SelectQuery::from("devices")
///     .order("created_at", false)
///     .eq("status", "Available");
/// assert_eq!(query.table, "devices");
/// assert_eq!(query.filters.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub order: Option<OrderBy>,
    pub filters: Vec<EqFilter>,
}

impl SelectQuery {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            order: None,
            filters: Vec::new(),
        }
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(EqFilter::new(column, value));
        self
    }
}

/// Generic table gateway for the managed data store.
///
/// Implementations own persistence, ordering and id assignment. Callers only
/// look at whether an operation failed, never at why.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch all rows of a table matching the query filters, in query order
    async fn select(&self, query: SelectQuery) -> DomainResult<Vec<Record>>;

    /// Insert rows; the store assigns ids and creation timestamps
    async fn insert(&self, table: &str, records: Vec<Record>) -> DomainResult<()>;

    /// Apply a partial record to every row matching the filter
    async fn update(&self, table: &str, changes: Record, filter: EqFilter) -> DomainResult<()>;

    /// Delete every row matching the filter
    async fn delete(&self, table: &str, filter: EqFilter) -> DomainResult<()>;
}

/// Serialize a typed value into a store record
pub fn to_record<T: Serialize>(value: &T) -> DomainResult<Record> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DomainError::RecordDecodeError(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(DomainError::RecordDecodeError(e.to_string())),
    }
}

/// Deserialize store records into typed values
pub fn from_records<T: DeserializeOwned>(records: Vec<Record>) -> DomainResult<Vec<T>> {
    records
        .into_iter()
        .map(|record| {
            serde_json::from_value(Value::Object(record))
                .map_err(|e| DomainError::RecordDecodeError(e.to_string()))
        })
        .collect()
}

/// Read a nullable text column as an empty string when null
pub(crate) fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
