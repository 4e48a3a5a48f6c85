use crate::domain::{DomainResult, EqFilter, OrderBy, Record, RecordStore, SelectQuery};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// In-memory implementation of RecordStore using a HashMap of tables
///
/// Mirrors what the managed store does on insert: missing `id`, `created_at`
/// and `updated_at` columns are filled in. Clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held in a table
    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map_or(0, Vec::len)
    }
}

fn matches(record: &Record, filter: &EqFilter) -> bool {
    record.get(&filter.column).unwrap_or(&Value::Null) == &filter.value
}

fn as_timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// Total order over column values, nulls last
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => match (as_timestamp(a), as_timestamp(b)) {
            (Some(ta), Some(tb)) => ta.cmp(&tb),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_rows(rows: &mut [Record], order: &OrderBy) {
    rows.sort_by(|a, b| {
        let left = a.get(&order.column).unwrap_or(&Value::Null);
        let right = b.get(&order.column).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right);
        if order.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    #[instrument(skip(self, query), fields(table = %query.table))]
    async fn select(&self, query: SelectQuery) -> DomainResult<Vec<Record>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Record> = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            sort_rows(&mut rows, order);
        }

        debug!(count = rows.len(), "selected rows");
        Ok(rows)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn insert(&self, table: &str, records: Vec<Record>) -> DomainResult<()> {
        let now = Value::String(Utc::now().to_rfc3339());
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        for mut record in records {
            for column in ["id", "created_at", "updated_at"] {
                let missing = record.get(column).map_or(true, Value::is_null);
                if missing {
                    let value = if column == "id" {
                        Value::String(xid::new().to_string())
                    } else {
                        now.clone()
                    };
                    record.insert(column.to_string(), value);
                }
            }
            debug!(id = %record["id"], "inserted row");
            rows.push(record);
        }

        Ok(())
    }

    #[instrument(skip(self, changes, filter), fields(column = %filter.column))]
    async fn update(&self, table: &str, changes: Record, filter: EqFilter) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        let mut updated = 0usize;
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| matches(row, &filter)) {
                for (column, value) in &changes {
                    row.insert(column.clone(), value.clone());
                }
                updated += 1;
            }
        }

        debug!(updated, "updated rows");
        Ok(())
    }

    #[instrument(skip(self, filter), fields(column = %filter.column))]
    async fn delete(&self, table: &str, filter: EqFilter) -> DomainResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(table) {
            let before = rows.len();
            rows.retain(|row| !matches(row, &filter));
            debug!(deleted = before - rows.len(), "deleted rows");
        }
        Ok(())
    }
}
