use crate::domain::{
    DomainError, DomainResult, EqFilter, Record, RecordStore, SelectQuery,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use serde_json::Value;
use tokio_postgres::types::ToSql;
use tracing::{debug, instrument};

/// Double-quote a table or column name, rejecting anything but plain identifiers
pub fn quote_identifier(name: &str) -> DomainResult<String> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && name.len() <= 63 {
        Ok(format!("\"{}\"", name))
    } else {
        Err(DomainError::InvalidIdentifier(name.to_string()))
    }
}

fn quote_columns<'a>(columns: impl Iterator<Item = &'a String>) -> DomainResult<Vec<String>> {
    columns.map(|c| quote_identifier(c)).collect()
}

type Params = Vec<Box<dyn ToSql + Sync + Send>>;

fn param_refs(params: &Params) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

/// WHERE clause for equality filters plus the parameters it binds, numbered
/// from `$first_param` in pairs of (column name, JSON value).
///
/// Each value is coerced to the column type through `jsonb_populate_record`,
/// so the comparison runs on the column itself and can use its indexes. A
/// JSON null filter matches SQL NULL and binds nothing.
fn where_clause(
    table: &str,
    filters: &[EqFilter],
    first_param: usize,
) -> DomainResult<(String, Params)> {
    let table = quote_identifier(table)?;
    let mut conditions = Vec::with_capacity(filters.len());
    let mut params: Params = Vec::new();

    for filter in filters {
        let column = quote_identifier(&filter.column)?;
        if filter.value.is_null() {
            conditions.push(format!("t.{} IS NULL", column));
            continue;
        }

        let key = first_param + params.len();
        conditions.push(format!(
            "t.{column} = (jsonb_populate_record(NULL::{table}, jsonb_build_object(${key}::text, ${value}::jsonb))).{column}",
            value = key + 1
        ));
        params.push(Box::new(filter.column.clone()));
        params.push(Box::new(filter.value.clone()));
    }

    if conditions.is_empty() {
        return Ok((String::new(), params));
    }
    Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
}

fn select_statement(query: &SelectQuery) -> DomainResult<(String, Params)> {
    let table = quote_identifier(&query.table)?;
    let (conditions, params) = where_clause(&query.table, &query.filters, 1)?;
    let mut sql = format!("SELECT to_jsonb(t) FROM {} AS t{}", table, conditions);

    if let Some(order) = &query.order {
        let column = quote_identifier(&order.column)?;
        let direction = if order.ascending { "ASC" } else { "DESC" };
        sql.push_str(&format!(" ORDER BY t.{} {}", column, direction));
    }

    Ok((sql, params))
}

fn insert_statement(table: &str, record: &Record) -> DomainResult<String> {
    let table = quote_identifier(table)?;
    let columns = quote_columns(record.keys())?.join(", ");
    Ok(format!(
        "INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)"
    ))
}

/// `$1` binds the changes; filter parameters follow
fn update_statement(
    table: &str,
    changes: &Record,
    filter: &EqFilter,
) -> DomainResult<(String, Params)> {
    let (conditions, params) = where_clause(table, std::slice::from_ref(filter), 2)?;
    let table = quote_identifier(table)?;
    let columns = quote_columns(changes.keys())?.join(", ");
    Ok((
        format!(
            "UPDATE {table} AS t SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)){conditions}"
        ),
        params,
    ))
}

fn delete_statement(table: &str, filter: &EqFilter) -> DomainResult<(String, Params)> {
    let (conditions, params) = where_clause(table, std::slice::from_ref(filter), 1)?;
    let table = quote_identifier(table)?;
    Ok((format!("DELETE FROM {table} AS t{conditions}"), params))
}

/// PostgreSQL implementation of RecordStore.
///
/// Acts as a generic table gateway: rows travel as JSON objects and the
/// database coerces them to column types through `jsonb_populate_record`.
#[derive(Clone)]
pub struct PostgresRecordStore {
    client: PostgresClient,
}

impl PostgresRecordStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    #[instrument(skip(self, query), fields(table = %query.table))]
    async fn select(&self, query: SelectQuery) -> DomainResult<Vec<Record>> {
        let (sql, params) = select_statement(&query)?;

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(sql.as_str(), &param_refs(&params))
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let records = rows
            .iter()
            .map(|row| match row.get::<_, Value>(0) {
                Value::Object(map) => Ok(map),
                other => Err(DomainError::RecordDecodeError(format!(
                    "row is not an object: {}",
                    other
                ))),
            })
            .collect::<DomainResult<Vec<Record>>>()?;

        debug!(count = records.len(), "selected rows");
        Ok(records)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn insert(&self, table: &str, records: Vec<Record>) -> DomainResult<()> {
        let statements = records
            .iter()
            .map(|record| insert_statement(table, record))
            .collect::<DomainResult<Vec<String>>>()?;

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        for (sql, record) in statements.iter().zip(records) {
            let row = Value::Object(record);
            tx.execute(sql.as_str(), &[&row])
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!("inserted rows");
        Ok(())
    }

    #[instrument(skip(self, changes, filter), fields(column = %filter.column))]
    async fn update(&self, table: &str, changes: Record, filter: EqFilter) -> DomainResult<()> {
        if changes.is_empty() {
            quote_identifier(&filter.column)?;
            return Ok(());
        }
        let (sql, filter_params) = update_statement(table, &changes, &filter)?;
        let mut params: Params = Vec::with_capacity(filter_params.len() + 1);
        params.push(Box::new(Value::Object(changes)));
        params.extend(filter_params);

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let updated = conn
            .execute(sql.as_str(), &param_refs(&params))
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(updated, "updated rows");
        Ok(())
    }

    #[instrument(skip(self, filter), fields(column = %filter.column))]
    async fn delete(&self, table: &str, filter: EqFilter) -> DomainResult<()> {
        let (sql, params) = delete_statement(table, &filter)?;

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let deleted = conn
            .execute(sql.as_str(), &param_refs(&params))
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(deleted, "deleted rows");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("employees").unwrap(), "\"employees\"");
        assert_eq!(quote_identifier("_col9").unwrap(), "\"_col9\"");

        for bad in ["", "9lives", "name; DROP TABLE x", "a\"b", "col-name", "émployé"] {
            assert!(
                matches!(quote_identifier(bad), Err(DomainError::InvalidIdentifier(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_select_statement_without_filters() {
        let (sql, params) =
            select_statement(&SelectQuery::from("employees").order("name", true)).unwrap();
        assert_eq!(
            sql,
            "SELECT to_jsonb(t) FROM \"employees\" AS t ORDER BY t.\"name\" ASC"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_statement_numbers_filter_params() {
        let query = SelectQuery::from("devices")
            .eq("status", "Available")
            .eq("employee_id", json!(null))
            .eq("serial_number", "SN1")
            .order("created_at", false);
        let (sql, params) = select_statement(&query).unwrap();
        assert_eq!(
            sql,
            "SELECT to_jsonb(t) FROM \"devices\" AS t \
             WHERE t.\"status\" = (jsonb_populate_record(NULL::\"devices\", jsonb_build_object($1::text, $2::jsonb))).\"status\" \
             AND t.\"employee_id\" IS NULL \
             AND t.\"serial_number\" = (jsonb_populate_record(NULL::\"devices\", jsonb_build_object($3::text, $4::jsonb))).\"serial_number\" \
             ORDER BY t.\"created_at\" DESC"
        );
        // the null filter binds nothing
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_filters_compare_the_column_itself() {
        // the column stays bare on the left so its index applies
        let (sql, _) = delete_statement("devices", &EqFilter::new("id", "dev-1")).unwrap();
        assert!(sql.contains("WHERE t.\"id\" = "));
        assert!(!sql.contains("to_jsonb(t) ->"));
    }

    #[test]
    fn test_select_statement_rejects_bad_order_column() {
        let query = SelectQuery::from("devices").order("created_at DESC; --", false);
        assert!(matches!(
            select_statement(&query),
            Err(DomainError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_select_statement_rejects_bad_filter_column() {
        let query = SelectQuery::from("devices").eq("id OR 1=1", "x");
        assert!(matches!(
            select_statement(&query),
            Err(DomainError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_insert_statement_lists_record_columns() {
        let sql = insert_statement("employees", &record(json!({"name": "Ann"}))).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"employees\" (\"name\") SELECT \"name\" \
             FROM jsonb_populate_record(NULL::\"employees\", $1)"
        );

        let sql = insert_statement(
            "employees",
            &record(json!({"name": "Ann", "email": "ann@x.com"})),
        )
        .unwrap();
        assert!(sql.contains("\"email\""));
        assert!(sql.contains("\"name\""));
    }

    #[test]
    fn test_update_and_delete_statements() {
        let filter = EqFilter::new("id", "dev-1");
        let (sql, params) =
            update_statement("devices", &record(json!({"status": "Assigned"})), &filter).unwrap();
        assert!(sql.starts_with("UPDATE \"devices\" AS t SET (\"status\") = (SELECT \"status\""));
        assert!(sql.ends_with(
            "WHERE t.\"id\" = (jsonb_populate_record(NULL::\"devices\", jsonb_build_object($2::text, $3::jsonb))).\"id\""
        ));
        assert_eq!(params.len(), 2);

        let (sql, params) = delete_statement("devices", &filter).unwrap();
        assert_eq!(
            sql,
            "DELETE FROM \"devices\" AS t \
             WHERE t.\"id\" = (jsonb_populate_record(NULL::\"devices\", jsonb_build_object($1::text, $2::jsonb))).\"id\""
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_statements_reject_bad_column_names() {
        let bad = record(json!({"name) VALUES ('x'); --": "Ann"}));
        let filter = EqFilter::new("id", "emp-1");
        assert!(insert_statement("employees", &bad).is_err());
        assert!(update_statement("employees", &bad, &filter).is_err());
        assert!(delete_statement("employees; DROP TABLE devices", &filter).is_err());
        assert!(delete_statement("employees", &EqFilter::new("id; --", "x")).is_err());
    }
}
