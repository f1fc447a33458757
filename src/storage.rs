use std::{cmp::Ordering, path::PathBuf};

use jiff::Timestamp;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::RecordId;

pub mod database;
pub mod http;
pub mod json;
pub mod memory;
pub mod version;

/// A row as the record store sees it: field name to JSON value.
pub type Record = Map<String, Value>;

/// Field holding the identity of every record
pub const ID_FIELD: &str = "Id";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to load store from '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON from '{path}': {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to save store to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store to JSON: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create backup at '{path}': {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to cleanup old backups in '{dir}': {source}")]
    CleanupFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Store file was created by a newer version of taskflow (version {0}). Please upgrade taskflow to open this file."
    )]
    FutureVersion(u32),

    #[error("Store file has an invalid version field: {0}")]
    InvalidVersion(Value),

    #[error("Request to '{url}' failed: {message}")]
    RequestFailed { url: String, message: String },

    #[error("Unreadable response from '{url}': {source}")]
    InvalidResponse {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Record store rejected the request: {0}")]
    Rejected(String),
}

/// Equality condition: the field must equal one of `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Query passed to `fetch_records`: requested fields, conditions, ordering and paging.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordQuery {
    pub fields: Vec<String>,
    pub conditions: Vec<Condition>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl RecordQuery {
    pub fn fields(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn equal_to(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            values: vec![value.into()],
        });
        self
    }

    pub fn newest_first(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            descending: true,
        });
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }
}

/// Per-record result of a create, update or delete call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordOutcome {
    pub success: bool,
    pub data: Option<Record>,
    pub message: Option<String>,
}

impl RecordOutcome {
    pub fn succeeded(data: Option<Record>) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// CRUD over named tables of an external record store.
pub trait RecordStore {
    fn fetch_records(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, StorageError>;
    fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<Record>, StorageError>;
    fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError>;
    fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError>;
    fn delete_records(
        &self,
        table: &str,
        ids: &[RecordId],
    ) -> Result<Vec<RecordOutcome>, StorageError>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn fetch_records(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, StorageError> {
        (**self).fetch_records(table, query)
    }

    fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<Record>, StorageError> {
        (**self).get_record_by_id(table, id, fields)
    }

    fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        (**self).create_records(table, records)
    }

    fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        (**self).update_records(table, records)
    }

    fn delete_records(
        &self,
        table: &str,
        ids: &[RecordId],
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        (**self).delete_records(table, ids)
    }
}

impl RecordStore for Box<dyn RecordStore> {
    fn fetch_records(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, StorageError> {
        self.as_ref().fetch_records(table, query)
    }

    fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<Record>, StorageError> {
        self.as_ref().get_record_by_id(table, id, fields)
    }

    fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        self.as_ref().create_records(table, records)
    }

    fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        self.as_ref().update_records(table, records)
    }

    fn delete_records(
        &self,
        table: &str,
        ids: &[RecordId],
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        self.as_ref().delete_records(table, ids)
    }
}

/// Reads a record's identity, accepting integers and numeric strings.
pub fn record_id(record: &Record) -> Option<RecordId> {
    match record.get(ID_FIELD)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Local evaluation of a `RecordQuery`, shared by the in-process backends.
pub fn apply_query<'a>(records: impl Iterator<Item = &'a Record>, query: &RecordQuery) -> Vec<Record> {
    let mut matching: Vec<&Record> = records
        .filter(|record| {
            query.conditions.iter().all(|condition| {
                let stored = record.get(&condition.field).unwrap_or(&Value::Null);
                condition
                    .values
                    .iter()
                    .any(|wanted| value_matches(stored, wanted))
            })
        })
        .collect();

    if let Some(order) = &query.order_by {
        matching.sort_by(|a, b| {
            let ordering = compare_values(a.get(&order.field), b.get(&order.field));
            if order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    matching
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .map(|record| project_fields(record, &query.fields))
        .collect()
}

/// Keeps only the requested fields (plus the identity); no fields means all.
pub fn project_fields(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    record
        .iter()
        .filter(|(name, _)| name.as_str() == ID_FIELD || fields.iter().any(|f| f == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Lookup fields may hold `{"Id": n, ...}` instead of the bare id.
fn value_matches(stored: &Value, wanted: &Value) -> bool {
    if stored == wanted {
        return true;
    }
    match (stored, wanted) {
        (Value::Object(lookup), _) => lookup
            .get(ID_FIELD)
            .is_some_and(|id| value_matches(id, wanted)),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a)) => {
            b.parse::<f64>().ok() == a.as_f64()
        }
        _ => false,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (x.parse::<Timestamp>(), y.parse::<Timestamp>()) {
                (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_apply_query_matches_lookup_objects() {
        let records = [
            record(json!({"Id": 1, "title": "a", "project_id": {"Id": 7, "Name": "Home"}})),
            record(json!({"Id": 2, "title": "b", "project_id": 8})),
            record(json!({"Id": 3, "title": "c", "project_id": 7})),
        ];
        let query = RecordQuery::fields(&["title"]).equal_to("project_id", 7);

        let found = apply_query(records.iter(), &query);

        assert_eq!(
            found,
            vec![record(json!({"Id": 1, "title": "a"})), record(json!({"Id": 3, "title": "c"}))]
        );
    }

    #[test]
    fn test_apply_query_orders_newest_first_and_pages() {
        let records = [
            record(json!({"Id": 1, "created_at": "2024-06-01T00:00:00Z"})),
            record(json!({"Id": 2, "created_at": "2024-06-03T00:00:00Z"})),
            record(json!({"Id": 3, "created_at": "2024-06-02T00:00:00.5Z"})),
            record(json!({"Id": 4})),
        ];
        let query = RecordQuery::default().newest_first("created_at").page(2, 1);

        let ids: Vec<_> = apply_query(records.iter(), &query)
            .iter()
            .filter_map(record_id)
            .collect();

        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_record_id_accepts_numeric_strings() {
        assert_eq!(record_id(&record(json!({"Id": "12"}))), Some(12));
        assert_eq!(record_id(&record(json!({"Id": 5}))), Some(5));
        assert_eq!(record_id(&record(json!({"title": "x"}))), None);
    }
}
