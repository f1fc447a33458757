//! Translation between record-store rows and entities.
//!
//! Rows use the backend's field names (`due_date`, `project_id`, `Tags`, ...)
//! and may hold lookup objects (`{"Id": 3, "Name": "Home"}`) where an entity
//! only keeps the referenced id.

use jiff::{Timestamp, civil::Date, tz::TimeZone};
use serde_json::Value;
use thiserror::Error;

use crate::{
    models::{RecordId, project::ProjectValidationError, task::TaskValidationError},
    storage::{ID_FIELD, Record, RecordOutcome, StorageError},
};

pub mod projects;
pub mod settings;
pub mod tasks;

pub use projects::ProjectRepository;
pub use settings::SettingRepository;
pub use tasks::TaskRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: RecordId },

    #[error("Failed to {action} {entity}: {message}")]
    Rejected {
        entity: &'static str,
        action: &'static str,
        message: String,
    },

    #[error("Malformed {entity} record: {reason}")]
    Malformed { entity: &'static str, reason: String },

    #[error("Invalid task: {0}")]
    InvalidTask(#[from] TaskValidationError),

    #[error("Invalid project: {0}")]
    InvalidProject(#[from] ProjectValidationError),
}

/// Returns the first written record, or the first per-record failure.
pub(crate) fn single_result(
    outcomes: Vec<RecordOutcome>,
    entity: &'static str,
    action: &'static str,
) -> Result<Record, RepositoryError> {
    let failures: Vec<_> = outcomes.iter().filter(|o| !o.success).collect();
    if let Some(failed) = failures.first() {
        tracing::warn!(entity, action, failed = failures.len(), "record store rejected records");
        return Err(RepositoryError::Rejected {
            entity,
            action,
            message: failed
                .message
                .clone()
                .unwrap_or_else(|| format!("Failed to {} {}", action, entity)),
        });
    }

    outcomes
        .into_iter()
        .find_map(|o| o.data)
        .ok_or_else(|| RepositoryError::Rejected {
            entity,
            action,
            message: format!("No {} was returned", entity),
        })
}

/// Reads an id from a bare number, numeric string or lookup object.
pub(crate) fn lookup_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(lookup) => lookup.get(ID_FIELD).and_then(lookup_id),
        _ => None,
    }
}

/// Display text of a lookup object, falling back to its id.
pub(crate) fn lookup_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(lookup) => lookup
            .get("Name")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| lookup.get(ID_FIELD).and_then(lookup_label)),
        _ => None,
    }
}

pub(crate) fn text(record: &Record, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Accepts full timestamps and plain dates; a plain date means midnight UTC.
pub(crate) fn timestamp(record: &Record, field: &str) -> Option<Timestamp> {
    let raw = text(record, field)?;
    if let Ok(ts) = raw.parse::<Timestamp>() {
        return Some(ts);
    }
    match raw.parse::<Date>().and_then(|date| date.to_zoned(TimeZone::UTC)) {
        Ok(zoned) => Some(zoned.timestamp()),
        Err(_) => {
            tracing::warn!(field, value = %raw, "ignoring unparsable timestamp");
            None
        }
    }
}

pub(crate) fn optional_text(value: Option<&str>) -> Value {
    Value::String(value.unwrap_or_default().to_string())
}

pub(crate) fn optional_timestamp(value: Option<Timestamp>) -> Value {
    value.map_or(Value::Null, |ts| Value::String(ts.to_string()))
}
