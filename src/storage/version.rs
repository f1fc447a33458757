use serde_json::Value;

use crate::storage::{StorageError, database::CURRENT_VERSION};

/// Schema version of a parsed store document; a document without one is v1.
pub fn read_version(document: &Value) -> Result<u32, StorageError> {
    match document.get("version") {
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| StorageError::InvalidVersion(v.clone())),
        None => Ok(1),
    }
}

/// Accepts documents this build can read and rejects ones written by a newer build.
pub fn check_version(document: &Value) -> Result<u32, StorageError> {
    let version = read_version(document)?;
    if version > CURRENT_VERSION {
        return Err(StorageError::FutureVersion(version));
    }
    Ok(version)
}
