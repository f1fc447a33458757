use std::{
    fs::{self, File, OpenOptions, rename, write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde_json::to_string_pretty;
use uuid::Uuid;

use crate::{
    models::RecordId,
    storage::{
        Record, RecordOutcome, RecordQuery, RecordStore, StorageError,
        database::{CURRENT_VERSION, Database},
        version::check_version,
    },
};

/// Number of backups kept next to the store file
const MAX_BACKUPS: usize = 5;

/// Record store persisted as a single JSON file on the local disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<Database, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let mut data: serde_json::Value =
                    serde_json::from_str(&content).map_err(|e| StorageError::ParseFailed {
                        path: self.path.clone(),
                        source: e,
                    })?;

                // Files from before versioning are read as the current version
                check_version(&data)?;
                if let Some(obj) = data.as_object_mut() {
                    obj.insert("version".to_string(), serde_json::json!(CURRENT_VERSION));
                }

                serde_json::from_value(data).map_err(|e| StorageError::ParseFailed {
                    path: self.path.clone(),
                    source: e,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Database::default()),
            Err(e) => Err(StorageError::LoadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Writes through a temp file renamed into place; callers hold the lock.
    fn save(&self, database: &Database) -> Result<(), StorageError> {
        let json =
            to_string_pretty(database).map_err(|e| StorageError::SerializeFailed { source: e })?;

        let unique_temp = format!("{}.tmp.{}", self.path.display(), Uuid::new_v4());
        let temp_path = PathBuf::from(&unique_temp);
        write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        self.create_backup()?;
        self.cleanup_old_backups()?;

        rename(&temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Runs a read-modify-write cycle under an exclusive lock on the store.
    fn modify<T>(&self, change: impl FnOnce(&mut Database) -> T) -> Result<T, StorageError> {
        let lock_file = self.lock()?;

        let mut database = self.load()?;
        let result = change(&mut database);
        self.save(&database)?;

        lock_file.unlock().map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(result)
    }

    fn lock(&self) -> Result<File, StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StorageError::SaveFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let lock_file_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_file_path)
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path.clone(),
                source: e,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path,
                source: e,
            })?;
        Ok(lock_file)
    }

    fn create_backup_dir(&self) -> Result<(), StorageError> {
        let backups_dir = self.get_backup_dir();
        fs::create_dir(&backups_dir).map_err(|e| StorageError::BackupFailed {
            path: backups_dir,
            source: e,
        })
    }

    fn create_backup(&self) -> Result<u64, StorageError> {
        let file_exists = fs::exists(&self.path).map_err(|e| StorageError::BackupFailed {
            path: self.path.clone(),
            source: e,
        })?;
        if !file_exists {
            return Ok(0);
        }

        let backup_path = self.get_backup_path();
        match fs::copy(&self.path, &backup_path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.create_backup_dir()?;
                fs::copy(&self.path, &backup_path).map_err(|e| StorageError::BackupFailed {
                    path: backup_path,
                    source: e,
                })
            }
            Err(e) => Err(StorageError::BackupFailed {
                path: backup_path,
                source: e,
            }),
            Ok(bytes) => Ok(bytes),
        }
    }

    fn cleanup_old_backups(&self) -> Result<(), StorageError> {
        let backup_dir = self.get_backup_dir();
        let cleanup_error = |e| StorageError::CleanupFailed {
            dir: backup_dir.clone(),
            source: e,
        };

        if !fs::exists(&backup_dir).map_err(cleanup_error)? {
            return Ok(());
        }

        let mut file_entries = fs::read_dir(&backup_dir)
            .map_err(cleanup_error)?
            .flatten()
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();

        // Backup names embed a timestamp, so lexical order is age order
        file_entries.sort();

        let excess = file_entries.len().saturating_sub(MAX_BACKUPS);
        for file_path in &file_entries[..excess] {
            fs::remove_file(file_path).map_err(cleanup_error)?;
        }

        Ok(())
    }

    fn get_backup_dir(&self) -> PathBuf {
        let parent_store_path = self.path.parent().unwrap_or(Path::new("."));
        parent_store_path.join("backups")
    }

    fn get_backup_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.json".to_string());
        let now = jiff::Timestamp::now();
        let timestamp = format!("{}{:09}Z", now.strftime("%Y%m%dT%H%M%S"), now.subsec_nanosecond());

        self.get_backup_dir()
            .join(format!("{}-{}", file_name, timestamp))
    }
}

impl RecordStore for JsonFileStore {
    fn fetch_records(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, StorageError> {
        Ok(self.load()?.fetch(table, query))
    }

    fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<Record>, StorageError> {
        Ok(self.load()?.get(table, id, fields))
    }

    fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        self.modify(|database| database.create(table, records))
    }

    fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        self.modify(|database| database.update(table, records))
    }

    fn delete_records(
        &self,
        table: &str,
        ids: &[RecordId],
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        self.modify(|database| database.delete(table, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn store_in(dir: &TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("store.json"))
    }

    #[test]
    fn test_create_and_fetch_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .create_records("project", vec![record(json!({"Name": "Website", "color": "#fff"}))])
            .unwrap();

        let reopened = store_in(&dir);
        let projects = reopened
            .fetch_records("project", &RecordQuery::default())
            .unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0]["Name"], json!("Website"));
        assert_eq!(projects[0]["Id"], json!(1));
    }

    #[test]
    fn test_missing_file_loads_empty_database() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let database = store.load().unwrap();

        assert_eq!(database, Database::default());
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ this is not valid json }").unwrap();

        let result = JsonFileStore::new(path).load();

        assert!(matches!(result, Err(StorageError::ParseFailed { .. })));
    }

    #[test]
    fn test_load_v1_without_version_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{ "tables": {} }"#).unwrap();

        let database = JsonFileStore::new(path).load().unwrap();

        assert_eq!(database.version, CURRENT_VERSION);
    }

    #[test]
    fn test_load_future_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, r#"{ "version": 999, "tables": {} }"#).unwrap();

        let result = JsonFileStore::new(path).load();

        assert!(matches!(result, Err(StorageError::FutureVersion(999))));
    }

    #[test]
    fn test_backups_are_capped() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for i in 0..8 {
            store
                .create_records("task", vec![record(json!({"title": format!("task {}", i)}))])
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let backup_count = fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .count();
        assert_eq!(backup_count, MAX_BACKUPS);
    }

    #[test]
    fn test_first_write_creates_no_backup() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store
            .create_records("task", vec![record(json!({"title": "first"}))])
            .unwrap();
        assert!(!dir.path().join("backups").exists());

        store.delete_records("task", &[1]).unwrap();
        assert!(dir.path().join("backups").is_dir());
    }
}
