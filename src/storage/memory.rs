use std::cell::{Cell, RefCell};

use crate::{
    models::RecordId,
    storage::{Record, RecordOutcome, RecordQuery, RecordStore, StorageError, database::Database},
};

/// In-process record store for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryStore {
    database: RefCell<Database>,
    /// When set, the next call fails as if the backend were unreachable
    fail_next: Cell<bool>,
    /// Every call on this table fails
    failing_table: RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_call(&self) {
        self.fail_next.set(true);
    }

    pub fn fail_table(&self, table: &str) {
        *self.failing_table.borrow_mut() = Some(table.to_string());
    }

    fn check_available(&self, table: &str) -> Result<(), StorageError> {
        let table_down = self.failing_table.borrow().as_deref() == Some(table);
        if self.fail_next.replace(false) || table_down {
            return Err(StorageError::RequestFailed {
                url: format!("memory://{}", table),
                message: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn fetch_records(&self, table: &str, query: &RecordQuery) -> Result<Vec<Record>, StorageError> {
        self.check_available(table)?;
        Ok(self.database.borrow().fetch(table, query))
    }

    fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<Record>, StorageError> {
        self.check_available(table)?;
        Ok(self.database.borrow().get(table, id, fields))
    }

    fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        self.check_available(table)?;
        Ok(self.database.borrow_mut().create(table, records))
    }

    fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        self.check_available(table)?;
        Ok(self.database.borrow_mut().update(table, records))
    }

    fn delete_records(
        &self,
        table: &str,
        ids: &[RecordId],
    ) -> Result<Vec<RecordOutcome>, StorageError> {
        self.check_available(table)?;
        Ok(self.database.borrow_mut().delete(table, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_next_call_only_affects_one_call() {
        let store = MemoryStore::new();
        store.fail_next_call();

        assert!(store.fetch_records("task", &RecordQuery::default()).is_err());
        assert!(store.fetch_records("task", &RecordQuery::default()).is_ok());
    }

    #[test]
    fn test_failing_table_leaves_other_tables_available() {
        let store = MemoryStore::new();
        store.fail_table("project");

        assert!(store.delete_records("project", &[1]).is_err());
        assert!(store.fetch_records("project", &RecordQuery::default()).is_err());
        assert!(store.fetch_records("task", &RecordQuery::default()).is_ok());
    }
}
