use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    models::RecordId,
    storage::{ID_FIELD, Record, RecordOutcome, RecordQuery, apply_query, project_fields, record_id},
};

/// Current schema version
pub const CURRENT_VERSION: u32 = 1;

/// Every table of a local record store, as persisted by the JSON backend.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Database {
    pub version: u32,
    pub tables: BTreeMap<String, Table>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Table {
    pub next_id: RecordId,
    pub records: Vec<Record>,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            next_id: 1,
            records: vec![],
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            tables: BTreeMap::new(),
        }
    }
}

impl Database {
    pub fn fetch(&self, table: &str, query: &RecordQuery) -> Vec<Record> {
        match self.tables.get(table) {
            Some(table) => apply_query(table.records.iter(), query),
            None => vec![],
        }
    }

    pub fn get(&self, table: &str, id: RecordId, fields: &[String]) -> Option<Record> {
        self.tables
            .get(table)?
            .records
            .iter()
            .find(|record| record_id(record) == Some(id))
            .map(|record| project_fields(record, fields))
    }

    /// Assigns identity and server timestamps, like the hosted backend does.
    pub fn create(&mut self, table: &str, records: Vec<Record>) -> Vec<RecordOutcome> {
        let table = self.tables.entry(table.to_string()).or_default();
        let now = Value::String(Timestamp::now().to_string());

        records
            .into_iter()
            .map(|mut record| {
                let id = table.next_id;
                table.next_id += 1;
                record.insert(ID_FIELD.to_string(), Value::from(id));
                record
                    .entry("created_at".to_string())
                    .or_insert_with(|| now.clone());
                record.insert("updated_at".to_string(), now.clone());
                table.records.push(record.clone());
                RecordOutcome::succeeded(Some(record))
            })
            .collect()
    }

    /// Merges the given fields into existing records matched by `Id`.
    pub fn update(&mut self, table_name: &str, records: Vec<Record>) -> Vec<RecordOutcome> {
        let now = Value::String(Timestamp::now().to_string());
        let table = self.tables.entry(table_name.to_string()).or_default();

        records
            .into_iter()
            .map(|changes| {
                let Some(id) = record_id(&changes) else {
                    return RecordOutcome::failed("Record is missing its Id");
                };
                let Some(existing) = table
                    .records
                    .iter_mut()
                    .find(|record| record_id(record) == Some(id))
                else {
                    return RecordOutcome::failed(format!(
                        "Record {} not found in table '{}'",
                        id, table_name
                    ));
                };
                for (field, value) in changes {
                    if field != ID_FIELD {
                        existing.insert(field, value);
                    }
                }
                existing.insert("updated_at".to_string(), now.clone());
                RecordOutcome::succeeded(Some(existing.clone()))
            })
            .collect()
    }

    pub fn delete(&mut self, table_name: &str, ids: &[RecordId]) -> Vec<RecordOutcome> {
        let table = self.tables.entry(table_name.to_string()).or_default();

        ids.iter()
            .map(|id| {
                let before = table.records.len();
                table.records.retain(|record| record_id(record) != Some(*id));
                if table.records.len() < before {
                    RecordOutcome::succeeded(None)
                } else {
                    RecordOutcome::failed(format!(
                        "Record {} not found in table '{}'",
                        id, table_name
                    ))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_create_assigns_sequential_ids_and_timestamps() {
        let mut db = Database::default();
        let outcomes = db.create(
            "task",
            vec![record(json!({"title": "a"})), record(json!({"title": "b"}))],
        );

        let ids: Vec<_> = outcomes
            .iter()
            .filter_map(|o| o.data.as_ref().and_then(record_id))
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(db.get("task", 1, &[]).unwrap().contains_key("created_at"));
        assert_eq!(db.tables["task"].next_id, 3);
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let mut db = Database::default();
        db.create("project", vec![record(json!({"Name": "a"}))]);
        db.delete("project", &[1]);
        let outcome = db.create("project", vec![record(json!({"Name": "b"}))]);

        assert_eq!(outcome[0].data.as_ref().and_then(record_id), Some(2));
    }

    #[test]
    fn test_update_merges_fields_and_reports_missing_records() {
        let mut db = Database::default();
        db.create("task", vec![record(json!({"title": "a", "status": "ToDo"}))]);

        let outcomes = db.update(
            "task",
            vec![
                record(json!({"Id": 1, "status": "Done"})),
                record(json!({"Id": 9, "status": "Done"})),
            ],
        );

        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        let stored = db.get("task", 1, &[]).unwrap();
        assert_eq!(stored["title"], json!("a"));
        assert_eq!(stored["status"], json!("Done"));
    }

    #[test]
    fn test_delete_reports_each_id() {
        let mut db = Database::default();
        db.create("setting", vec![record(json!({"setting_name": "theme"}))]);

        let outcomes = db.delete("setting", &[1, 1]);

        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(db.fetch("setting", &RecordQuery::default()).is_empty());
    }
}
