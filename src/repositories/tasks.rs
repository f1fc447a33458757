use serde_json::Value;

use crate::{
    models::{
        RecordId,
        task::{NewTask, Priority, Recurrence, Status, Tags, Task, TaskUpdate},
    },
    repositories::{
        RepositoryError, lookup_id, lookup_label, optional_text, optional_timestamp,
        single_result, text, timestamp,
    },
    storage::{ID_FIELD, Record, RecordQuery, RecordStore, record_id},
};

pub const TASK_TABLE: &str = "task";

const TASK_FIELDS: &[&str] = &[
    "Name",
    "title",
    "description",
    "due_date",
    "priority",
    "status",
    "project_id",
    "recurrence",
    "reminder",
    "created_at",
    "updated_at",
    "Tags",
    "Owner",
];

/// Task CRUD over the `task` table.
pub struct TaskRepository<S> {
    store: S,
}

impl<S: RecordStore> TaskRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All tasks, newest first.
    pub fn get_all(&self) -> Result<Vec<Task>, RepositoryError> {
        let query = RecordQuery::fields(TASK_FIELDS).newest_first("created_at");
        self.fetch(&query)
    }

    pub fn get_by_project(&self, project_id: RecordId) -> Result<Vec<Task>, RepositoryError> {
        let query = RecordQuery::fields(TASK_FIELDS)
            .equal_to("project_id", project_id)
            .newest_first("created_at");
        self.fetch(&query)
    }

    pub fn get_by_id(&self, id: RecordId) -> Result<Task, RepositoryError> {
        let fields: Vec<String> = TASK_FIELDS.iter().map(|f| f.to_string()).collect();
        let record = self
            .store
            .get_record_by_id(TASK_TABLE, id, &fields)?
            .ok_or(RepositoryError::NotFound { entity: "task", id })?;
        task_from_record(&record)
    }

    pub fn create(&self, task: &NewTask) -> Result<Task, RepositoryError> {
        task.validate()?;
        tracing::debug!(title = %task.title, project_id = task.project_id, "creating task");

        let outcomes = self
            .store
            .create_records(TASK_TABLE, vec![new_task_record(task)])?;
        task_from_record(&single_result(outcomes, "task", "create")?)
    }

    /// Sends only the fields present in `update`.
    pub fn update(&self, id: RecordId, update: &TaskUpdate) -> Result<Task, RepositoryError> {
        update.validate()?;
        tracing::debug!(id, "updating task");

        let outcomes = self
            .store
            .update_records(TASK_TABLE, vec![task_update_record(id, update)])?;
        task_from_record(&single_result(outcomes, "task", "update")?)
    }

    pub fn delete(&self, id: RecordId) -> Result<(), RepositoryError> {
        tracing::debug!(id, "deleting task");

        let outcomes = self.store.delete_records(TASK_TABLE, &[id])?;
        if let Some(failed) = outcomes.iter().find(|o| !o.success) {
            return Err(RepositoryError::Rejected {
                entity: "task",
                action: "delete",
                message: failed
                    .message
                    .clone()
                    .unwrap_or_else(|| "Failed to delete task".to_string()),
            });
        }
        if outcomes.is_empty() {
            return Err(RepositoryError::NotFound { entity: "task", id });
        }
        Ok(())
    }

    /// Malformed rows are skipped so one bad record cannot hide the rest.
    fn fetch(&self, query: &RecordQuery) -> Result<Vec<Task>, RepositoryError> {
        let records = self.store.fetch_records(TASK_TABLE, query)?;
        Ok(records
            .iter()
            .filter_map(|record| match task_from_record(record) {
                Ok(task) => Some(task),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping task record");
                    None
                }
            })
            .collect())
    }
}

pub fn task_from_record(record: &Record) -> Result<Task, RepositoryError> {
    let id = record_id(record).ok_or_else(|| RepositoryError::Malformed {
        entity: "task",
        reason: "missing Id".to_string(),
    })?;

    let priority = match text(record, "priority") {
        Some(raw) => match raw.parse::<Priority>() {
            Ok(priority) => Some(priority),
            Err(e) => {
                tracing::warn!(id, error = %e, "task has an unrecognized priority");
                None
            }
        },
        None => None,
    };

    let status = match text(record, "status").map(|raw| raw.parse::<Status>()) {
        Some(Ok(status)) => status,
        Some(Err(e)) => {
            tracing::warn!(id, error = %e, "task status unrecognized, treating as ToDo");
            Status::ToDo
        }
        None => Status::ToDo,
    };

    let project_id = record.get("project_id").and_then(lookup_id).unwrap_or_else(|| {
        tracing::warn!(id, "task has no project");
        0
    });

    let recurrence = text(record, "recurrence")
        .and_then(|raw| raw.parse::<Recurrence>().ok())
        .unwrap_or_default();

    let reminder = record
        .get("reminder")
        .and_then(Value::as_u64)
        .and_then(|minutes| u32::try_from(minutes).ok());

    Ok(Task {
        id,
        title: text(record, "title")
            .or_else(|| text(record, "Name"))
            .unwrap_or_default(),
        description: text(record, "description"),
        due_date: timestamp(record, "due_date"),
        priority,
        status,
        project_id,
        tags: text(record, "Tags")
            .map(|raw| Tags::parse(&raw))
            .unwrap_or_default(),
        recurrence,
        reminder,
        owner: record.get("Owner").and_then(lookup_label),
        created_at: timestamp(record, "created_at"),
        updated_at: timestamp(record, "updated_at"),
    })
}

fn new_task_record(task: &NewTask) -> Record {
    let mut record = Record::new();
    record.insert("Name".into(), Value::from(task.title.clone()));
    record.insert("title".into(), Value::from(task.title.clone()));
    record.insert("description".into(), optional_text(task.description.as_deref()));
    record.insert("due_date".into(), optional_timestamp(task.due_date));
    record.insert("priority".into(), Value::from(task.priority.as_str()));
    record.insert("status".into(), Value::from(task.status.as_str()));
    record.insert("project_id".into(), Value::from(task.project_id));
    record.insert("Tags".into(), Value::from(task.tags.to_delimited()));
    record.insert("recurrence".into(), Value::from(task.recurrence.as_str()));
    record.insert(
        "reminder".into(),
        task.reminder.map_or(Value::Null, Value::from),
    );
    record
}

fn task_update_record(id: RecordId, update: &TaskUpdate) -> Record {
    let mut record = Record::new();
    record.insert(ID_FIELD.into(), Value::from(id));
    if let Some(title) = &update.title {
        record.insert("Name".into(), Value::from(title.clone()));
        record.insert("title".into(), Value::from(title.clone()));
    }
    if let Some(description) = &update.description {
        record.insert("description".into(), optional_text(description.as_deref()));
    }
    if let Some(due_date) = update.due_date {
        record.insert("due_date".into(), optional_timestamp(due_date));
    }
    if let Some(priority) = update.priority {
        record.insert("priority".into(), Value::from(priority.as_str()));
    }
    if let Some(status) = update.status {
        record.insert("status".into(), Value::from(status.as_str()));
    }
    if let Some(project_id) = update.project_id {
        record.insert("project_id".into(), Value::from(project_id));
    }
    if let Some(tags) = &update.tags {
        record.insert("Tags".into(), Value::from(tags.to_delimited()));
    }
    if let Some(recurrence) = update.recurrence {
        record.insert("recurrence".into(), Value::from(recurrence.as_str()));
    }
    if let Some(reminder) = update.reminder {
        record.insert("reminder".into(), reminder.map_or(Value::Null, Value::from));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn new_task(title: &str, project_id: RecordId) -> NewTask {
        NewTask {
            title: title.to_string(),
            project_id,
            ..NewTask::default()
        }
    }

    #[test]
    fn test_task_from_record_maps_wire_fields() {
        let task = task_from_record(&record(json!({
            "Id": 12,
            "Name": "Ship release",
            "title": "Ship release",
            "description": "",
            "due_date": "2024-06-10T09:00:00Z",
            "priority": "High",
            "status": "InProgress",
            "project_id": {"Id": 3, "Name": "Launch"},
            "Tags": "release, urgent",
            "Owner": {"Id": 8, "Name": "Sam"},
            "created_at": "2024-06-01T00:00:00Z"
        })))
        .unwrap();

        assert_eq!(task.id, 12);
        assert_eq!(task.description, None);
        assert_eq!(task.due_date, Some("2024-06-10T09:00:00Z".parse().unwrap()));
        assert_eq!(task.priority, Some(Priority::High));
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.project_id, 3);
        assert_eq!(task.tags, Tags::parse("urgent,release"));
        assert_eq!(task.owner.as_deref(), Some("Sam"));
        assert_eq!(task.recurrence, Recurrence::None);
    }

    #[test]
    fn test_unrecognized_values_degrade() {
        let task = task_from_record(&record(json!({
            "Id": 1,
            "title": "Odd",
            "priority": "Urgent",
            "status": "Blocked",
            "project_id": "4"
        })))
        .unwrap();

        assert_eq!(task.priority, None);
        assert_eq!(task.status, Status::ToDo);
        assert_eq!(task.project_id, 4);
    }

    #[test]
    fn test_create_then_get_round_trips_through_store() {
        let store = MemoryStore::new();
        let repository = TaskRepository::new(&store);

        let created = repository
            .create(&NewTask {
                description: Some("Draft the notes".to_string()),
                priority: Priority::High,
                tags: Tags::parse("writing"),
                recurrence: Recurrence::Weekly,
                reminder: Some(30),
                ..new_task("Release notes", 2)
            })
            .unwrap();
        let fetched = repository.get_by_id(created.id).unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.title, "Release notes");
        assert_eq!(fetched.recurrence, Recurrence::Weekly);
        assert_eq!(fetched.reminder, Some(30));
        assert!(fetched.created_at.is_some());
    }

    #[test]
    fn test_create_rejects_invalid_task_without_store_call() {
        let store = MemoryStore::new();
        store.fail_next_call();
        let repository = TaskRepository::new(&store);

        let result = repository.create(&new_task("", 1));

        assert!(matches!(result, Err(RepositoryError::InvalidTask(_))));
        // The armed failure is still pending, so no call reached the store
        assert!(repository.get_all().is_err());
    }

    #[test]
    fn test_update_sends_only_changed_fields() {
        let update = TaskUpdate {
            title: Some("Renamed".to_string()),
            due_date: Some(None),
            ..TaskUpdate::default()
        };

        assert_eq!(
            task_update_record(5, &update),
            record(json!({"Id": 5, "Name": "Renamed", "title": "Renamed", "due_date": null}))
        );
    }

    #[test]
    fn test_get_by_project_filters_on_reference() {
        let store = MemoryStore::new();
        let repository = TaskRepository::new(&store);
        repository.create(&new_task("a", 1)).unwrap();
        repository.create(&new_task("b", 2)).unwrap();
        repository.create(&new_task("c", 1)).unwrap();

        let titles: Vec<_> = repository
            .get_by_project(1)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();

        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"a".to_string()));
        assert!(titles.contains(&"c".to_string()));
    }

    #[test]
    fn test_delete_missing_task_is_rejected() {
        let store = MemoryStore::new();
        let repository = TaskRepository::new(&store);

        let result = repository.delete(42);

        assert!(matches!(
            result,
            Err(RepositoryError::Rejected { action: "delete", .. })
        ));
    }
}
