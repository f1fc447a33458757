use serde_json::Value;

use crate::{
    models::{
        RecordId,
        project::{DEFAULT_PROJECT_COLOR, NewProject, Project, ProjectUpdate},
        task::Tags,
    },
    repositories::{RepositoryError, lookup_label, single_result, text, timestamp},
    storage::{ID_FIELD, Record, RecordQuery, RecordStore, record_id},
};

pub const PROJECT_TABLE: &str = "project";

const PROJECT_FIELDS: &[&str] = &["Name", "color", "tasks_count", "created_at", "Tags", "Owner"];

/// Project CRUD over the `project` table.
pub struct ProjectRepository<S> {
    store: S,
}

impl<S: RecordStore> ProjectRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All projects, newest first.
    pub fn get_all(&self) -> Result<Vec<Project>, RepositoryError> {
        let query = RecordQuery::fields(PROJECT_FIELDS).newest_first("created_at");
        let records = self.store.fetch_records(PROJECT_TABLE, &query)?;

        Ok(records
            .iter()
            .filter_map(|record| match project_from_record(record) {
                Ok(project) => Some(project),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping project record");
                    None
                }
            })
            .collect())
    }

    pub fn get_by_id(&self, id: RecordId) -> Result<Project, RepositoryError> {
        let fields: Vec<String> = PROJECT_FIELDS.iter().map(|f| f.to_string()).collect();
        let record = self
            .store
            .get_record_by_id(PROJECT_TABLE, id, &fields)?
            .ok_or(RepositoryError::NotFound {
                entity: "project",
                id,
            })?;
        project_from_record(&record)
    }

    /// New projects start with no tasks.
    pub fn create(&self, project: &NewProject) -> Result<Project, RepositoryError> {
        project.validate()?;
        tracing::debug!(name = %project.name, "creating project");

        let mut record = Record::new();
        record.insert("Name".into(), Value::from(project.name.trim()));
        record.insert(
            "color".into(),
            Value::from(project.color.as_deref().unwrap_or(DEFAULT_PROJECT_COLOR)),
        );
        record.insert("Tags".into(), Value::from(project.tags.to_delimited()));
        record.insert("tasks_count".into(), Value::from(0));

        let outcomes = self.store.create_records(PROJECT_TABLE, vec![record])?;
        project_from_record(&single_result(outcomes, "project", "create")?)
    }

    pub fn update(&self, id: RecordId, update: &ProjectUpdate) -> Result<Project, RepositoryError> {
        update.validate()?;
        tracing::debug!(id, "updating project");

        let mut record = Record::new();
        record.insert(ID_FIELD.into(), Value::from(id));
        if let Some(name) = &update.name {
            record.insert("Name".into(), Value::from(name.trim()));
        }
        if let Some(color) = &update.color {
            record.insert("color".into(), Value::from(color.clone()));
        }
        if let Some(tags) = &update.tags {
            record.insert("Tags".into(), Value::from(tags.to_delimited()));
        }
        if let Some(count) = update.tasks_count {
            record.insert("tasks_count".into(), Value::from(count));
        }

        let outcomes = self.store.update_records(PROJECT_TABLE, vec![record])?;
        project_from_record(&single_result(outcomes, "project", "update")?)
    }

    pub fn delete(&self, id: RecordId) -> Result<(), RepositoryError> {
        tracing::debug!(id, "deleting project");

        let outcomes = self.store.delete_records(PROJECT_TABLE, &[id])?;
        match outcomes.iter().find(|o| !o.success) {
            Some(failed) => Err(RepositoryError::Rejected {
                entity: "project",
                action: "delete",
                message: failed
                    .message
                    .clone()
                    .unwrap_or_else(|| "Failed to delete project".to_string()),
            }),
            None if outcomes.is_empty() => Err(RepositoryError::NotFound {
                entity: "project",
                id,
            }),
            None => Ok(()),
        }
    }
}

pub fn project_from_record(record: &Record) -> Result<Project, RepositoryError> {
    let id = record_id(record).ok_or_else(|| RepositoryError::Malformed {
        entity: "project",
        reason: "missing Id".to_string(),
    })?;

    Ok(Project {
        id,
        name: text(record, "Name").unwrap_or_default(),
        color: text(record, "color").unwrap_or_else(|| DEFAULT_PROJECT_COLOR.to_string()),
        tasks_count: record
            .get("tasks_count")
            .and_then(Value::as_u64)
            .map_or(0, |count| count as usize),
        tags: text(record, "Tags")
            .map(|raw| Tags::parse(&raw))
            .unwrap_or_default(),
        owner: record.get("Owner").and_then(lookup_label),
        created_at: timestamp(record, "created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_project_from_record_defaults_missing_fields() {
        let record = json!({"Id": 2, "Name": "Garden"}).as_object().cloned().unwrap();

        let project = project_from_record(&record).unwrap();

        assert_eq!(project.name, "Garden");
        assert_eq!(project.color, DEFAULT_PROJECT_COLOR);
        assert_eq!(project.tasks_count, 0);
    }

    #[test]
    fn test_create_and_update_project() {
        let store = MemoryStore::new();
        let repository = ProjectRepository::new(&store);

        let project = repository
            .create(&NewProject {
                name: " Website ".to_string(),
                color: Some("#10b981".to_string()),
                ..NewProject::default()
            })
            .unwrap();
        assert_eq!(project.name, "Website");
        assert_eq!(project.tasks_count, 0);

        let updated = repository
            .update(
                project.id,
                &ProjectUpdate {
                    name: Some("Web site".to_string()),
                    tasks_count: Some(4),
                    ..ProjectUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Web site");
        assert_eq!(updated.color, "#10b981");
        assert_eq!(updated.tasks_count, 4);
        assert_eq!(repository.get_by_id(project.id).unwrap(), updated);
    }

    #[test]
    fn test_get_missing_project_is_not_found() {
        let store = MemoryStore::new();
        let repository = ProjectRepository::new(&store);

        assert!(matches!(
            repository.get_by_id(9),
            Err(RepositoryError::NotFound { entity: "project", id: 9 })
        ));
    }
}
