use serde_json::Value;

use crate::{
    models::{
        RecordId,
        setting::{NewSetting, Setting, THEME_SETTING},
    },
    repositories::{RepositoryError, single_result, text},
    storage::{ID_FIELD, Record, RecordQuery, RecordStore, record_id},
};

pub const SETTING_TABLE: &str = "setting";

const SETTING_FIELDS: &[&str] = &["Name", "setting_name", "setting_value", "user_id", "mode"];

/// Settings are fetched one page at a time; a user never has more.
const SETTINGS_PAGE_SIZE: usize = 100;

const DEFAULT_MODE: &str = "Light";

/// Per-user settings over the `setting` table.
pub struct SettingRepository<S> {
    store: S,
}

impl<S: RecordStore> SettingRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Settings of one user, or of everyone when `user_id` is `None`.
    pub fn get_all(&self, user_id: Option<&str>) -> Result<Vec<Setting>, RepositoryError> {
        let mut query = RecordQuery::fields(SETTING_FIELDS)
            .newest_first("created_at")
            .page(SETTINGS_PAGE_SIZE, 0);
        if let Some(user_id) = user_id {
            query = query.equal_to("user_id", user_id);
        }

        let records = self.store.fetch_records(SETTING_TABLE, &query)?;
        Ok(records.iter().filter_map(setting_from_record).collect())
    }

    pub fn get_by_id(&self, id: RecordId) -> Result<Setting, RepositoryError> {
        let fields: Vec<String> = SETTING_FIELDS.iter().map(|f| f.to_string()).collect();
        self.store
            .get_record_by_id(SETTING_TABLE, id, &fields)?
            .as_ref()
            .and_then(setting_from_record)
            .ok_or(RepositoryError::NotFound {
                entity: "setting",
                id,
            })
    }

    pub fn create(&self, setting: &NewSetting) -> Result<Setting, RepositoryError> {
        tracing::debug!(user_id = %setting.user_id, name = %setting.name, "creating setting");

        let mut record = Record::new();
        record.insert("Name".into(), Value::from(setting.name.clone()));
        record.insert("setting_name".into(), Value::from(setting.name.clone()));
        record.insert("setting_value".into(), Value::from(setting.value.clone()));
        record.insert("user_id".into(), Value::from(setting.user_id.clone()));
        record.insert(
            "mode".into(),
            Value::from(setting.mode.as_deref().unwrap_or(DEFAULT_MODE)),
        );

        let outcomes = self.store.create_records(SETTING_TABLE, vec![record])?;
        malformed_if_none(setting_from_record(&single_result(
            outcomes, "setting", "create",
        )?))
    }

    pub fn update(&self, setting: &Setting) -> Result<Setting, RepositoryError> {
        tracing::debug!(id = setting.id, name = %setting.name, "updating setting");

        let mut record = Record::new();
        record.insert(ID_FIELD.into(), Value::from(setting.id));
        record.insert("Name".into(), Value::from(setting.name.clone()));
        record.insert("setting_name".into(), Value::from(setting.name.clone()));
        record.insert("setting_value".into(), Value::from(setting.value.clone()));
        record.insert("user_id".into(), Value::from(setting.user_id.clone()));
        record.insert("mode".into(), Value::from(setting.mode.clone()));

        let outcomes = self.store.update_records(SETTING_TABLE, vec![record])?;
        malformed_if_none(setting_from_record(&single_result(
            outcomes, "setting", "update",
        )?))
    }

    /// Returns whether every requested setting was deleted.
    pub fn delete(&self, ids: &[RecordId]) -> Result<bool, RepositoryError> {
        let outcomes = self.store.delete_records(SETTING_TABLE, ids)?;
        let deleted = outcomes.iter().filter(|o| o.success).count();
        if deleted < ids.len() {
            tracing::warn!(requested = ids.len(), deleted, "some settings were not deleted");
        }
        Ok(deleted == ids.len())
    }

    pub fn get_user_setting(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<Setting>, RepositoryError> {
        Ok(self
            .get_all(Some(user_id))?
            .into_iter()
            .find(|setting| setting.name == name))
    }

    /// Updates the user's setting when one exists, creates it otherwise.
    pub fn upsert_user_setting(
        &self,
        user_id: &str,
        name: &str,
        value: &str,
    ) -> Result<Setting, RepositoryError> {
        match self.get_user_setting(user_id, name)? {
            Some(existing) => self.update(&Setting {
                value: value.to_string(),
                ..existing
            }),
            None => self.create(&NewSetting {
                user_id: user_id.to_string(),
                name: name.to_string(),
                value: value.to_string(),
                mode: Some(if name == THEME_SETTING {
                    mode_for_theme(value)
                } else {
                    DEFAULT_MODE.to_string()
                }),
            }),
        }
    }
}

fn mode_for_theme(theme: &str) -> String {
    let mut chars = theme.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => DEFAULT_MODE.to_string(),
    }
}

fn malformed_if_none(setting: Option<Setting>) -> Result<Setting, RepositoryError> {
    setting.ok_or_else(|| RepositoryError::Malformed {
        entity: "setting",
        reason: "missing Id or setting_name".to_string(),
    })
}

/// Rows without an id or name carry nothing usable and are dropped.
pub fn setting_from_record(record: &Record) -> Option<Setting> {
    let id = record_id(record)?;
    let name = text(record, "setting_name")?;
    let user_id = match record.get("user_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    Some(Setting {
        id,
        user_id,
        name,
        value: record
            .get("setting_value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        mode: text(record, "mode").unwrap_or_else(|| DEFAULT_MODE.to_string()),
    })
}
