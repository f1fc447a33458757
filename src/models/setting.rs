use serde::{Deserialize, Serialize};

use crate::models::RecordId;

/// Setting name holding the user's color scheme
pub const THEME_SETTING: &str = "theme";

/// Per-user key/value preference
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Setting {
    pub id: RecordId,
    pub user_id: String,
    pub name: String,
    pub value: String,
    /// Display mode stored alongside every setting, `Light` unless set
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSetting {
    pub user_id: String,
    pub name: String,
    pub value: String,
    pub mode: Option<String>,
}
