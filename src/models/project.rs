use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{RecordId, task::Tags};

/// Display color used when a project has none
pub const DEFAULT_PROJECT_COLOR: &str = "#3b82f6";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Project {
    /// Identity assigned by the record store
    pub id: RecordId,
    /// Name of the project
    pub name: String,
    /// Hex color used to group the project's tasks visually
    pub color: String,
    /// Number of tasks referencing this project
    pub tasks_count: usize,
    pub tags: Tags,
    pub owner: Option<String>,
    /// Created at timestamp of the project
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewProject {
    pub name: String,
    pub color: Option<String>,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub tags: Option<Tags>,
    pub tasks_count: Option<usize>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectValidationError {
    #[error("Project name is required")]
    EmptyName,

    #[error("Invalid color '{0}', expected a hex value such as #3b82f6")]
    InvalidColor(String),
}

impl NewProject {
    pub fn validate(&self) -> Result<(), ProjectValidationError> {
        if self.name.trim().is_empty() {
            return Err(ProjectValidationError::EmptyName);
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }
}

impl ProjectUpdate {
    pub fn validate(&self) -> Result<(), ProjectValidationError> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(ProjectValidationError::EmptyName);
        }
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        Ok(())
    }
}

fn validate_color(color: &str) -> Result<(), ProjectValidationError> {
    let digits = color.strip_prefix('#').unwrap_or("");
    let valid_length = matches!(digits.len(), 3 | 6);
    if valid_length && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(ProjectValidationError::InvalidColor(color.to_string()))
    }
}
