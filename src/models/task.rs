use std::{collections::BTreeSet, fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Task {
    /// Identity assigned by the record store
    pub id: RecordId,
    /// Title of the task
    pub title: String,
    /// Longer description, absent when empty
    pub description: Option<String>,
    /// Deadline for this task
    pub due_date: Option<Timestamp>,
    /// `None` when the stored value is not a recognized priority
    pub priority: Option<Priority>,
    pub status: Status,
    /// The project this task belongs to
    pub project_id: RecordId,
    pub tags: Tags,
    /// How the task repeats once completed
    pub recurrence: Recurrence,
    /// Minutes before the due date to remind the user
    pub reminder: Option<u32>,
    /// Owner reference as reported by the record store
    pub owner: Option<String>,
    /// When the task was created
    pub created_at: Option<Timestamp>,
    /// When the task was last updated
    pub updated_at: Option<Timestamp>,
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }
}

/// Fields needed to create a task; the store assigns identity and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<Timestamp>,
    pub priority: Priority,
    pub status: Status,
    pub project_id: RecordId,
    pub tags: Tags,
    pub recurrence: Recurrence,
    pub reminder: Option<u32>,
}

impl NewTask {
    /// Validates the fields the record store would otherwise accept blindly.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if self.project_id <= 0 {
            return Err(TaskValidationError::MissingProject);
        }
        Ok(())
    }
}

/// Partial update; `None` leaves the stored field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    /// `Some(None)` clears the due date
    pub due_date: Option<Option<Timestamp>>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub project_id: Option<RecordId>,
    pub tags: Option<Tags>,
    pub recurrence: Option<Recurrence>,
    pub reminder: Option<Option<u32>>,
}

impl TaskUpdate {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            return Err(TaskValidationError::EmptyTitle);
        }
        if let Some(project_id) = self.project_id
            && project_id <= 0
        {
            return Err(TaskValidationError::MissingProject);
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskValidationError {
    #[error("Title is required")]
    EmptyTitle,

    #[error("Project is required")]
    MissingProject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    ToDo,
    InProgress,
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::ToDo, Status::InProgress, Status::Done];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::ToDo => "ToDo",
            Status::InProgress => "InProgress",
            Status::Done => "Done",
        }
    }

    /// Human-facing column label
    pub fn label(&self) -> &'static str {
        match self {
            Status::ToDo => "To Do",
            Status::InProgress => "In Progress",
            Status::Done => "Done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "todo" => Ok(Status::ToDo),
            "inprogress" => Ok(Status::InProgress),
            "done" | "completed" => Ok(Status::Done),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Chart order, most urgent first
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized priority '{0}'")]
pub struct UnknownPriority(pub String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(UnknownPriority(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized recurrence '{0}'")]
pub struct UnknownRecurrence(pub String);

impl FromStr for Recurrence {
    type Err = UnknownRecurrence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            _ => Err(UnknownRecurrence(s.to_string())),
        }
    }
}

/// Unordered set of tags, stored as a comma-delimited string by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tags(BTreeSet<String>);

impl Tags {
    pub fn parse(delimited: &str) -> Self {
        Self(
            delimited
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn to_delimited(&self) -> String {
        self.0.iter().cloned().collect::<Vec<_>>().join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .map(|tag: String| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_wire_and_cli_spellings() {
        assert_eq!("ToDo".parse::<Status>(), Ok(Status::ToDo));
        assert_eq!("in-progress".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!("In Progress".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!("done".parse::<Status>(), Ok(Status::Done));
        assert!("Blocked".parse::<Status>().is_err());
    }

    #[test]
    fn test_priority_parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!("low".parse::<Priority>(), Ok(Priority::Low));
        assert_eq!(
            "Urgent".parse::<Priority>(),
            Err(UnknownPriority("Urgent".to_string()))
        );
    }

    #[test]
    fn test_tags_ignore_order_and_blanks() {
        let a = Tags::parse("work, home,,urgent ");
        let b: Tags = ["urgent", "work", "home"].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.to_delimited(), "home,urgent,work");
        assert!(Tags::parse("  ").is_empty());
    }

    #[test]
    fn test_new_task_requires_title_and_project() {
        let task = NewTask {
            title: "  ".to_string(),
            project_id: 1,
            ..NewTask::default()
        };
        assert_eq!(task.validate(), Err(TaskValidationError::EmptyTitle));

        let task = NewTask {
            title: "Write report".to_string(),
            ..NewTask::default()
        };
        assert_eq!(task.validate(), Err(TaskValidationError::MissingProject));
    }
}
