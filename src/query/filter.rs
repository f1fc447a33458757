use std::{fmt, str::FromStr};

use jiff::Zoned;

use crate::{
    models::{
        RecordId,
        task::{Priority, Status, Task},
    },
    query::dates::{is_due_this_week, is_due_today, is_past_due},
};

/// A field constraint; `"all"` and the empty string parse to `Any`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterValue<T> {
    #[default]
    Any,
    Specific(T),
    /// A value that could not be parsed; it matches nothing
    Unrecognized(String),
}

impl<T: PartialEq> FilterValue<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            FilterValue::Any => true,
            FilterValue::Specific(wanted) => wanted == value,
            FilterValue::Unrecognized(_) => false,
        }
    }

    /// Like `matches`, for fields that may hold no recognized value.
    pub fn matches_option(&self, value: Option<&T>) -> bool {
        match (self, value) {
            (FilterValue::Any, _) => true,
            (FilterValue::Specific(wanted), Some(value)) => wanted == value,
            _ => false,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, FilterValue::Any)
    }
}

impl<T: FromStr> FilterValue<T> {
    /// Never fails: malformed input becomes `Unrecognized`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return FilterValue::Any;
        }
        match trimmed.parse() {
            Ok(value) => FilterValue::Specific(value),
            Err(_) => {
                tracing::debug!(value = raw, "unrecognized filter value");
                FilterValue::Unrecognized(raw.to_string())
            }
        }
    }
}

impl<T: fmt::Display> fmt::Display for FilterValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Any => f.write_str("all"),
            FilterValue::Specific(value) => value.fmt(f),
            FilterValue::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

/// Named time windows reachable from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetFilter {
    Today,
    Overdue,
    /// Done and due within the current Sunday to Saturday week
    Completed,
}

impl PresetFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetFilter::Today => "today",
            PresetFilter::Overdue => "overdue",
            PresetFilter::Completed => "completed",
        }
    }

    pub fn matches(&self, task: &Task, now: &Zoned) -> bool {
        match self {
            PresetFilter::Today => is_due_today(task.due_date, now),
            PresetFilter::Overdue => !task.is_done() && is_past_due(task.due_date, now),
            PresetFilter::Completed => task.is_done() && is_due_this_week(task.due_date, now),
        }
    }
}

impl fmt::Display for PresetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unrecognized filter '{0}', expected today, overdue or completed")]
pub struct UnknownPreset(pub String);

impl FromStr for PresetFilter {
    type Err = UnknownPreset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(PresetFilter::Today),
            "overdue" => Ok(PresetFilter::Overdue),
            "completed" => Ok(PresetFilter::Completed),
            _ => Err(UnknownPreset(s.to_string())),
        }
    }
}

/// Everything that narrows the task list: search text, field filters and a preset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskQuery {
    pub search: String,
    pub status: FilterValue<Status>,
    pub priority: FilterValue<Priority>,
    pub project: FilterValue<RecordId>,
    pub preset: Option<PresetFilter>,
}

impl TaskQuery {
    pub fn matches(&self, task: &Task, now: &Zoned) -> bool {
        self.matches_search(task)
            && self.status.matches(&task.status)
            && self.priority.matches_option(task.priority.as_ref())
            && self.project.matches(&task.project_id)
            && self.preset.is_none_or(|preset| preset.matches(task, now))
    }

    fn matches_search(&self, task: &Task) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        task.title.to_lowercase().contains(&needle)
            || task
                .description
                .as_ref()
                .is_some_and(|description| description.to_lowercase().contains(&needle))
    }

    /// Whether anything narrows the list, used to pick the empty-state message.
    pub fn is_active(&self) -> bool {
        !self.search.is_empty()
            || !self.status.is_any()
            || !self.priority.is_any()
            || !self.project.is_any()
            || self.preset.is_some()
    }

    /// Resets field filters and search; the preset stays.
    pub fn clear_filters(&mut self) {
        self.search.clear();
        self.status = FilterValue::Any;
        self.priority = FilterValue::Any;
        self.project = FilterValue::Any;
    }
}

/// Stable filter: matching tasks in their original order.
pub fn filter_tasks<'a, I>(tasks: I, query: &TaskQuery, now: &Zoned) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|task| query.matches(task, now))
        .collect()
}

/// The three board columns. Together they partition their input.
#[derive(Debug, Default, PartialEq)]
pub struct StatusBuckets<'a> {
    pub todo: Vec<&'a Task>,
    pub in_progress: Vec<&'a Task>,
    pub done: Vec<&'a Task>,
}

impl<'a> StatusBuckets<'a> {
    pub fn get(&self, status: Status) -> &[&'a Task] {
        match status {
            Status::ToDo => &self.todo,
            Status::InProgress => &self.in_progress,
            Status::Done => &self.done,
        }
    }

    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn bucket_by_status<'a, I>(tasks: I) -> StatusBuckets<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut buckets = StatusBuckets::default();
    for task in tasks {
        match task.status {
            Status::ToDo => buckets.todo.push(task),
            Status::InProgress => buckets.in_progress.push(task),
            Status::Done => buckets.done.push(task),
        }
    }
    buckets
}
