//! View coordinators.
//!
//! Each coordinator owns the loaded collections of one screen, turns command
//! descriptors into repository calls and derives what the screen shows.

use std::fmt;

use slug::slugify;
use thiserror::Error;

use crate::{
    models::{RecordId, project::Project},
    repositories::RepositoryError,
};

pub mod dashboard;
pub mod projects;
pub mod settings;
pub mod tasks;

pub use dashboard::Dashboard;
pub use projects::{ProjectCommand, ProjectsView};
pub use settings::SettingsService;
pub use tasks::{TaskCommand, TaskViewParams, TasksView, ViewCommand, ViewMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Error,
}

/// Short-lived feedback for the outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A failed load. The screen shows it until the user retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageError {
    pub message: String,
}

impl From<&RepositoryError> for PageError {
    fn from(error: &RepositoryError) -> Self {
        Self {
            message: error.to_string(),
        }
    }
}

/// Sequence number of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

/// Last-request-wins bookkeeping: only the newest ticket may apply its result.
#[derive(Debug, Default)]
pub struct LoadTracker {
    latest: u64,
}

impl LoadTracker {
    pub fn begin(&mut self) -> LoadTicket {
        self.latest += 1;
        LoadTicket(self.latest)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.latest
    }
}

/// Applies a load result if `ticket` is still the newest request.
///
/// Returns whether the result was applied. A stale result is dropped whether it
/// succeeded or not.
pub(crate) fn settle_load<T>(
    tracker: &LoadTracker,
    ticket: LoadTicket,
    result: Result<T, RepositoryError>,
    error: &mut Option<PageError>,
    apply: impl FnOnce(T),
) -> bool {
    if !tracker.is_current(ticket) {
        tracing::debug!(?ticket, "discarding stale load");
        return false;
    }
    match result {
        Ok(data) => {
            *error = None;
            apply(data);
        }
        Err(e) => {
            tracing::error!(error = %e, "load failed");
            *error = Some(PageError::from(&e));
        }
    }
    true
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveProjectError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),

    #[error("Project name is ambiguous. Multiple projects found: {}", .0.join(", "))]
    AmbiguousProjectName(Vec<String>),
}

/// Finds a project by id, or by a fragment of its name compared as slugs.
pub fn resolve_project(projects: &[Project], id_or_name: &str) -> Result<RecordId, ResolveProjectError> {
    if let Ok(id) = id_or_name.trim().parse::<RecordId>()
        && projects.iter().any(|p| p.id == id)
    {
        return Ok(id);
    }

    let wanted = slugify(id_or_name);
    if let Some(exact) = projects.iter().find(|p| slugify(&p.name) == wanted) {
        return Ok(exact.id);
    }

    let matching: Vec<_> = projects
        .iter()
        .filter(|p| !wanted.is_empty() && slugify(&p.name).contains(&wanted))
        .collect();
    match matching.as_slice() {
        [] => Err(ResolveProjectError::ProjectNotFound(id_or_name.to_string())),
        [project] => Ok(project.id),
        _ => Err(ResolveProjectError::AmbiguousProjectName(
            matching.iter().map(|p| p.name.clone()).collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    fn project(id: RecordId, name: &str) -> Project {
        Project {
            id,
            name: name.to_string(),
            ..Project::default()
        }
    }

    #[test]
    fn test_only_latest_ticket_applies() {
        let mut tracker = LoadTracker::default();
        let mut error = None;
        let mut applied = Vec::new();

        let first = tracker.begin();
        let second = tracker.begin();

        assert!(settle_load(&tracker, second, Ok(2), &mut error, |v| applied.push(v)));
        assert!(!settle_load(&tracker, first, Ok(1), &mut error, |v| applied.push(v)));
        assert_eq!(applied, vec![2]);
    }

    #[test]
    fn test_failed_load_sets_page_error() {
        let mut tracker = LoadTracker::default();
        let mut error = None;
        let ticket = tracker.begin();
        let failure: Result<(), _> = Err(RepositoryError::Storage(StorageError::RequestFailed {
            url: "memory://".to_string(),
            message: "down".to_string(),
        }));

        settle_load(&tracker, ticket, failure, &mut error, |_| {});

        assert!(error.is_some());

        let retry = tracker.begin();
        settle_load(&tracker, retry, Ok(()), &mut error, |_| {});
        assert_eq!(error, None);
    }

    #[test]
    fn test_resolve_project() {
        let projects = vec![
            project(1, "Home Renovation"),
            project(2, "Work"),
            project(3, "Homework"),
        ];

        assert_eq!(resolve_project(&projects, "2"), Ok(2));
        assert_eq!(resolve_project(&projects, "work"), Ok(2));
        assert_eq!(resolve_project(&projects, "renovation"), Ok(1));
        assert_eq!(
            resolve_project(&projects, "home"),
            Err(ResolveProjectError::AmbiguousProjectName(vec![
                "Home Renovation".to_string(),
                "Homework".to_string()
            ]))
        );
        assert_eq!(
            resolve_project(&projects, "garden"),
            Err(ResolveProjectError::ProjectNotFound("garden".to_string()))
        );
    }
}
