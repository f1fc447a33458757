use jiff::Zoned;
use thiserror::Error;

use crate::{
    models::{
        RecordId,
        project::Project,
        task::{NewTask, Priority, Status, Task, TaskUpdate},
    },
    query::{
        filter::{FilterValue, PresetFilter, StatusBuckets, TaskQuery, bucket_by_status, filter_tasks},
        recurrence::next_occurrence,
    },
    repositories::{ProjectRepository, RepositoryError, TaskRepository},
    services::{LoadTicket, LoadTracker, Notice, PageError, settle_load},
    storage::RecordStore,
};

/// Initial state of the tasks screen, taken from navigation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskViewParams {
    pub project: FilterValue<RecordId>,
    pub preset: Option<PresetFilter>,
}

impl TaskViewParams {
    /// Reads `project=<id>` and `filter=today|overdue|completed` from a query string.
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::default();
        for pair in query.trim_start_matches('?').split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "project" => params.project = FilterValue::parse(value),
                "filter" => params.preset = parse_preset(value),
                "" => {}
                other => tracing::debug!(key = other, "ignoring query parameter"),
            }
        }
        params
    }

    pub fn to_query(&self) -> TaskQuery {
        TaskQuery {
            project: self.project.clone(),
            preset: self.preset,
            ..TaskQuery::default()
        }
    }
}

/// An unknown preset means no preset rather than an empty list.
pub fn parse_preset(raw: &str) -> Option<PresetFilter> {
    if raw.trim().is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(preset) => Some(preset),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring filter parameter");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Board,
}

/// Changes to what the tasks screen shows; none of them touch the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    SetSearch(String),
    SetFilters {
        status: FilterValue<Status>,
        priority: FilterValue<Priority>,
        project: FilterValue<RecordId>,
    },
    SetPreset(Option<PresetFilter>),
    ClearFilters,
    SetViewMode(ViewMode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    Create(NewTask),
    Update { id: RecordId, update: TaskUpdate },
    /// Done becomes ToDo, anything else becomes Done
    ToggleStatus(RecordId),
    /// Board column move
    Move { id: RecordId, status: Status },
    Delete { id: RecordId, confirmed: bool },
}

#[derive(Debug, Error)]
enum TaskCommandError {
    #[error("Task {0} is not loaded")]
    NotLoaded(RecordId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// The tasks screen: loaded tasks and projects, the active query and the view mode.
pub struct TasksView<S> {
    store: S,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    query: TaskQuery,
    view_mode: ViewMode,
    loads: LoadTracker,
    error: Option<PageError>,
}

impl<S: RecordStore> TasksView<S> {
    pub fn new(store: S, params: &TaskViewParams) -> Self {
        Self {
            store,
            tasks: Vec::new(),
            projects: Vec::new(),
            query: params.to_query(),
            view_mode: ViewMode::default(),
            loads: LoadTracker::default(),
            error: None,
        }
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.loads.begin()
    }

    /// Every task and every project; the project filter narrows them in memory
    /// so it can change without a reload.
    pub fn fetch(&self) -> Result<(Vec<Task>, Vec<Project>), RepositoryError> {
        let tasks = TaskRepository::new(&self.store).get_all()?;
        let projects = ProjectRepository::new(&self.store).get_all()?;
        Ok((tasks, projects))
    }

    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<(Vec<Task>, Vec<Project>), RepositoryError>,
    ) -> bool {
        let (tasks, projects) = (&mut self.tasks, &mut self.projects);
        settle_load(&self.loads, ticket, result, &mut self.error, |(t, p)| {
            *tasks = t;
            *projects = p;
        })
    }

    /// Loads (or retries loading) the screen's data.
    pub fn load(&mut self) {
        let ticket = self.begin_load();
        let result = self.fetch();
        self.finish_load(ticket, result);
    }

    pub fn error(&self) -> Option<&PageError> {
        self.error.as_ref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn query(&self) -> &TaskQuery {
        &self.query
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// `"<Project> Tasks"` for a known selected project, `"All Tasks"` otherwise.
    pub fn title(&self) -> String {
        match &self.query.project {
            FilterValue::Specific(id) => match self.projects.iter().find(|p| p.id == *id) {
                Some(project) => format!("{} Tasks", project.name),
                None => "All Tasks".to_string(),
            },
            _ => "All Tasks".to_string(),
        }
    }

    pub fn visible(&self, now: &Zoned) -> Vec<&Task> {
        filter_tasks(&self.tasks, &self.query, now)
    }

    pub fn board(&self, now: &Zoned) -> StatusBuckets<'_> {
        bucket_by_status(self.visible(now))
    }

    /// Message for an empty list: filters hide everything, or there is nothing yet.
    pub fn empty_message(&self) -> &'static str {
        if self.query.is_active() && !self.tasks.is_empty() {
            "No results found"
        } else {
            "No tasks yet"
        }
    }

    pub fn apply_view(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::SetSearch(search) => self.query.search = search,
            ViewCommand::SetFilters {
                status,
                priority,
                project,
            } => {
                self.query.status = status;
                self.query.priority = priority;
                self.query.project = project;
            }
            ViewCommand::SetPreset(preset) => self.query.preset = preset,
            ViewCommand::ClearFilters => self.query.clear_filters(),
            ViewCommand::SetViewMode(mode) => self.view_mode = mode,
        }
    }

    /// Runs a command against the store and mirrors the result in memory.
    ///
    /// The loaded tasks only change when the store call succeeded.
    pub fn dispatch(&mut self, command: TaskCommand, now: &Zoned) -> Notice {
        let failure = failure_message(&command);
        match self.run(command, now) {
            Ok(notice) => notice,
            Err(e) => {
                tracing::warn!(error = %e, "task command failed");
                Notice::error(format!("{}: {}", failure, e))
            }
        }
    }

    fn run(&mut self, command: TaskCommand, now: &Zoned) -> Result<Notice, TaskCommandError> {
        match command {
            TaskCommand::Create(task) => {
                let created = TaskRepository::new(&self.store).create(&task)?;
                self.tasks.insert(0, created);
                Ok(Notice::success("Task created successfully"))
            }
            TaskCommand::Update { id, update } => {
                let previous = self.status_of(id)?;
                self.write(id, &update, previous, now)?;
                Ok(Notice::success("Task updated successfully"))
            }
            TaskCommand::ToggleStatus(id) => {
                let previous = self.status_of(id)?;
                let status = toggled(previous);
                self.write(id, &TaskUpdate::status(status), previous, now)?;
                Ok(toggle_notice(status))
            }
            TaskCommand::Move { id, status } => {
                let previous = self.status_of(id)?;
                if previous == status {
                    return Ok(Notice::info(format!("Task is already in {}", status.label())));
                }
                self.write(id, &TaskUpdate::status(status), previous, now)?;
                Ok(Notice::success(format!("Task moved to {}", status.label())))
            }
            TaskCommand::Delete { id, confirmed } => {
                if !confirmed {
                    return Ok(Notice::info("Delete cancelled"));
                }
                TaskRepository::new(&self.store).delete(id)?;
                self.tasks.retain(|task| task.id != id);
                Ok(Notice::success("Task deleted successfully"))
            }
        }
    }

    fn status_of(&self, id: RecordId) -> Result<Status, TaskCommandError> {
        self.tasks
            .iter()
            .find(|task| task.id == id)
            .map(|task| task.status)
            .ok_or(TaskCommandError::NotLoaded(id))
    }

    fn write(
        &mut self,
        id: RecordId,
        update: &TaskUpdate,
        previous: Status,
        now: &Zoned,
    ) -> Result<(), TaskCommandError> {
        Ok(write_update(&self.store, &mut self.tasks, id, update, previous, now)?)
    }
}

/// Writes an update, then expands recurrence when the task has just been completed.
///
/// `tasks` is only touched after the store accepted the update.
pub(crate) fn write_update<S: RecordStore>(
    store: &S,
    tasks: &mut Vec<Task>,
    id: RecordId,
    update: &TaskUpdate,
    previous: Status,
    now: &Zoned,
) -> Result<(), RepositoryError> {
    let repository = TaskRepository::new(store);
    let updated = repository.update(id, update)?;

    let next = if updated.is_done() {
        next_occurrence(&updated, previous, now.time_zone())
    } else {
        None
    };
    if let Some(slot) = tasks.iter_mut().find(|task| task.id == id) {
        *slot = updated;
    }

    if let Some(next) = next {
        match repository.create(&next) {
            Ok(created) => {
                tracing::debug!(id, next_id = created.id, "created next occurrence");
                tasks.insert(0, created);
            }
            // The completion itself went through
            Err(e) => tracing::error!(id, error = %e, "failed to create next occurrence"),
        }
    }
    Ok(())
}

/// Status a completion toggle moves to.
pub fn toggled(status: Status) -> Status {
    if status == Status::Done {
        Status::ToDo
    } else {
        Status::Done
    }
}

pub(crate) fn toggle_notice(status: Status) -> Notice {
    Notice::success(if status == Status::Done {
        "Task marked as completed"
    } else {
        "Task marked as pending"
    })
}

fn failure_message(command: &TaskCommand) -> &'static str {
    match command {
        TaskCommand::Create(_) => "Failed to create task",
        TaskCommand::Delete { .. } => "Failed to delete task",
        _ => "Failed to update task",
    }
}
