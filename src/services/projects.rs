use thiserror::Error;

use crate::{
    models::{
        RecordId,
        project::{NewProject, Project, ProjectUpdate},
        task::Task,
    },
    query::metrics::tasks_per_project,
    repositories::{ProjectRepository, RepositoryError, TaskRepository},
    services::{LoadTicket, LoadTracker, Notice, PageError, settle_load},
    storage::RecordStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectCommand {
    Create(NewProject),
    Update { id: RecordId, update: ProjectUpdate },
    /// Deletes the project together with its tasks
    Delete { id: RecordId, confirmed: bool },
}

#[derive(Debug, Error)]
enum ProjectCommandError {
    #[error("Project {0} is not loaded")]
    NotLoaded(RecordId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Overwrites each project's `tasks_count` with the number of loaded tasks it owns.
pub fn with_task_counts(projects: Vec<Project>, tasks: &[Task]) -> Vec<Project> {
    let counts: Vec<usize> = tasks_per_project(tasks, &projects)
        .into_iter()
        .map(|(_, count)| count)
        .collect();
    projects
        .into_iter()
        .zip(counts)
        .map(|(project, tasks_count)| Project {
            tasks_count,
            ..project
        })
        .collect()
}

/// Done tasks of a project out of all its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProjectProgress {
    pub done: usize,
    pub total: usize,
}

impl ProjectProgress {
    /// Rounded to the nearest whole percent; 0 for a project without tasks.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            (self.done * 100 + self.total / 2) / self.total
        }
    }
}

pub fn project_progress(project_id: RecordId, tasks: &[Task]) -> ProjectProgress {
    tasks
        .iter()
        .filter(|task| task.project_id == project_id)
        .fold(ProjectProgress::default(), |progress, task| ProjectProgress {
            done: progress.done + usize::from(task.is_done()),
            total: progress.total + 1,
        })
}

/// Question asked before deleting a project.
pub fn delete_prompt(project: &Project) -> String {
    if project.tasks_count > 0 {
        format!(
            "This project has {} tasks. Are you sure you want to delete it? All tasks will be deleted too.",
            project.tasks_count
        )
    } else {
        "Are you sure you want to delete this project?".to_string()
    }
}

/// The projects screen.
pub struct ProjectsView<S> {
    store: S,
    projects: Vec<Project>,
    tasks: Vec<Task>,
    loads: LoadTracker,
    error: Option<PageError>,
}

impl<S: RecordStore> ProjectsView<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projects: Vec::new(),
            tasks: Vec::new(),
            loads: LoadTracker::default(),
            error: None,
        }
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.loads.begin()
    }

    pub fn fetch(&self) -> Result<(Vec<Project>, Vec<Task>), RepositoryError> {
        let projects = ProjectRepository::new(&self.store).get_all()?;
        let tasks = TaskRepository::new(&self.store).get_all()?;
        Ok((projects, tasks))
    }

    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<(Vec<Project>, Vec<Task>), RepositoryError>,
    ) -> bool {
        let (projects, tasks) = (&mut self.projects, &mut self.tasks);
        settle_load(&self.loads, ticket, result, &mut self.error, |(p, t)| {
            *projects = with_task_counts(p, &t);
            *tasks = t;
        })
    }

    pub fn load(&mut self) {
        let ticket = self.begin_load();
        let result = self.fetch();
        self.finish_load(ticket, result);
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Each loaded project with its completion progress.
    pub fn cards(&self) -> Vec<(&Project, ProjectProgress)> {
        self.projects
            .iter()
            .map(|project| (project, project_progress(project.id, &self.tasks)))
            .collect()
    }

    pub fn project(&self, id: RecordId) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn error(&self) -> Option<&PageError> {
        self.error.as_ref()
    }

    pub fn dispatch(&mut self, command: ProjectCommand) -> Notice {
        let failure = match &command {
            ProjectCommand::Create(_) => "Failed to create project",
            ProjectCommand::Update { .. } => "Failed to update project",
            ProjectCommand::Delete { .. } => "Failed to delete project",
        };
        match self.run(command) {
            Ok(notice) => notice,
            Err(e) => {
                tracing::warn!(error = %e, "project command failed");
                Notice::error(format!("{}: {}", failure, e))
            }
        }
    }

    fn run(&mut self, command: ProjectCommand) -> Result<Notice, ProjectCommandError> {
        let repository = ProjectRepository::new(&self.store);
        match command {
            ProjectCommand::Create(project) => {
                let created = repository.create(&project)?;
                self.projects.push(Project {
                    tasks_count: 0,
                    ..created
                });
                Ok(Notice::success("Project created successfully"))
            }
            ProjectCommand::Update { id, update } => {
                let Some(index) = self.projects.iter().position(|p| p.id == id) else {
                    return Err(ProjectCommandError::NotLoaded(id));
                };
                let updated = repository.update(id, &update)?;
                let tasks_count = self.projects[index].tasks_count;
                self.projects[index] = Project {
                    tasks_count,
                    ..updated
                };
                Ok(Notice::success("Project updated successfully"))
            }
            ProjectCommand::Delete { id, confirmed } => {
                if !confirmed {
                    return Ok(Notice::info("Delete cancelled"));
                }
                repository.delete(id)?;
                self.projects.retain(|p| p.id != id);
                match self.delete_tasks_of(id) {
                    Ok(()) => Ok(Notice::success("Project deleted successfully")),
                    Err(e) => {
                        tracing::warn!(id, error = %e, "project deleted but its tasks remain");
                        Ok(Notice::error(format!(
                            "Project deleted, but its tasks could not be removed: {}",
                            e
                        )))
                    }
                }
            }
        }
    }

    /// Removes the project's tasks from the store, then from the loaded list, one by one.
    fn delete_tasks_of(&mut self, project_id: RecordId) -> Result<(), RepositoryError> {
        let repository = TaskRepository::new(&self.store);
        for task in repository.get_by_project(project_id)? {
            repository.delete(task.id)?;
            self.tasks.retain(|t| t.id != task.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::task::{NewTask, Status, TaskUpdate},
        storage::memory::MemoryStore,
    };
    use pretty_assertions::assert_eq;

    fn new_project(name: &str) -> NewProject {
        NewProject {
            name: name.to_string(),
            ..NewProject::default()
        }
    }

    fn add_task(store: &MemoryStore, project_id: RecordId) {
        TaskRepository::new(store)
            .create(&NewTask {
                title: "t".to_string(),
                project_id,
                ..NewTask::default()
            })
            .unwrap();
    }

    #[test]
    fn test_counts_are_computed_from_loaded_tasks() {
        let store = MemoryStore::new();
        let projects = ProjectRepository::new(&store);
        let home = projects.create(&new_project("Home")).unwrap();
        let work = projects.create(&new_project("Work")).unwrap();
        // Stale stored count is ignored
        projects
            .update(
                work.id,
                &ProjectUpdate {
                    tasks_count: Some(9),
                    ..ProjectUpdate::default()
                },
            )
            .unwrap();
        add_task(&store, home.id);
        add_task(&store, home.id);

        let mut view = ProjectsView::new(&store);
        view.load();

        assert_eq!(view.project(home.id).map(|p| p.tasks_count), Some(2));
        assert_eq!(view.project(work.id).map(|p| p.tasks_count), Some(0));
    }

    #[test]
    fn test_progress_rounds_done_share() {
        let task = |project_id, status| Task {
            project_id,
            status,
            ..Task::default()
        };
        let tasks = vec![
            task(1, Status::Done),
            task(1, Status::ToDo),
            task(1, Status::InProgress),
            task(2, Status::Done),
        ];

        let home = project_progress(1, &tasks);
        assert_eq!(home, ProjectProgress { done: 1, total: 3 });
        assert_eq!(home.percent(), 33);
        assert_eq!(project_progress(2, &tasks).percent(), 100);
        assert_eq!(project_progress(3, &tasks).percent(), 0);
        assert_eq!(ProjectProgress { done: 1, total: 8 }.percent(), 13);
    }

    #[test]
    fn test_cards_pair_projects_with_progress() {
        let store = MemoryStore::new();
        let id = ProjectRepository::new(&store).create(&new_project("Home")).unwrap().id;
        add_task(&store, id);
        let mut view = ProjectsView::new(&store);
        view.load();
        let task_id = view.tasks[0].id;
        TaskRepository::new(&store)
            .update(task_id, &TaskUpdate::status(Status::Done))
            .unwrap();
        add_task(&store, id);
        view.load();

        let cards = view.cards();

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].1, ProjectProgress { done: 1, total: 2 });
        assert_eq!(cards[0].1.percent(), 50);
    }

    #[test]
    fn test_delete_prompt_mentions_tasks() {
        let project = Project {
            tasks_count: 3,
            ..Project::default()
        };

        assert!(delete_prompt(&project).starts_with("This project has 3 tasks."));
        assert_eq!(
            delete_prompt(&Project::default()),
            "Are you sure you want to delete this project?"
        );
    }

    #[test]
    fn test_create_update_and_delete() {
        let store = MemoryStore::new();
        let mut view = ProjectsView::new(&store);
        view.load();

        let notice = view.dispatch(ProjectCommand::Create(new_project("Garden")));
        assert_eq!(notice, Notice::success("Project created successfully"));
        let id = view.projects()[0].id;
        add_task(&store, id);
        view.load();

        view.dispatch(ProjectCommand::Update {
            id,
            update: ProjectUpdate {
                color: Some("#10b981".to_string()),
                ..ProjectUpdate::default()
            },
        });
        assert_eq!(view.projects()[0].color, "#10b981");
        assert_eq!(view.projects()[0].tasks_count, 1);

        assert_eq!(
            view.dispatch(ProjectCommand::Delete { id, confirmed: false }),
            Notice::info("Delete cancelled")
        );
        assert_eq!(view.projects().len(), 1);

        let notice = view.dispatch(ProjectCommand::Delete { id, confirmed: true });
        assert_eq!(notice, Notice::success("Project deleted successfully"));
        assert!(view.projects().is_empty());
        assert!(TaskRepository::new(&store).get_all().unwrap().is_empty());
    }

    #[test]
    fn test_rejected_project_delete_keeps_project_and_tasks() {
        let store = MemoryStore::new();
        let id = ProjectRepository::new(&store).create(&new_project("Home")).unwrap().id;
        add_task(&store, id);
        let mut view = ProjectsView::new(&store);
        view.load();

        store.fail_table("project");
        let notice = view.dispatch(ProjectCommand::Delete { id, confirmed: true });

        assert!(notice.message.starts_with("Failed to delete project"));
        assert_eq!(view.project(id).map(|p| p.tasks_count), Some(1));
        assert_eq!(TaskRepository::new(&store).get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_task_cleanup_failure_after_project_delete() {
        let store = MemoryStore::new();
        let id = ProjectRepository::new(&store).create(&new_project("Home")).unwrap().id;
        add_task(&store, id);
        let mut view = ProjectsView::new(&store);
        view.load();

        store.fail_table("task");
        let notice = view.dispatch(ProjectCommand::Delete { id, confirmed: true });

        assert!(notice.is_error());
        assert!(notice.message.starts_with("Project deleted, but"));
        assert!(view.projects().is_empty());
    }

    #[test]
    fn test_invalid_project_reports_error_and_keeps_list() {
        let store = MemoryStore::new();
        let mut view = ProjectsView::new(&store);

        let notice = view.dispatch(ProjectCommand::Create(NewProject {
            name: "Paint".to_string(),
            color: Some("red".to_string()),
            ..NewProject::default()
        }));

        assert!(notice.is_error());
        assert!(view.projects().is_empty());
    }
}
