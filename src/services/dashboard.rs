use jiff::Zoned;

use crate::{
    models::{
        RecordId,
        project::Project,
        task::{Task, TaskUpdate},
    },
    query::{
        dates::is_due_today,
        metrics::{
            DashboardCounter, DashboardMetrics, PriorityDistribution, StatusDistribution,
            priority_distribution, status_distribution, tasks_per_project,
        },
    },
    repositories::{ProjectRepository, RepositoryError, TaskRepository},
    services::{
        LoadTicket, LoadTracker, Notice, PageError,
        projects::with_task_counts,
        settle_load,
        tasks::{toggle_notice, toggled, write_update},
    },
    storage::RecordStore,
};

/// How many of today's tasks the dashboard lists before linking to the rest.
pub const TODAY_PREVIEW_LIMIT: usize = 4;

/// Everything the dashboard shows, derived from one snapshot of tasks.
#[derive(Debug, PartialEq)]
pub struct DashboardView<'a> {
    pub metrics: DashboardMetrics,
    pub statuses: StatusDistribution,
    pub priorities: PriorityDistribution,
    /// First few tasks due today
    pub due_today: Vec<&'a Task>,
    pub due_today_total: usize,
    pub projects: Vec<(&'a Project, usize)>,
}

/// Query string a dashboard counter links to on the tasks screen.
pub fn drill_down_link(counter: DashboardCounter) -> String {
    format!("filter={}", DashboardMetrics::drill_down(counter))
}

pub struct Dashboard<S> {
    store: S,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    loads: LoadTracker,
    error: Option<PageError>,
}

impl<S: RecordStore> Dashboard<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            tasks: Vec::new(),
            projects: Vec::new(),
            loads: LoadTracker::default(),
            error: None,
        }
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.loads.begin()
    }

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
            *projects = with_task_counts(p, &t);
            *tasks = t;
        })
    }

    pub fn load(&mut self) {
        let ticket = self.begin_load();
        let result = self.fetch();
        self.finish_load(ticket, result);
    }

    pub fn error(&self) -> Option<&PageError> {
        self.error.as_ref()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn view(&self, now: &Zoned) -> DashboardView<'_> {
        let today: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|task| is_due_today(task.due_date, now))
            .collect();

        DashboardView {
            metrics: DashboardMetrics::compute(&self.tasks, now),
            statuses: status_distribution(&self.tasks),
            priorities: priority_distribution(&self.tasks),
            due_today_total: today.len(),
            due_today: today.into_iter().take(TODAY_PREVIEW_LIMIT).collect(),
            projects: tasks_per_project(&self.tasks, &self.projects),
        }
    }

    /// Quick completion toggle from the today list.
    pub fn toggle_status(&mut self, id: RecordId, now: &Zoned) -> Notice {
        let Some(previous) = self.tasks.iter().find(|t| t.id == id).map(|t| t.status) else {
            return Notice::error(format!("Failed to update task: task {} is not loaded", id));
        };
        let status = toggled(previous);

        let update = TaskUpdate::status(status);
        match write_update(&self.store, &mut self.tasks, id, &update, previous, now) {
            Ok(()) => toggle_notice(status),
            Err(e) => {
                tracing::warn!(id, error = %e, "dashboard toggle failed");
                Notice::error(format!("Failed to update task: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            project::NewProject,
            task::{NewTask, Priority},
        },
        storage::memory::MemoryStore,
    };
    use jiff::{Timestamp, civil::date, tz::TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> Zoned {
        date(2024, 6, 10).at(12, 0, 0, 0).to_zoned(TimeZone::UTC).unwrap()
    }

    fn due(y: i16, m: i8, d: i8) -> Option<Timestamp> {
        Some(date(y, m, d).at(18, 0, 0, 0).to_zoned(TimeZone::UTC).unwrap().timestamp())
    }

    #[test]
    fn test_view_limits_today_preview() {
        let store = MemoryStore::new();
        let project = ProjectRepository::new(&store)
            .create(&NewProject {
                name: "Home".to_string(),
                ..NewProject::default()
            })
            .unwrap();
        let tasks = TaskRepository::new(&store);
        for i in 0..6 {
            tasks
                .create(&NewTask {
                    title: format!("today {}", i),
                    project_id: project.id,
                    due_date: due(2024, 6, 10),
                    priority: Priority::High,
                    ..NewTask::default()
                })
                .unwrap();
        }
        tasks
            .create(&NewTask {
                title: "late".to_string(),
                project_id: project.id,
                due_date: due(2024, 6, 3),
                ..NewTask::default()
            })
            .unwrap();

        let mut dashboard = Dashboard::new(&store);
        dashboard.load();
        let view = dashboard.view(&now());

        assert_eq!(view.due_today.len(), TODAY_PREVIEW_LIMIT);
        assert_eq!(view.due_today_total, 6);
        assert_eq!(view.metrics.overdue, 1);
        assert_eq!(view.statuses.total(), 7);
        assert_eq!(view.priorities.high, 6);
        assert_eq!(view.projects[0].1, 7);
    }

    #[test]
    fn test_toggle_from_dashboard_updates_metrics() {
        let store = MemoryStore::new();
        let id = TaskRepository::new(&store)
            .create(&NewTask {
                title: "today".to_string(),
                project_id: 1,
                due_date: due(2024, 6, 10),
                ..NewTask::default()
            })
            .unwrap()
            .id;
        let mut dashboard = Dashboard::new(&store);
        dashboard.load();

        let notice = dashboard.toggle_status(id, &now());

        assert_eq!(notice, Notice::success("Task marked as completed"));
        assert_eq!(dashboard.view(&now()).metrics.completed_this_week, 1);
    }

    #[test]
    fn test_drill_down_links() {
        assert_eq!(drill_down_link(DashboardCounter::DueToday), "filter=today");
        assert_eq!(drill_down_link(DashboardCounter::CompletedThisWeek), "filter=completed");
        assert_eq!(drill_down_link(DashboardCounter::Overdue), "filter=overdue");
    }
}
