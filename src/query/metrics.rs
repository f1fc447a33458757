use jiff::Zoned;

use crate::{
    models::{
        project::Project,
        task::{Priority, Status, Task},
    },
    query::filter::PresetFilter,
};

/// Tasks due on today's calendar date, whatever their status.
pub fn due_today(tasks: &[Task], now: &Zoned) -> usize {
    count_preset(tasks, PresetFilter::Today, now)
}

/// Done tasks due within the current week; shares the week window with the completed preset.
pub fn completed_this_week(tasks: &[Task], now: &Zoned) -> usize {
    count_preset(tasks, PresetFilter::Completed, now)
}

pub fn overdue(tasks: &[Task], now: &Zoned) -> usize {
    count_preset(tasks, PresetFilter::Overdue, now)
}

fn count_preset(tasks: &[Task], preset: PresetFilter, now: &Zoned) -> usize {
    tasks.iter().filter(|task| preset.matches(task, now)).count()
}

/// The three dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardMetrics {
    pub due_today: usize,
    pub completed_this_week: usize,
    pub overdue: usize,
}

impl DashboardMetrics {
    pub fn compute(tasks: &[Task], now: &Zoned) -> Self {
        Self {
            due_today: due_today(tasks, now),
            completed_this_week: completed_this_week(tasks, now),
            overdue: overdue(tasks, now),
        }
    }

    /// The preset a dashboard counter drills down into.
    pub fn drill_down(counter: DashboardCounter) -> PresetFilter {
        match counter {
            DashboardCounter::DueToday => PresetFilter::Today,
            DashboardCounter::CompletedThisWeek => PresetFilter::Completed,
            DashboardCounter::Overdue => PresetFilter::Overdue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardCounter {
    DueToday,
    CompletedThisWeek,
    Overdue,
}

impl DashboardCounter {
    pub const ALL: [DashboardCounter; 3] = [
        DashboardCounter::DueToday,
        DashboardCounter::CompletedThisWeek,
        DashboardCounter::Overdue,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DashboardCounter::DueToday => "Tasks Due Today",
            DashboardCounter::CompletedThisWeek => "Completed This Week",
            DashboardCounter::Overdue => "Overdue Tasks",
        }
    }

    pub fn value(&self, metrics: &DashboardMetrics) -> usize {
        match self {
            DashboardCounter::DueToday => metrics.due_today,
            DashboardCounter::CompletedThisWeek => metrics.completed_this_week,
            DashboardCounter::Overdue => metrics.overdue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusDistribution {
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
}

impl StatusDistribution {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::ToDo => self.todo,
            Status::InProgress => self.in_progress,
            Status::Done => self.done,
        }
    }

    pub fn total(&self) -> usize {
        self.todo + self.in_progress + self.done
    }
}

pub fn status_distribution(tasks: &[Task]) -> StatusDistribution {
    let mut distribution = StatusDistribution::default();
    for task in tasks {
        match task.status {
            Status::ToDo => distribution.todo += 1,
            Status::InProgress => distribution.in_progress += 1,
            Status::Done => distribution.done += 1,
        }
    }
    distribution
}

/// Counts per priority. Tasks whose priority was not recognized are left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriorityDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityDistribution {
    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

pub fn priority_distribution(tasks: &[Task]) -> PriorityDistribution {
    let mut distribution = PriorityDistribution::default();
    for priority in tasks.iter().filter_map(|task| task.priority) {
        match priority {
            Priority::High => distribution.high += 1,
            Priority::Medium => distribution.medium += 1,
            Priority::Low => distribution.low += 1,
        }
    }
    distribution
}

/// One entry per project in project order, including projects without tasks.
pub fn tasks_per_project<'a>(tasks: &[Task], projects: &'a [Project]) -> Vec<(&'a Project, usize)> {
    projects
        .iter()
        .map(|project| {
            let count = tasks
                .iter()
                .filter(|task| task.project_id == project.id)
                .count();
            (project, count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::{Timestamp, civil::date, tz::TimeZone};
    use pretty_assertions::assert_eq;

    fn monday() -> Zoned {
        date(2024, 6, 10).at(12, 0, 0, 0).to_zoned(TimeZone::UTC).unwrap()
    }

    fn due(y: i16, m: i8, d: i8) -> Option<Timestamp> {
        Some(date(y, m, d).at(18, 0, 0, 0).to_zoned(TimeZone::UTC).unwrap().timestamp())
    }

    fn task(status: Status, due_date: Option<Timestamp>) -> Task {
        Task {
            status,
            due_date,
            priority: Some(Priority::Medium),
            project_id: 1,
            ..Task::default()
        }
    }

    #[test]
    fn test_due_today_ignores_status() {
        let todo = vec![task(Status::ToDo, due(2024, 6, 10))];
        let done = vec![task(Status::Done, due(2024, 6, 10))];

        assert_eq!(due_today(&todo, &monday()), 1);
        assert_eq!(due_today(&done, &monday()), 1);
    }

    #[test]
    fn test_overdue_excludes_done() {
        let in_progress = vec![task(Status::InProgress, due(2024, 6, 5))];
        let done = vec![task(Status::Done, due(2024, 6, 5))];

        assert_eq!(overdue(&in_progress, &monday()), 1);
        assert_eq!(overdue(&done, &monday()), 0);
    }

    #[test]
    fn test_task_due_earlier_today_is_due_today_and_overdue() {
        let morning = date(2024, 6, 10).at(9, 0, 0, 0).to_zoned(TimeZone::UTC).unwrap();
        let tasks = vec![task(Status::ToDo, Some(morning.timestamp()))];

        assert_eq!(due_today(&tasks, &monday()), 1);
        assert_eq!(overdue(&tasks, &monday()), 1);
        assert!(PresetFilter::Today.matches(&tasks[0], &monday()));
        assert!(PresetFilter::Overdue.matches(&tasks[0], &monday()));
    }

    #[test]
    fn test_dashboard_metrics() {
        let tasks = vec![
            task(Status::ToDo, due(2024, 6, 10)),
            task(Status::Done, due(2024, 6, 9)),
            task(Status::Done, due(2024, 6, 15)),
            task(Status::Done, due(2024, 6, 16)),
            task(Status::InProgress, due(2024, 6, 1)),
            task(Status::ToDo, None),
        ];

        assert_eq!(
            DashboardMetrics::compute(&tasks, &monday()),
            DashboardMetrics {
                due_today: 1,
                completed_this_week: 2,
                overdue: 1,
            }
        );
    }

    #[test]
    fn test_distributions_sum() {
        let tasks = vec![
            Task {
                priority: Some(Priority::High),
                ..task(Status::Done, None)
            },
            Task {
                priority: None,
                ..task(Status::ToDo, None)
            },
            Task {
                priority: Some(Priority::Low),
                ..task(Status::InProgress, None)
            },
            task(Status::ToDo, None),
        ];

        let statuses = status_distribution(&tasks);
        let priorities = priority_distribution(&tasks);

        assert_eq!(
            statuses,
            StatusDistribution {
                todo: 2,
                in_progress: 1,
                done: 1,
            }
        );
        assert_eq!(statuses.total(), tasks.len());
        assert_eq!(
            priorities,
            PriorityDistribution {
                high: 1,
                medium: 1,
                low: 1,
            }
        );
        assert_eq!(priorities.total(), 3);
    }

    #[test]
    fn test_tasks_per_project_keeps_empty_projects() {
        let projects = vec![
            Project {
                id: 1,
                name: "Home".to_string(),
                ..Project::default()
            },
            Project {
                id: 2,
                name: "Work".to_string(),
                ..Project::default()
            },
        ];
        let tasks = vec![task(Status::ToDo, None), task(Status::Done, None)];

        let counts: Vec<_> = tasks_per_project(&tasks, &projects)
            .into_iter()
            .map(|(project, count)| (project.name.as_str(), count))
            .collect();

        assert_eq!(counts, vec![("Home", 2), ("Work", 0)]);
    }

    #[test]
    fn test_counters_drill_down_to_matching_presets() {
        let presets: Vec<_> = DashboardCounter::ALL
            .into_iter()
            .map(|counter| DashboardMetrics::drill_down(counter).as_str())
            .collect();

        assert_eq!(presets, vec!["today", "completed", "overdue"]);
    }
}
