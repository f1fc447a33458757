use colored::*;
use jiff::{Timestamp, ToSpan, Zoned};

use crate::{
    models::{
        project::Project,
        setting::THEME_SETTING,
        task::{Priority, Recurrence, Status, Task},
    },
    query::{
        dates::{is_past_due, local_date},
        filter::StatusBuckets,
        metrics::{DashboardCounter, DashboardMetrics},
    },
    services::{Notice, NoticeKind, PageError, dashboard::DashboardView, projects::ProjectProgress},
    state::AppState,
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// Glyph for a task's status; open tasks past their due date are red
pub fn get_status_glyph(task: &Task, now: &Zoned) -> ColoredString {
    match task.status {
        Status::Done => "✓".dimmed(),
        _ if is_past_due(task.due_date, now) => "●".red(),
        Status::InProgress => "◐".yellow(),
        Status::ToDo => "○".normal(),
    }
}

pub fn priority_label(priority: Option<Priority>) -> ColoredString {
    match priority {
        Some(Priority::High) => "High".red(),
        Some(Priority::Medium) => "Medium".yellow(),
        Some(Priority::Low) => "Low".green(),
        None => "?".dimmed(),
    }
}

/// `(r, g, b)` of a `#rgb` or `#rrggbb` color
pub fn hex_to_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let digits = color.strip_prefix('#').filter(|d| d.is_ascii())?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        6 => Some((
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        3 => {
            let mut expanded = digits.chars().map(|c| channel(&format!("{}{}", c, c)));
            Some((expanded.next()??, expanded.next()??, expanded.next()??))
        }
        _ => None,
    }
}

fn project_name(project: &Project) -> ColoredString {
    match hex_to_rgb(&project.color) {
        Some((r, g, b)) => project.name.truecolor(r, g, b),
        None => project.name.blue(),
    }
}

/// Due date relative to today (e.g., "Today", "Tomorrow", "Jun 10")
pub fn format_due(due: Timestamp, now: &Zoned) -> String {
    let date = local_date(due, now);
    let today = now.date();

    if date == today {
        "Today".to_string()
    } else if today.checked_add(1.day()).is_ok_and(|tomorrow| date == tomorrow) {
        "Tomorrow".to_string()
    } else if today.checked_sub(1.day()).is_ok_and(|yesterday| date == yesterday) {
        "Yesterday".to_string()
    } else if date.year() == today.year() {
        date.strftime("%b %d").to_string()
    } else {
        date.strftime("%b %d, %Y").to_string()
    }
}

/// Right-hand context of a task line: due date and project
fn get_task_context<'a>(task: &Task, projects: &'a [Project], now: &Zoned) -> (String, Option<&'a Project>) {
    let due = task.due_date.map(|due| format_due(due, now)).unwrap_or_default();
    let project = projects.iter().find(|p| p.id == task.project_id);
    (due, project)
}

/// Render a single task line with ID, glyph, title, and right-aligned context
pub fn render_task_line(task: &Task, projects: &[Project], now: &Zoned) {
    let terminal_width = get_terminal_width();

    let id_str = format!("{:>4}", task.id);
    let glyph = get_status_glyph(task, now);
    let left_section = format!("  {}  {}  {}", id_str, glyph, task.title);
    let left_visible_len = format!("  {}  {}  {}", id_str, " ", task.title).chars().count();

    let styled_left = if task.is_done() {
        left_section.dimmed()
    } else {
        left_section.bold()
    };

    let (due, project) = get_task_context(task, projects, now);
    let right_plain = match (project, due.is_empty()) {
        (Some(p), false) => format!("{}  ·  {}", due, p.name),
        (Some(p), true) => p.name.clone(),
        (None, _) => due.clone(),
    };
    let right_styled = match project {
        Some(p) if !due.is_empty() => format!("{}  ·  {}", due.dimmed(), project_name(p)),
        Some(p) => project_name(p).to_string(),
        None => due.dimmed().to_string(),
    };

    let total_content = left_visible_len + right_plain.chars().count();
    if !right_plain.is_empty() && total_content + 4 < terminal_width {
        let padding = terminal_width - total_content - 2;
        println!("{}{}{}", styled_left, " ".repeat(padding), right_styled);
    } else {
        println!("{}", styled_left);
    }
}

/// Render the extra lines shown under a task in detail mode
pub fn render_task_details(task: &Task) {
    let mut meta_parts = vec![
        format!("{} {}", "Priority:".dimmed(), priority_label(task.priority)),
        format!("{} {}", "Status:".dimmed(), task.status.label()),
    ];
    if !task.tags.is_empty() {
        meta_parts.push(task.tags.to_delimited().replace(',', ", "));
    }
    if task.recurrence != Recurrence::None {
        meta_parts.push(format!("repeats {}", task.recurrence));
    }
    println!("          {}", meta_parts.join(&format!(" {} ", "•".dimmed())));
    if let Some(description) = &task.description {
        println!("          {}", description.dimmed());
    }
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize) {
    let task_word = if count == 1 { "task" } else { "tasks" };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, task_word);
}

/// Render a section header (e.g., "In Progress", "Due Today")
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

/// Render the three status columns one after another
pub fn render_board(buckets: &StatusBuckets<'_>, projects: &[Project], now: &Zoned) {
    for status in Status::ALL {
        let tasks = buckets.get(status);
        render_section_header(&format!("{} ({})", status.label(), tasks.len()));
        if tasks.is_empty() {
            println!("    {}", "No tasks".dimmed());
        }
        for task in tasks {
            render_task_line(task, projects, now);
        }
    }
}

/// A horizontal bar of `value` out of `total`, `width` cells wide
pub fn bar(value: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        ((value * width) + total / 2) / total
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(width.saturating_sub(filled)))
}

fn render_distribution_row(label: &str, value: usize, total: usize) {
    println!("    {:<12} {} {}", label, bar(value, total, 20).cyan(), value);
}

pub fn render_dashboard(view: &DashboardView<'_>, projects: &[Project], now: &Zoned) {
    println!("\n  {}\n", "Dashboard".cyan().bold());

    for counter in DashboardCounter::ALL {
        let value = counter.value(&view.metrics);
        let styled = match counter {
            DashboardCounter::Overdue if value > 0 => value.to_string().red().bold(),
            _ => value.to_string().bold(),
        };
        println!(
            "    {:<22} {}   {}",
            counter.label(),
            styled,
            format!("taskflow tasks --filter {}", DashboardMetrics::drill_down(counter)).dimmed()
        );
    }

    render_section_header("By status");
    let total = view.statuses.total();
    for status in Status::ALL {
        render_distribution_row(status.label(), view.statuses.get(status), total);
    }

    render_section_header("By priority");
    let total = view.priorities.total();
    for priority in Priority::ALL {
        render_distribution_row(priority.as_str(), view.priorities.get(priority), total);
    }

    render_section_header("Due today");
    if view.due_today.is_empty() {
        println!("    {}", "No tasks are due today. Great work!".dimmed());
    }
    for task in &view.due_today {
        render_task_line(task, projects, now);
    }
    if view.due_today_total > view.due_today.len() {
        println!(
            "\n    {}",
            format!(
                "View all {} tasks: taskflow tasks --filter today",
                view.due_today_total
            )
            .dimmed()
        );
    }

    render_section_header("Projects");
    if view.projects.is_empty() {
        println!("    {}", "No projects yet".dimmed());
    }
    for (project, count) in &view.projects {
        println!(
            "    {} {} {}",
            "•".green(),
            project_name(project).bold(),
            format!("({} {})", count, if *count == 1 { "task" } else { "tasks" }).dimmed()
        );
    }
    println!();
}

pub fn render_projects(cards: &[(&Project, ProjectProgress)]) {
    if cards.is_empty() {
        println!("No projects yet");
        return;
    }

    println!(
        "{} ({} {})\n",
        "PROJECTS".cyan(),
        cards.len(),
        if cards.len() == 1 {
            "project"
        } else {
            "projects"
        }
    );

    for (project, progress) in cards {
        println!(
            "{} {} {}",
            "•".green(),
            project_name(project).bold(),
            format!("#{}", project.id).dimmed()
        );
        if !project.tags.is_empty() {
            println!("    {} {}", "Tags:".dimmed(), project.tags.to_delimited());
        }
        println!(
            "    {} {}   {} {}",
            project.tasks_count.to_string().dimmed(),
            if project.tasks_count == 1 { "task" } else { "tasks" }.dimmed(),
            bar(progress.done, progress.total, 10).green(),
            format!("{}% complete", progress.percent()).dimmed()
        );
        println!("    {}", "─".repeat(30).dimmed());
        println!();
    }
}

pub fn render_settings(state: &AppState) {
    println!("\n  {}\n", "Settings".cyan().bold());
    println!("    {:<12} {}", "Theme", state.theme.as_str().bold());
    for setting in state.settings.iter().filter(|s| s.name != THEME_SETTING) {
        println!(
            "    {:<12} {} {}",
            setting.name,
            setting.value,
            format!("({})", setting.mode).dimmed()
        );
    }
    println!();
}

pub fn render_notice(notice: &Notice) {
    match notice.kind {
        NoticeKind::Success => println!("{} {}", "✓".green(), notice.message),
        NoticeKind::Info => println!("{}", notice.message.dimmed()),
        NoticeKind::Error => eprintln!("{} {}", "Error:".red(), notice.message),
    }
}

pub fn render_page_error(error: &PageError) {
    eprintln!("{} {}", "Error:".red(), error.message);
    eprintln!("{}", "Run the command again to retry.".dimmed());
}
