use clap::{Parser, Subcommand};
use colored::*;
use jiff::{Timestamp, ToSpan, Zoned, civil::Date};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use taskflow::{
    config::{Backend, Config},
    models::{
        RecordId,
        project::{NewProject, ProjectUpdate},
        task::{NewTask, Priority, Recurrence, Status, Tags, TaskUpdate},
    },
    query::filter::{FilterValue, PresetFilter},
    repositories::{ProjectRepository, TaskRepository},
    services::{
        Dashboard, Notice, ProjectCommand, ProjectsView, SettingsService, TaskCommand,
        TaskViewParams, TasksView, ViewCommand, ViewMode, projects::delete_prompt,
        resolve_project,
    },
    state::{AppState, StateAction, Theme, User},
    storage::{RecordStore, http::HttpRecordStore, json::JsonFileStore, memory::MemoryStore},
    ui,
};

#[derive(Parser)]
#[command(name = "taskflow", about = "Tasks, projects and a dashboard in your terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show due-today, completed and overdue counts with charts
    Dashboard,

    /// List tasks
    Tasks {
        /// Match text in the title or description
        #[arg(short, long)]
        search: Option<String>,

        /// ToDo, InProgress, Done or all
        #[arg(long)]
        status: Option<String>,

        /// High, Medium, Low or all
        #[arg(long)]
        priority: Option<String>,

        /// Project id or name
        #[arg(short, long)]
        project: Option<String>,

        /// today, overdue or completed
        #[arg(short, long)]
        filter: Option<PresetFilter>,

        /// Show the three status columns
        #[arg(long)]
        board: bool,

        /// Show priority, tags and description under each task
        #[arg(long)]
        details: bool,
    },

    /// Add a new task
    Add {
        /// Task title
        title: String,

        /// Project id or name
        #[arg(short, long)]
        project: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Due date (e.g., "today", "tomorrow", "2025-03-01")
        #[arg(long)]
        due: Option<String>,

        #[arg(long, default_value = "Medium")]
        priority: Priority,

        /// Add tags (can be used multiple times)
        #[arg(short, long, action = clap::ArgAction::Append)]
        tag: Vec<String>,

        /// daily, weekly or monthly
        #[arg(long)]
        repeat: Option<Recurrence>,

        /// Minutes before the due date to be reminded
        #[arg(long)]
        remind: Option<u32>,
    },

    /// Edit a task
    Edit {
        id: RecordId,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        #[arg(long)]
        clear_due: bool,

        #[arg(long)]
        priority: Option<Priority>,

        #[arg(long)]
        status: Option<Status>,

        /// Project id or name
        #[arg(short, long)]
        project: Option<String>,

        /// Replace tags (can be used multiple times)
        #[arg(short, long, action = clap::ArgAction::Append)]
        tag: Vec<String>,

        #[arg(long)]
        repeat: Option<Recurrence>,

        #[arg(long)]
        remind: Option<u32>,
    },

    /// Toggle a task between done and to do
    Done { id: RecordId },

    /// Move a task to another status column
    Move { id: RecordId, status: Status },

    /// Delete a task
    Delete {
        id: RecordId,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommands),
}

#[derive(Debug, Subcommand)]
enum ProjectCommands {
    /// Create a new project
    New {
        name: String,
        /// Hex color such as #10b981
        #[arg(short, long)]
        color: Option<String>,
        #[arg(short, long, action = clap::ArgAction::Append)]
        tag: Vec<String>,
    },
    /// Edit a project
    Edit {
        project: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        color: Option<String>,
    },
    /// Delete a project and its tasks
    Delete {
        project: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// List all projects
    List,
}

#[derive(Debug, Subcommand)]
enum SettingsCommands {
    /// Show the current settings
    Show,
    /// Set the theme, or toggle it when no theme is given
    Theme { theme: Option<Theme> },
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "Error:".red(), message);
    std::process::exit(1);
}

fn open_store(config: &Config) -> Box<dyn RecordStore> {
    match config.backend {
        Backend::Json => Box::new(JsonFileStore::new(config.data_path())),
        Backend::Http => match config.http() {
            Ok(http) => Box::new(HttpRecordStore::new(http)),
            Err(e) => fail(e),
        },
        Backend::Memory => Box::new(MemoryStore::new()),
    }
}

/// Accepts "today", "tomorrow", a calendar date or a full timestamp
fn parse_due(raw: &str, now: &Zoned) -> Result<Timestamp, String> {
    let date = match raw.trim().to_lowercase().as_str() {
        "today" => now.date(),
        "tomorrow" => now
            .date()
            .checked_add(1.day())
            .map_err(|e| format!("Invalid due date '{}': {}", raw, e))?,
        _ => {
            if let Ok(timestamp) = raw.parse::<Timestamp>() {
                return Ok(timestamp);
            }
            raw.parse::<Date>()
                .map_err(|e| format!("Invalid due date '{}': {}", raw, e))?
        }
    };
    date.to_zoned(now.time_zone().clone())
        .map(|start| start.timestamp())
        .map_err(|e| format!("Invalid due date '{}': {}", raw, e))
}

fn project_id(store: &dyn RecordStore, id_or_name: &str) -> RecordId {
    let projects = match ProjectRepository::new(store).get_all() {
        Ok(projects) => projects,
        Err(e) => fail(format!("Failed to load projects: {}", e)),
    };
    match resolve_project(&projects, id_or_name) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            if !projects.is_empty() {
                eprintln!("\nAvailable projects:");
                for project in &projects {
                    eprintln!("  - {} (#{})", project.name, project.id);
                }
            }
            std::process::exit(1);
        }
    }
}

fn confirm(prompt: &str, yes: bool) -> bool {
    if yes {
        return true;
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or_else(|e| fail(format!("Failed to read confirmation: {}", e)))
}

fn finish(notice: Notice) {
    ui::render_notice(&notice);
    if notice.is_error() {
        std::process::exit(1);
    }
}

/// Tasks screen with everything loaded, exiting on a failed load
fn tasks_view<'a>(store: &'a dyn RecordStore, params: &TaskViewParams) -> TasksView<&'a dyn RecordStore> {
    let mut view = TasksView::new(store, params);
    view.load();
    if let Some(error) = view.error() {
        ui::render_page_error(error);
        std::process::exit(1);
    }
    view
}

fn projects_view(store: &dyn RecordStore) -> ProjectsView<&dyn RecordStore> {
    let mut view = ProjectsView::new(store);
    view.load();
    if let Some(error) = view.error() {
        ui::render_page_error(error);
        std::process::exit(1);
    }
    view
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_environment(&Config::default_path()).unwrap_or_else(|e| fail(e));

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("TASKFLOW_LOG")
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let store = open_store(&config);
    let store: &dyn RecordStore = store.as_ref();
    let now = Zoned::now();

    match cli.command.unwrap_or(Commands::Dashboard) {
        Commands::Dashboard => {
            let mut dashboard = Dashboard::new(store);
            dashboard.load();
            if let Some(error) = dashboard.error() {
                ui::render_page_error(error);
                std::process::exit(1);
            }
            ui::render_dashboard(&dashboard.view(&now), dashboard.projects(), &now);
        }
        Commands::Tasks {
            search,
            status,
            priority,
            project,
            filter,
            board,
            details,
        } => {
            let params = TaskViewParams {
                project: match project {
                    Some(p) => FilterValue::Specific(project_id(store, &p)),
                    None => FilterValue::Any,
                },
                preset: filter,
            };
            let mut view = tasks_view(store, &params);
            view.apply_view(ViewCommand::SetSearch(search.unwrap_or_default()));
            view.apply_view(ViewCommand::SetFilters {
                status: FilterValue::parse(status.as_deref().unwrap_or("all")),
                priority: FilterValue::parse(priority.as_deref().unwrap_or("all")),
                project: params.project.clone(),
            });
            if board {
                view.apply_view(ViewCommand::SetViewMode(ViewMode::Board));
            }

            let visible = view.visible(&now);
            if visible.is_empty() {
                println!("{}", view.empty_message());
                return;
            }
            let title = match filter {
                Some(preset) => format!("{} ({})", view.title(), preset),
                None => view.title(),
            };
            ui::render_view_header(&title, visible.len());
            match view.view_mode() {
                ViewMode::Board => ui::render_board(&view.board(&now), view.projects(), &now),
                ViewMode::List => {
                    for task in visible {
                        ui::render_task_line(task, view.projects(), &now);
                        if details {
                            ui::render_task_details(task);
                        }
                    }
                }
            }
            println!();
        }
        Commands::Add {
            title,
            project,
            description,
            due,
            priority,
            tag,
            repeat,
            remind,
        } => {
            let due_date = due.map(|raw| parse_due(&raw, &now).unwrap_or_else(|e| fail(e)));
            let task = NewTask {
                title,
                description,
                due_date,
                priority,
                status: Status::ToDo,
                project_id: project_id(store, &project),
                tags: tag.into_iter().collect(),
                recurrence: repeat.unwrap_or_default(),
                reminder: remind,
            };
            let mut view = TasksView::new(store, &TaskViewParams::default());
            finish(view.dispatch(TaskCommand::Create(task), &now));
        }
        Commands::Edit {
            id,
            title,
            description,
            clear_description,
            due,
            clear_due,
            priority,
            status,
            project,
            tag,
            repeat,
            remind,
        } => {
            let update = TaskUpdate {
                title,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
                due_date: if clear_due {
                    Some(None)
                } else {
                    due.map(|raw| Some(parse_due(&raw, &now).unwrap_or_else(|e| fail(e))))
                },
                priority,
                status,
                project_id: project.map(|p| project_id(store, &p)),
                tags: (!tag.is_empty()).then(|| tag.into_iter().collect::<Tags>()),
                recurrence: repeat,
                reminder: remind.map(Some),
            };
            if update.is_empty() {
                fail("Nothing to change. Pass at least one field to edit.");
            }
            let mut view = tasks_view(store, &TaskViewParams::default());
            finish(view.dispatch(TaskCommand::Update { id, update }, &now));
        }
        Commands::Done { id } => {
            let mut view = tasks_view(store, &TaskViewParams::default());
            finish(view.dispatch(TaskCommand::ToggleStatus(id), &now));
        }
        Commands::Move { id, status } => {
            let mut view = tasks_view(store, &TaskViewParams::default());
            finish(view.dispatch(TaskCommand::Move { id, status }, &now));
        }
        Commands::Delete { id, yes } => {
            let task = match TaskRepository::new(store).get_by_id(id) {
                Ok(task) => task,
                Err(e) => fail(e),
            };
            let confirmed = confirm(&format!("Delete task '{}'?", task.title), yes);
            let mut view = tasks_view(store, &TaskViewParams::default());
            finish(view.dispatch(TaskCommand::Delete { id, confirmed }, &now));
        }
        Commands::Project(ProjectCommands::New { name, color, tag }) => {
            let mut view = ProjectsView::new(store);
            finish(view.dispatch(ProjectCommand::Create(NewProject {
                name,
                color,
                tags: tag.into_iter().collect(),
            })));
        }
        Commands::Project(ProjectCommands::Edit {
            project,
            name,
            color,
        }) => {
            let id = project_id(store, &project);
            let mut view = projects_view(store);
            finish(view.dispatch(ProjectCommand::Update {
                id,
                update: ProjectUpdate {
                    name,
                    color,
                    ..ProjectUpdate::default()
                },
            }));
        }
        Commands::Project(ProjectCommands::Delete { project, yes }) => {
            let id = project_id(store, &project);
            let mut view = projects_view(store);
            let prompt = view.project(id).map(delete_prompt).unwrap_or_default();
            let confirmed = confirm(&prompt, yes);
            finish(view.dispatch(ProjectCommand::Delete { id, confirmed }));
        }
        Commands::Project(ProjectCommands::List) => {
            let view = projects_view(store);
            ui::render_projects(&view.cards());
        }
        Commands::Settings(command) => {
            let mut state = AppState::init();
            state.apply(StateAction::SetUser(User {
                id: config.user_id().to_string(),
                name: None,
                email: None,
            }));
            let service = SettingsService::new(store);
            if let Err(error) = service.load(&mut state, config.user_id()) {
                ui::render_page_error(&error);
                std::process::exit(1);
            }

            match command {
                SettingsCommands::Show => ui::render_settings(&state),
                SettingsCommands::Theme { theme } => {
                    let theme = theme.unwrap_or_else(|| state.theme.toggled());
                    finish(service.set_theme(&mut state, config.user_id(), theme));
                }
            }
        }
    }
}
