// src/cli/mod.rs — CLI definition (clap derive)

pub mod calendar;
pub mod export;
pub mod records;
pub mod serve;
pub mod timer;

use clap::{Parser, Subcommand};

use crate::infra::paths;
use crate::store::Store;

/// Open the on-disk database, creating and migrating it if needed.
pub fn open_store() -> anyhow::Result<Store> {
    Store::open(&paths::db_path())
}

#[derive(Parser)]
#[command(name = "tasktrack", about = "Per-task time tracking", version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API with a live ticking timer
    Serve {
        /// Port to listen on (overrides [api].port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Control the task timer
    Timer {
        #[command(subcommand)]
        action: TimerCmd,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Write a user's iCalendar feed
    Calendar {
        /// Calendar token of the user
        #[arg(long, conflicts_with = "user", required_unless_present = "user")]
        token: Option<String>,
        /// User id
        #[arg(long)]
        user: Option<String>,
        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Export users, projects, tasks and recorded time
    Export {
        /// Export format (json, yaml)
        #[arg(long, default_value = "json")]
        format: String,
        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum TimerCmd {
    /// Show the timer state
    Status,
    /// Select the task to time
    Select { task_id: String },
    Start,
    Pause,
    /// Start if stopped, pause if running
    Toggle,
    /// Record the elapsed time on the task and restart from zero
    Save,
    /// Zero the counter without recording it
    Reset,
    /// Delete a recorded interval by its position in `status`
    Delete { index: usize },
    /// Deselect the task
    Clear,
}

#[derive(Subcommand, Clone)]
pub enum UserAction {
    Add {
        first_name: String,
        last_name: String,
        email: String,
    },
    List,
}

#[derive(Subcommand, Clone)]
pub enum ProjectAction {
    Add {
        /// Owning user id
        #[arg(long)]
        user: String,
        title: String,
    },
    List {
        /// Only projects of this user
        #[arg(long)]
        user: Option<String>,
    },
    /// Rename or (de)activate a project
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Mark the project active or inactive
        #[arg(long)]
        active: Option<bool>,
    },
    /// Delete a project with its tasks and recorded time
    Delete { id: String },
}

#[derive(Subcommand, Clone)]
pub enum TaskAction {
    Add {
        /// Project id
        #[arg(long)]
        project: String,
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },
    List {
        #[arg(long)]
        project: Option<String>,
    },
    /// Move a task to todo, inProgress or done
    Status { id: String, status: String },
    /// Change a task's title, description, dates or project
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Move the task to another project
        #[arg(long)]
        project: Option<String>,
        /// Remove both dates
        #[arg(long, conflicts_with_all = ["start", "end"])]
        clear_dates: bool,
    },
    /// Delete a task and its recorded time
    Delete { id: String },
}
