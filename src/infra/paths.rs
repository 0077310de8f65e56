// src/infra/paths.rs — XDG-compliant path management
//
// All paths respect the TASKTRACK_HOME environment variable for isolation.
// When TASKTRACK_HOME is set, config and data live under that directory.
// When unset, config uses ~/.tasktrack/ and data uses XDG_DATA_HOME/tasktrack.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

fn tasktrack_home() -> Option<PathBuf> {
    std::env::var_os("TASKTRACK_HOME").map(PathBuf::from)
}

/// Home directory, falling back to the working directory when none is known.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $TASKTRACK_HOME/ or ~/.tasktrack/
pub fn config_dir() -> PathBuf {
    if let Some(home) = tasktrack_home() {
        return home;
    }
    dirs_home().join(".tasktrack")
}

/// Data directory: $TASKTRACK_HOME/data/ or ~/.local/share/tasktrack/
pub fn data_dir() -> PathBuf {
    if let Some(home) = tasktrack_home() {
        return home.join("data");
    }
    ProjectDirs::from("", "", "tasktrack")
        .map(|d| d.data_local_dir().to_path_buf())
        .unwrap_or_else(|| config_dir().join("data"))
}

pub fn db_path() -> PathBuf {
    data_dir().join("tasktrack.db")
}

/// State directory: ~/.tasktrack/state/ (timer-state.json)
pub fn state_dir() -> PathBuf {
    config_dir().join("state")
}

/// Durable local storage file for the in-flight timer.
pub fn timer_state_path() -> PathBuf {
    state_dir().join("timer-state.json")
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), state_dir(), data_dir()] {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
