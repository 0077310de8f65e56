// src/cli/records.rs — User, project and task management

use chrono::NaiveDate;

use super::{open_store, ProjectAction, TaskAction, UserAction};
use crate::infra::errors::TrackError;
use crate::store::types::{Task, TaskStatus};
use crate::store::Store;
use crate::timer::format::format_duration;

pub async fn run_user(action: UserAction) -> anyhow::Result<()> {
    let store = open_store()?;
    match action {
        UserAction::Add {
            first_name,
            last_name,
            email,
        } => {
            let user = store.insert_user(&first_name, &last_name, &email)?;
            println!("Created user {} ({})", user.full_name(), user.id);
            println!("  Calendar token: {}", user.calendar_token);
        }
        UserAction::List => {
            let users = store.list_users()?;
            if users.is_empty() {
                println!("No users yet. Run `tasktrack user add`.");
            }
            for user in users {
                println!("{}  {} <{}>", user.id, user.full_name(), user.email);
            }
        }
    }
    Ok(())
}

pub async fn run_project(action: ProjectAction) -> anyhow::Result<()> {
    let store = open_store()?;
    match action {
        ProjectAction::Add { user, title } => {
            if store.get_user(&user)?.is_none() {
                anyhow::bail!("User '{}' not found", user);
            }
            let project = store.insert_project(&user, &title)?;
            println!("Created project {} [{}] ({})", project.title, project.slug, project.id);
        }
        ProjectAction::List { user } => {
            for project in store.list_projects(user.as_deref())? {
                let active = if project.is_active { "" } else { " (inactive)" };
                println!("{}  {} [{}]{}", project.id, project.title, project.slug, active);
            }
        }
        ProjectAction::Edit { id, title, active } => {
            let mut project = store
                .get_project(&id)?
                .ok_or_else(|| TrackError::ProjectNotFound { id: id.clone() })?;
            if let Some(title) = title {
                project.title = title;
            }
            if let Some(active) = active {
                project.is_active = active;
            }
            store.update_project(&project)?;
            let project = store.get_project(&id)?.unwrap_or(project);
            println!("Updated project {} [{}]", project.title, project.slug);
        }
        ProjectAction::Delete { id } => {
            if !store.delete_project(&id)? {
                return Err(TrackError::ProjectNotFound { id }.into());
            }
            println!("Deleted project {} with its tasks", id);
        }
    }
    Ok(())
}

/// Field changes for `task edit`; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub project: Option<String>,
    pub clear_dates: bool,
}

/// Apply `edit` to the stored task and write it back.
pub fn edit_task(store: &Store, id: &str, edit: TaskEdit) -> anyhow::Result<Task> {
    let mut task = store
        .get_task(id)?
        .ok_or_else(|| TrackError::TaskNotFound { id: id.to_string() })?;

    if let Some(title) = edit.title {
        task.title = title;
    }
    if let Some(description) = edit.description {
        task.description = Some(description).filter(|d| !d.is_empty());
    }
    if edit.clear_dates {
        task.start_date = None;
        task.end_date = None;
    }
    if edit.start.is_some() {
        task.start_date = edit.start;
    }
    if edit.end.is_some() {
        task.end_date = edit.end;
    }
    if let (Some(start), Some(end)) = (task.start_date, task.end_date) {
        if end < start {
            anyhow::bail!("End date {} is before start date {}", end, start);
        }
    }
    if let Some(project) = edit.project {
        task.project_id = project;
    }

    store.update_task(&task)?;
    Ok(task)
}

pub async fn run_task(action: TaskAction) -> anyhow::Result<()> {
    let store = open_store()?;
    match action {
        TaskAction::Add {
            project,
            title,
            description,
            start,
            end,
        } => {
            if store.get_project(&project)?.is_none() {
                return Err(TrackError::ProjectNotFound { id: project }.into());
            }
            let start = parse_date(start.as_deref())?;
            let end = parse_date(end.as_deref())?;
            let task = store.insert_task(&project, &title, description.as_deref(), start, end)?;
            println!("Created task {} ({})", task.title, task.id);
        }
        TaskAction::List { project } => list_tasks(&store, project.as_deref())?,
        TaskAction::Status { id, status } => {
            let status: TaskStatus = status.parse()?;
            if !store.update_task_status(&id, status)? {
                return Err(TrackError::TaskNotFound { id }.into());
            }
            println!("Task {} is now {}", id, status);
        }
        TaskAction::Edit {
            id,
            title,
            description,
            start,
            end,
            project,
            clear_dates,
        } => {
            let edit = TaskEdit {
                title,
                description,
                start: parse_date(start.as_deref())?,
                end: parse_date(end.as_deref())?,
                project,
                clear_dates,
            };
            let task = edit_task(&store, &id, edit)?;
            println!("Updated task {} ({})", task.title, task.id);
        }
        TaskAction::Delete { id } => {
            let recorded = store.total_seconds(&id)?;
            if !store.delete_task(&id)? {
                return Err(TrackError::TaskNotFound { id }.into());
            }
            println!(
                "Deleted task {} and {} of recorded time",
                id,
                format_duration(recorded)
            );
        }
    }
    Ok(())
}

fn list_tasks(store: &Store, project: Option<&str>) -> anyhow::Result<()> {
    let tasks = store.list_tasks(project)?;
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for task in tasks {
        let total = store.total_seconds(&task.id)?;
        let dates = match (task.start_date, task.end_date) {
            (Some(s), Some(e)) => format!("  {s} → {e}"),
            _ => String::new(),
        };
        println!(
            "{}  [{}] {}  {}{}",
            task.id,
            task.status,
            task.title,
            format_duration(total),
            dates
        );
    }
    Ok(())
}

/// Parse an optional `YYYY-MM-DD` argument.
pub fn parse_date(raw: Option<&str>) -> anyhow::Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("Invalid date '{}' (expected YYYY-MM-DD): {}", s, e))
    })
    .transpose()
}
