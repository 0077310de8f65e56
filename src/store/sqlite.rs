// src/store/sqlite.rs — SQLite operations

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

use super::schema;
use super::types::{Interval, Project, Task, TaskStatus, User};
use crate::infra::errors::TrackError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Low-level SQLite operations for all record types.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) the database at the given path and migrate it.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    // -- Users --

    pub fn insert_user(&self, first_name: &str, last_name: &str, email: &str) -> anyhow::Result<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            calendar_token: Uuid::new_v4().simple().to_string(),
        };
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO users (id, first_name, last_name, email, calendar_token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id,
                user.first_name,
                user.last_name,
                user.email,
                user.calendar_token,
                now
            ],
        )?;
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> anyhow::Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, first_name, last_name, email, calendar_token FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_calendar_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, first_name, last_name, email, calendar_token
                 FROM users WHERE calendar_token = ?1",
                params![token],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> anyhow::Result<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, first_name, last_name, email, calendar_token
             FROM users ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], user_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Projects --

    pub fn insert_project(&self, user_id: &str, title: &str) -> anyhow::Result<Project> {
        let project = Project {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            slug: slug::slugify(title),
            user_id: user_id.to_string(),
            is_active: true,
            created_at: Utc::now().to_rfc3339(),
        };
        self.conn.execute(
            "INSERT INTO projects (id, title, slug, user_id, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project.id,
                project.title,
                project.slug,
                project.user_id,
                project.is_active,
                project.created_at
            ],
        )?;
        Ok(project)
    }

    pub fn list_projects(&self, user_id: Option<&str>) -> anyhow::Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, slug, user_id, is_active, created_at
             FROM projects WHERE ?1 IS NULL OR user_id = ?1
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id], project_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_project(&self, id: &str) -> anyhow::Result<Option<Project>> {
        let project = self
            .conn
            .query_row(
                "SELECT id, title, slug, user_id, is_active, created_at
                 FROM projects WHERE id = ?1",
                params![id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// Rename and/or (de)activate a project. The slug follows the title.
    pub fn update_project(&self, project: &Project) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE projects SET title = ?1, slug = ?2, is_active = ?3 WHERE id = ?4",
            params![
                project.title,
                slug::slugify(&project.title),
                project.is_active,
                project.id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a project with its tasks and their recorded time.
    pub fn delete_project(&self, id: &str) -> anyhow::Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    // -- Tasks --

    pub fn insert_task(
        &self,
        project_id: &str,
        title: &str,
        description: Option<&str>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> anyhow::Result<Task> {
        let task = Task {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.map(str::to_string),
            status: TaskStatus::Todo,
            project_id: project_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
            start_date,
            end_date,
        };
        self.conn.execute(
            "INSERT INTO tasks (id, title, description, status, project_id,
             start_date, end_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                task.id,
                task.title,
                task.description,
                task.status.as_str(),
                task.project_id,
                format_date(task.start_date),
                format_date(task.end_date),
                task.created_at
            ],
        )?;
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> anyhow::Result<Option<Task>> {
        let task = self
            .conn
            .query_row(
                "SELECT id, title, description, status, project_id, created_at, start_date, end_date
                 FROM tasks WHERE id = ?1",
                params![id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn list_tasks(&self, project_id: Option<&str>) -> anyhow::Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, status, project_id, created_at, start_date, end_date
             FROM tasks WHERE ?1 IS NULL OR project_id = ?1
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![project_id], task_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// All tasks in projects owned by `user_id`.
    pub fn tasks_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.title, t.description, t.status, t.project_id, t.created_at,
                    t.start_date, t.end_date
             FROM tasks t JOIN projects p ON p.id = t.project_id
             WHERE p.user_id = ?1
             ORDER BY t.start_date ASC, t.created_at ASC",
        )?;
        let rows = stmt.query_map(params![user_id], task_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Move a task to another kanban column. Returns false if the task is unknown.
    pub fn update_task_status(&self, id: &str, status: TaskStatus) -> anyhow::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE tasks SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    /// Overwrite a task's editable fields. Returns false if the task is unknown.
    pub fn update_task(&self, task: &Task) -> anyhow::Result<bool> {
        if self.get_project(&task.project_id)?.is_none() {
            return Err(TrackError::ProjectNotFound {
                id: task.project_id.clone(),
            }
            .into());
        }
        let changed = self.conn.execute(
            "UPDATE tasks SET title = ?1, description = ?2, status = ?3, project_id = ?4,
             start_date = ?5, end_date = ?6
             WHERE id = ?7",
            params![
                task.title,
                task.description,
                task.status.as_str(),
                task.project_id,
                format_date(task.start_date),
                format_date(task.end_date),
                task.id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a task and every interval recorded on it.
    pub fn delete_task(&self, id: &str) -> anyhow::Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    // -- Time intervals --

    pub fn fetch_intervals(&self, task_id: &str) -> anyhow::Result<Vec<Interval>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, seconds, recorded_at FROM time_intervals
             WHERE task_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![task_id], interval_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Append one interval to the end of the task's history.
    pub fn append_interval(&self, task_id: &str, seconds: u64) -> anyhow::Result<Interval> {
        if self.get_task(task_id)?.is_none() {
            return Err(TrackError::TaskNotFound {
                id: task_id.to_string(),
            }
            .into());
        }

        let interval = Interval {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            seconds,
            recorded_at: Utc::now().to_rfc3339(),
        };
        let seconds = i64::try_from(seconds)?;
        self.conn.execute(
            "INSERT INTO time_intervals (id, task_id, seconds, seq, recorded_at)
             VALUES (?1, ?2, ?3,
                     (SELECT COALESCE(MAX(seq), 0) + 1 FROM time_intervals WHERE task_id = ?2),
                     ?4)",
            params![interval.id, interval.task_id, seconds, interval.recorded_at],
        )?;
        Ok(interval)
    }

    /// Remove exactly one interval by id. Unknown ids are a no-op.
    pub fn remove_interval(&self, task_id: &str, interval_id: &str) -> anyhow::Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM time_intervals WHERE task_id = ?1 AND id = ?2",
            params![task_id, interval_id],
        )?;
        Ok(removed > 0)
    }

    /// Total tracked seconds for a task.
    pub fn total_seconds(&self, task_id: &str) -> anyhow::Result<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(seconds), 0) FROM time_intervals WHERE task_id = ?1",
            params![task_id],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    /// Direct connection access (for export and tests).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        calendar_token: row.get(4)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        user_id: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    let start: Option<String> = row.get(6)?;
    let end: Option<String> = row.get(7)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: status.parse().unwrap_or_default(),
        project_id: row.get(4)?,
        created_at: row.get(5)?,
        start_date: parse_date(start.as_deref()),
        end_date: parse_date(end.as_deref()),
    })
}

fn interval_from_row(row: &Row<'_>) -> rusqlite::Result<Interval> {
    let seconds: i64 = row.get(2)?;
    Ok(Interval {
        id: row.get(0)?,
        task_id: row.get(1)?,
        seconds: seconds.max(0) as u64,
        recorded_at: row.get(3)?,
    })
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

/// Unparseable stored dates read back as absent.
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
}
