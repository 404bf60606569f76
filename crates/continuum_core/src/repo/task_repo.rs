//! Task repository contract and SQLite implementation.
//!
//! # Invariants
//! - `set_status` couples `completed_at` to the status in one UPDATE:
//!   entering `completed` stamps it, leaving `completed` clears it.

use crate::model::task::{
    completed_at_for, NewTask, Task, TaskId, TaskPriority, TaskStatus, TaskType,
};
use crate::model::user::UserId;
use crate::repo::{ensure_schema, parse_uuid, RepoError, RepoResult, TableRequirement};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    user_id,
    title,
    description,
    due_date,
    task_type,
    priority,
    status,
    completed_at,
    created_at,
    updated_at
FROM tasks";

/// Repository interface for task documents.
pub trait TaskRepository {
    /// Creates one task with status `todo` and returns its stable id.
    fn create_task(&self, task: &NewTask, now_ms: i64) -> RepoResult<TaskId>;
    /// Gets one task.
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Lists a user's tasks, optionally filtered by status, due soonest first.
    fn list_tasks(&self, user_id: UserId, status: Option<TaskStatus>) -> RepoResult<Vec<Task>>;
    /// Changes the task status, stamping or clearing `completed_at`.
    fn set_status(&self, id: TaskId, status: TaskStatus, now_ms: i64) -> RepoResult<()>;
    /// Updates editable fields without touching the status lifecycle.
    fn update_task(
        &self,
        id: TaskId,
        title: &str,
        description: Option<&str>,
        due_date: i64,
        priority: TaskPriority,
        now_ms: i64,
    ) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[TableRequirement {
                table: "tasks",
                columns: &[
                    "uuid",
                    "user_id",
                    "title",
                    "description",
                    "due_date",
                    "task_type",
                    "priority",
                    "status",
                    "completed_at",
                    "created_at",
                    "updated_at",
                ],
            }],
        )?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &NewTask, now_ms: i64) -> RepoResult<TaskId> {
        task.validate()?;

        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO tasks (
                uuid,
                user_id,
                title,
                description,
                due_date,
                task_type,
                priority,
                status,
                completed_at,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'todo', NULL, ?8, ?8);",
            params![
                uuid.to_string(),
                task.user_id.to_string(),
                task.title.as_str(),
                task.description.as_deref(),
                task.due_date,
                task.task_type.as_str(),
                task.priority.as_str(),
                now_ms,
            ],
        )?;

        Ok(uuid)
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_tasks(&self, user_id: UserId, status: Option<TaskStatus>) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE user_id = ?1");
        if status.is_some() {
            sql.push_str(" AND status = ?2");
        }
        sql.push_str(" ORDER BY due_date ASC, uuid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let user_text = user_id.to_string();
        let mut rows = match status {
            Some(status) => stmt.query(params![user_text, status.as_str()])?,
            None => stmt.query([user_text.as_str()])?,
        };

        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn set_status(&self, id: TaskId, status: TaskStatus, now_ms: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET status = ?2, completed_at = ?3, updated_at = ?4
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                status.as_str(),
                completed_at_for(status, now_ms),
                now_ms,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: "tasks",
                id,
            });
        }
        Ok(())
    }

    fn update_task(
        &self,
        id: TaskId,
        title: &str,
        description: Option<&str>,
        due_date: i64,
        priority: TaskPriority,
        now_ms: i64,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET title = ?2, description = ?3, due_date = ?4, priority = ?5, updated_at = ?6
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                title,
                description,
                due_date,
                priority.as_str(),
                now_ms,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: "tasks",
                id,
            });
        }
        Ok(())
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let user_text: String = row.get("user_id")?;

    let type_text: String = row.get("task_type")?;
    let task_type = TaskType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid task type `{type_text}` in tasks.task_type"))
    })?;

    let priority_text: String = row.get("priority")?;
    let priority = TaskPriority::parse(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in tasks.priority"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = TaskStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in tasks.status"))
    })?;

    let completed_at: Option<i64> = row.get("completed_at")?;
    if (status == TaskStatus::Completed) != completed_at.is_some() {
        return Err(RepoError::InvalidData(format!(
            "tasks.completed_at inconsistent with status `{status_text}`"
        )));
    }

    Ok(Task {
        uuid: parse_uuid(&uuid_text, "tasks.uuid")?,
        user_id: parse_uuid(&user_text, "tasks.user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        due_date: row.get("due_date")?,
        task_type,
        priority,
        status,
        completed_at,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
