//! Task and task comment repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `save_status` persists status, `updated_at` and `completed_at` exactly
//!   as computed by `Task::transition_to`; it never derives them itself.
//! - Comments are insert-only.
//! - Due-date ordering follows SQLite's `NULL`-first ascending order.

use crate::model::project::ProjectId;
use crate::model::task::{
    CommentId, Task, TaskComment, TaskFields, TaskId, TaskPriority, TaskStatus,
};
use crate::model::user::UserId;
use crate::repo::{decode_tag, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const TASK_SELECT_SQL: &str = "SELECT
    t.id,
    t.project_id,
    t.title,
    t.description,
    t.status,
    t.priority,
    t.due_date,
    t.assigned_to_id,
    t.created_by_id,
    t.created_at,
    t.updated_at,
    t.completed_at
FROM tasks t";

/// Which tasks a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    /// Every task of one project.
    Project(ProjectId),
    /// Every task in projects owned by this PI.
    OwnedBy(UserId),
    /// Tasks assigned to this user.
    AssignedTo(UserId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskOrder {
    #[default]
    DueDateAsc,
    UpdatedDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskQuery {
    pub scope: TaskScope,
    /// Restrict to `todo`/`in_progress`.
    pub pending_only: bool,
    pub order: TaskOrder,
    pub limit: Option<u32>,
}

impl TaskQuery {
    pub fn new(scope: TaskScope) -> Self {
        Self {
            scope,
            pending_only: false,
            order: TaskOrder::default(),
            limit: None,
        }
    }
}

/// Completed and total task counts for one project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: u32,
    pub completed: u32,
}

pub trait TaskRepository {
    fn create_task(
        &self,
        project_id: ProjectId,
        created_by: UserId,
        fields: &TaskFields,
        now: i64,
    ) -> RepoResult<TaskId>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn save_status(&self, task: &Task) -> RepoResult<()>;
    fn list_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<Task>>;
    fn count_for_project(&self, project_id: ProjectId) -> RepoResult<TaskCounts>;
    fn add_comment(
        &self,
        task_id: TaskId,
        user_id: UserId,
        content: &str,
        now: i64,
    ) -> RepoResult<CommentId>;
    /// Comments for a task, oldest first.
    fn list_comments(&self, task_id: TaskId) -> RepoResult<Vec<TaskComment>>;
}

pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(
        &self,
        project_id: ProjectId,
        created_by: UserId,
        fields: &TaskFields,
        now: i64,
    ) -> RepoResult<TaskId> {
        self.conn.execute(
            "INSERT INTO tasks (
                project_id,
                title,
                description,
                status,
                priority,
                due_date,
                assigned_to_id,
                created_by_id,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9);",
            params![
                project_id,
                fields.title,
                fields.description,
                TaskStatus::Todo.as_str(),
                fields.priority.as_str(),
                fields.due_date,
                fields.assigned_to,
                created_by,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let sql = format!("{TASK_SELECT_SQL} WHERE t.id = ?1;");
        let task = self
            .conn
            .query_row(&sql, [id], |row| Ok(read_task(row)))
            .optional()?
            .transpose()?;
        Ok(task)
    }

    fn save_status(&self, task: &Task) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks
             SET status = ?2, updated_at = ?3, completed_at = ?4
             WHERE id = ?1;",
            params![
                task.id,
                task.status.as_str(),
                task.updated_at,
                task.completed_at
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("task", task.id));
        }
        Ok(())
    }

    fn list_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<Task>> {
        let mut sql = String::from(TASK_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();

        match query.scope {
            TaskScope::Project(project_id) => {
                sql.push_str(" WHERE t.project_id = ?");
                bind_values.push(Value::Integer(project_id));
            }
            TaskScope::OwnedBy(pi_id) => {
                sql.push_str(
                    " INNER JOIN projects p ON p.id = t.project_id
                      WHERE p.pi_id = ?",
                );
                bind_values.push(Value::Integer(pi_id));
            }
            TaskScope::AssignedTo(user_id) => {
                sql.push_str(" WHERE t.assigned_to_id = ?");
                bind_values.push(Value::Integer(user_id));
            }
        }

        if query.pending_only {
            sql.push_str(" AND t.status IN ('todo', 'in_progress')");
        }

        match query.order {
            TaskOrder::DueDateAsc => sql.push_str(" ORDER BY t.due_date ASC, t.id ASC"),
            TaskOrder::UpdatedDesc => sql.push_str(" ORDER BY t.updated_at DESC, t.id DESC"),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(read_task(row)?);
        }
        Ok(tasks)
    }

    fn count_for_project(&self, project_id: ProjectId) -> RepoResult<TaskCounts> {
        let counts = self.conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
             FROM tasks
             WHERE project_id = ?1;",
            [project_id],
            |row| {
                Ok(TaskCounts {
                    total: row.get(0)?,
                    completed: row.get(1)?,
                })
            },
        )?;
        Ok(counts)
    }

    fn add_comment(
        &self,
        task_id: TaskId,
        user_id: UserId,
        content: &str,
        now: i64,
    ) -> RepoResult<CommentId> {
        self.conn.execute(
            "INSERT INTO task_comments (task_id, user_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![task_id, user_id, content, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_comments(&self, task_id: TaskId) -> RepoResult<Vec<TaskComment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_id, user_id, content, created_at
             FROM task_comments
             WHERE task_id = ?1
             ORDER BY created_at ASC, id ASC;",
        )?;
        let comments = stmt
            .query_map([task_id], |row| {
                Ok(TaskComment {
                    id: row.get("id")?,
                    task_id: row.get("task_id")?,
                    user_id: row.get("user_id")?,
                    content: row.get("content")?,
                    created_at: row.get("created_at")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

fn read_task(row: &Row<'_>) -> RepoResult<Task> {
    let status: String = row.get("status")?;
    let priority: String = row.get("priority")?;
    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: decode_tag("tasks.status", &status, TaskStatus::parse)?,
        priority: decode_tag("tasks.priority", &priority, TaskPriority::parse)?,
        due_date: row.get("due_date")?,
        assigned_to_id: row.get("assigned_to_id")?,
        created_by_id: row.get("created_by_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        completed_at: row.get("completed_at")?,
    })
}
