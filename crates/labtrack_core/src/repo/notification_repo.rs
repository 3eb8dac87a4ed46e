//! Notification repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Rows are insert-only apart from the owner's `is_read` flip.
//! - `mark_read` is scoped by owner id so one user can never flip another
//!   user's notification.

use crate::model::notification::{
    NewNotification, Notification, NotificationContext, NotificationId, NotificationType,
};
use crate::model::user::UserId;
use crate::repo::{bool_to_int, decode_tag, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    title,
    message,
    notification_type,
    is_read,
    project_id,
    task_id,
    meeting_id,
    created_at
FROM notifications";

pub trait NotificationRepository {
    fn create_notification(&self, input: &NewNotification, now: i64) -> RepoResult<Notification>;
    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>>;
    /// Unread notifications for one user, newest first.
    fn list_unread(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<Notification>>;
    /// Marks one notification read if `user_id` owns it; returns whether a
    /// row changed.
    fn mark_read(&self, id: NotificationId, user_id: UserId) -> RepoResult<bool>;
    fn count_for_user(&self, user_id: UserId) -> RepoResult<u32>;
}

pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, input: &NewNotification, now: i64) -> RepoResult<Notification> {
        self.conn.execute(
            "INSERT INTO notifications (
                user_id,
                title,
                message,
                notification_type,
                is_read,
                project_id,
                task_id,
                meeting_id,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                input.user_id,
                input.title,
                input.message,
                input.notification_type.as_str(),
                bool_to_int(false),
                input.context.project_id,
                input.context.task_id,
                input.context.meeting_id,
                now,
            ],
        )?;
        Ok(Notification {
            id: self.conn.last_insert_rowid(),
            user_id: input.user_id,
            title: input.title.clone(),
            message: input.message.clone(),
            notification_type: input.notification_type,
            is_read: false,
            context: input.context,
            created_at: now,
        })
    }

    fn get_notification(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        let sql = format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;");
        let found = self
            .conn
            .query_row(&sql, [id], |row| Ok(read_notification(row)))
            .optional()?
            .transpose()?;
        Ok(found)
    }

    fn list_unread(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<Notification>> {
        let sql = format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE user_id = ?1 AND is_read = 0
             ORDER BY created_at DESC, id DESC
             LIMIT ?2;"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![user_id, limit])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(read_notification(row)?);
        }
        Ok(notifications)
    }

    fn mark_read(&self, id: NotificationId, user_id: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2;",
            params![id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn count_for_user(&self, user_id: UserId) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1;",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn read_notification(row: &Row<'_>) -> RepoResult<Notification> {
    let kind: String = row.get("notification_type")?;
    let is_read: i64 = row.get("is_read")?;
    Ok(Notification {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        message: row.get("message")?,
        notification_type: decode_tag(
            "notifications.notification_type",
            &kind,
            NotificationType::parse,
        )?,
        is_read: is_read != 0,
        context: NotificationContext {
            project_id: row.get("project_id")?,
            task_id: row.get("task_id")?,
            meeting_id: row.get("meeting_id")?,
        },
        created_at: row.get("created_at")?,
    })
}
