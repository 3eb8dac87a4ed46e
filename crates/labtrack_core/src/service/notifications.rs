//! In-app notification dispatcher.
//!
//! # Invariants
//! - Notifications are written through the caller's connection, so inside a
//!   coordinator transaction they commit or roll back with the primary
//!   entity.
//! - Only the owning user can flip a notification to read.

use crate::model::meeting::Meeting;
use crate::model::notification::{
    NewNotification, Notification, NotificationContext, NotificationId, NotificationType,
};
use crate::model::now_epoch_ms;
use crate::model::project::Project;
use crate::model::task::Task;
use crate::model::user::{User, UserId};
use crate::repo::notification_repo::NotificationRepository;
use crate::repo::RepoResult;

pub struct NotificationDispatcher<R: NotificationRepository> {
    repo: R,
}

impl<R: NotificationRepository> NotificationDispatcher<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists one notification and returns the stored record.
    pub fn notify(
        &self,
        user_id: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
        notification_type: NotificationType,
        context: NotificationContext,
    ) -> RepoResult<Notification> {
        let input = NewNotification {
            user_id,
            title: title.into(),
            message: message.into(),
            notification_type,
            context,
        };
        self.repo.create_notification(&input, now_epoch_ms())
    }

    /// Notifies the assignee; unassigned tasks produce nothing.
    pub fn notify_task_assigned(
        &self,
        task: &Task,
        project: &Project,
    ) -> RepoResult<Option<Notification>> {
        let Some(assignee) = task.assigned_to_id else {
            return Ok(None);
        };
        self.notify(
            assignee,
            format!("New Task Assigned: {}", task.title),
            format!(
                "You have been assigned a new task in project '{}'",
                project.title
            ),
            NotificationType::TaskAssigned,
            NotificationContext::task(project.id, task.id),
        )
        .map(Some)
    }

    /// One notification per attendee.
    pub fn notify_meeting_scheduled(
        &self,
        meeting: &Meeting,
        project: &Project,
        attendees: &[User],
    ) -> RepoResult<Vec<Notification>> {
        attendees
            .iter()
            .map(|attendee| {
                self.notify(
                    attendee.id,
                    format!("Meeting Scheduled: {}", meeting.title),
                    format!(
                        "You have been invited to a meeting for project '{}'",
                        project.title
                    ),
                    NotificationType::MeetingScheduled,
                    NotificationContext::meeting(project.id, meeting.id),
                )
            })
            .collect()
    }

    /// One notification per roster member.
    pub fn notify_project_assigned(
        &self,
        project: &Project,
        pi: &User,
        members: &[User],
    ) -> RepoResult<Vec<Notification>> {
        members
            .iter()
            .map(|member| {
                self.notify(
                    member.id,
                    format!("Assigned to Project: {}", project.title),
                    format!(
                        "You have been assigned to work on project '{}' by {}",
                        project.title,
                        pi.full_name()
                    ),
                    NotificationType::ProjectAssigned,
                    NotificationContext::project(project.id),
                )
            })
            .collect()
    }

    /// Returns whether a notification owned by `user_id` was updated.
    pub fn mark_as_read(&self, notification_id: NotificationId, user_id: UserId) -> RepoResult<bool> {
        self.repo.mark_read(notification_id, user_id)
    }

    /// Unread notifications, newest first.
    pub fn unread(&self, user_id: UserId, limit: u32) -> RepoResult<Vec<Notification>> {
        self.repo.list_unread(user_id, limit)
    }
}
