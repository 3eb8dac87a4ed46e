//! In-app notification model.
//!
//! Notifications are written only as side effects of coordinator operations
//! and are never mutated afterwards except for the owner's read flag.

use crate::model::meeting::MeetingId;
use crate::model::project::ProjectId;
use crate::model::task::TaskId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};

pub type NotificationId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    MeetingScheduled,
    ProjectAssigned,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskAssigned => "task_assigned",
            Self::MeetingScheduled => "meeting_scheduled",
            Self::ProjectAssigned => "project_assigned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "task_assigned" => Some(Self::TaskAssigned),
            "meeting_scheduled" => Some(Self::MeetingScheduled),
            "project_assigned" => Some(Self::ProjectAssigned),
            _ => None,
        }
    }
}

/// Optional references back to the entity a notification is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub meeting_id: Option<MeetingId>,
}

impl NotificationContext {
    pub fn project(project_id: ProjectId) -> Self {
        Self {
            project_id: Some(project_id),
            ..Self::default()
        }
    }

    pub fn task(project_id: ProjectId, task_id: TaskId) -> Self {
        Self {
            project_id: Some(project_id),
            task_id: Some(task_id),
            meeting_id: None,
        }
    }

    pub fn meeting(project_id: ProjectId, meeting_id: MeetingId) -> Self {
        Self {
            project_id: Some(project_id),
            task_id: None,
            meeting_id: Some(meeting_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub context: NotificationContext,
    pub created_at: i64,
}

/// Write model for a notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub context: NotificationContext,
}
