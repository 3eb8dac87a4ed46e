//! Task and task comment model.
//!
//! # Invariants
//! - A task belongs to exactly one project; its assignee, when set, is a
//!   team member of that project at assignment time.
//! - `completed_at` is written once, on the first transition into
//!   `completed`, and is never cleared or overwritten afterwards.
//! - Comments are append-only.

use crate::model::project::ProjectId;
use crate::model::user::UserId;
use crate::model::validation::ValidationErrors;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type TaskId = i64;
pub type CommentId = i64;

pub const TASK_TITLE_MAX: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "todo" => Some(Self::Todo),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// `todo` and `in_progress` count as pending work.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Todo | Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub assigned_to_id: Option<UserId>,
    pub created_by_id: UserId,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl Task {
    pub fn is_assigned_to(&self, user_id: UserId) -> bool {
        self.assigned_to_id == Some(user_id)
    }

    /// Moves the task to `status`, stamping `completed_at` on the first
    /// entry into `completed`.
    ///
    /// Leaving `completed` keeps the first stamp, and re-entering it
    /// later does not move the stamp either.
    ///
    /// Returns whether `completed_at` was written by this call.
    pub fn transition_to(&mut self, status: TaskStatus, now_ms: i64) -> bool {
        let entering_completed =
            status == TaskStatus::Completed && self.status != TaskStatus::Completed;
        self.status = status;
        if entering_completed && self.completed_at.is_none() {
            self.completed_at = Some(now_ms);
            return true;
        }
        false
    }
}

/// Task fields submitted on creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<UserId>,
}

impl TaskFields {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("title", &self.title, TASK_TITLE_MAX);
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: CommentId,
    pub task_id: TaskId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: i64,
}
