//! Error taxonomy for coordinator and read-view operations.

use crate::model::project::ProjectId;
use crate::model::task::Task;
use crate::model::validation::ValidationErrors;
use crate::permission::PermissionDenied;
use crate::repo::RepoError;
use thiserror::Error;

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Business-rule guard surfaced as a user-facing warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("Please add team members to the project before creating tasks.")]
    NoTeamMembersForTask { project_id: ProjectId },
    #[error("Please add team members to the project before scheduling meetings.")]
    NoTeamMembersForMeeting { project_id: ProjectId },
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Precondition(#[from] Precondition),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    /// Fatal; the whole operation was rolled back.
    #[error("failed to persist notification: {0}")]
    NotificationPersistence(#[source] RepoError),
    /// Generic persistence failure; the operation was rolled back.
    #[error("persistence failure: {0}")]
    Repo(#[source] RepoError),
    /// The status change committed; only the follow-up comment failed.
    #[error("task {} status saved but the comment was not: {source}", .task.id)]
    CommentNotSaved { task: Box<Task>, source: RepoError },
}

impl CoordinatorError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Whether the caller should render a fixed "forbidden" response.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Stable code for log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "forbidden",
            Self::Validation(_) => "validation_failed",
            Self::Precondition(_) => "precondition_not_met",
            Self::NotFound { .. } => "not_found",
            Self::NotificationPersistence(_) => "notification_persistence_failed",
            Self::Repo(_) => "persistence_failed",
            Self::CommentNotSaved { .. } => "comment_not_saved",
        }
    }
}

impl From<RepoError> for CoordinatorError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for CoordinatorError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
