//! Core domain logic for the research project tracker.
//! This crate owns every cross-entity invariant: roster and assignment
//! consistency, permission gates, notification side effects and the
//! read-side aggregates.

pub mod config;
pub mod credentials;
pub mod db;
pub mod logging;
pub mod mail;
pub mod model;
pub mod permission;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError, MailSettings};
pub use credentials::{Argon2Hasher, CredentialError, CredentialHasher};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use mail::{EmailDispatcher, EmailMessage, MemoryBackend};
pub use model::meeting::{Meeting, MeetingFields, MeetingId, MeetingStatus};
pub use model::notification::{Notification, NotificationContext, NotificationId, NotificationType};
pub use model::project::{Project, ProjectFields, ProjectId, ProjectStatus};
pub use model::task::{Task, TaskComment, TaskFields, TaskId, TaskPriority, TaskStatus};
pub use model::user::{NewUser, Role, Title, User, UserId};
pub use model::validation::{FieldError, ValidationErrors};
pub use permission::{Action, PermissionDenied};
pub use repo::{RepoError, RepoResult};
pub use service::coordinator::{AssignmentCoordinator, DeliveryStatus, Outcome};
pub use service::dashboard::{DashboardAggregator, DashboardSnapshot, ProjectStats};
pub use service::error::{CoordinatorError, CoordinatorResult, Precondition};
pub use service::identity::{IdentityError, IdentityService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
