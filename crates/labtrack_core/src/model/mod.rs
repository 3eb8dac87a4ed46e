//! Domain model for the research project tracker.
//!
//! # Responsibility
//! - Define the canonical records shared by repositories and services.
//! - Own pure field validation and state-transition rules.
//!
//! # Invariants
//! - Every persisted record is identified by a durable integer id assigned
//!   by the store; `Project::project_key` is the only secondary business key.
//! - Timestamps are Unix epoch milliseconds; calendar dates are `NaiveDate`.

pub mod meeting;
pub mod notification;
pub mod project;
pub mod task;
pub mod user;
pub mod validation;

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
