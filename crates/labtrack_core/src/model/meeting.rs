//! Meeting model.
//!
//! # Invariants
//! - Attendees are drawn from the owning project's team members.
//! - `completed` and `cancelled` are terminal; only `scheduled` moves.

use crate::model::project::ProjectId;
use crate::model::user::UserId;
use crate::model::validation::ValidationErrors;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type MeetingId = i64;

pub const MEETING_TITLE_MAX: usize = 200;
pub const MEETING_LOCATION_MAX: usize = 200;
pub const MEETING_LINK_MAX: usize = 500;
pub const DEFAULT_MEETING_DURATION_MINUTES: u32 = 60;
pub const MIN_MEETING_DURATION_MINUTES: u32 = 15;
pub const MAX_MEETING_DURATION_MINUTES: u32 = 480;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(Self::Scheduled),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Scheduled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub project_id: ProjectId,
    pub created_by_id: UserId,
    pub title: String,
    pub agenda: Option<String>,
    /// Scheduled start in Unix epoch milliseconds.
    pub meeting_date: i64,
    pub duration_minutes: u32,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
    pub status: MeetingStatus,
    pub attendee_ids: BTreeSet<UserId>,
    pub created_at: i64,
}

impl Meeting {
    pub fn is_created_by(&self, user_id: UserId) -> bool {
        self.created_by_id == user_id
    }

    pub fn has_attendee(&self, user_id: UserId) -> bool {
        self.attendee_ids.contains(&user_id)
    }

    /// Whether the lazy housekeeping sweep would complete this meeting.
    pub fn is_overdue(&self, as_of_ms: i64) -> bool {
        self.status == MeetingStatus::Scheduled && self.meeting_date < as_of_ms
    }
}

/// Meeting fields submitted on create and edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingFields {
    pub title: String,
    pub agenda: Option<String>,
    pub meeting_date: i64,
    pub duration_minutes: u32,
    pub location: Option<String>,
    pub meeting_link: Option<String>,
}

impl MeetingFields {
    /// Fields with the default duration and no optional details.
    pub fn new(title: impl Into<String>, meeting_date: i64) -> Self {
        Self {
            title: title.into(),
            agenda: None,
            meeting_date,
            duration_minutes: DEFAULT_MEETING_DURATION_MINUTES,
            location: None,
            meeting_link: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("title", &self.title, MEETING_TITLE_MAX);
        if !(MIN_MEETING_DURATION_MINUTES..=MAX_MEETING_DURATION_MINUTES)
            .contains(&self.duration_minutes)
        {
            errors.push(
                "duration_minutes",
                format!(
                    "Number must be between {MIN_MEETING_DURATION_MINUTES} and {MAX_MEETING_DURATION_MINUTES}."
                ),
            );
        }
        errors.limit_text("location", self.location.as_deref(), MEETING_LOCATION_MAX);
        errors.limit_text("meeting_link", self.meeting_link.as_deref(), MEETING_LINK_MAX);
        errors.into_result()
    }
}
