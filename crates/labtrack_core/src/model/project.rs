//! Project model.
//!
//! # Invariants
//! - Owned by exactly one PI (`pi_id`).
//! - `start_date <= end_date`.
//! - `team_member_ids` is a set: no duplicates, edits replace it wholesale.

use crate::model::user::UserId;
use crate::model::validation::ValidationErrors;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type ProjectId = i64;

pub const PROJECT_TITLE_MAX: usize = 200;
pub const PROJECT_KEY_MAX: usize = 50;
pub const FUNDING_SOURCE_MAX: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Proposal,
    Active,
    OnHold,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposal => "proposal",
            Self::Active => "active",
            Self::OnHold => "on_hold",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "proposal" => Some(Self::Proposal),
            "active" => Some(Self::Active),
            "on_hold" => Some(Self::OnHold),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// User-chosen external key, unique and compared case-sensitively.
    pub project_key: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ProjectStatus,
    pub funding_source: Option<String>,
    pub funding_amount: Option<f64>,
    pub pi_id: UserId,
    pub team_member_ids: BTreeSet<UserId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Project {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.pi_id == user_id
    }

    pub fn has_member(&self, user_id: UserId) -> bool {
        self.team_member_ids.contains(&user_id)
    }

    pub fn has_team(&self) -> bool {
        !self.team_member_ids.is_empty()
    }
}

/// Editable project fields submitted on create and edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectFields {
    pub project_key: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ProjectStatus,
    pub funding_source: Option<String>,
    pub funding_amount: Option<f64>,
}

impl ProjectFields {
    /// Field-shape checks; key uniqueness needs the store.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("title", &self.title, PROJECT_TITLE_MAX);
        errors.require_text("project_key", &self.project_key, PROJECT_KEY_MAX);
        errors.limit_text(
            "funding_source",
            self.funding_source.as_deref(),
            FUNDING_SOURCE_MAX,
        );
        if let Some(amount) = self.funding_amount {
            if !amount.is_finite() || amount < 0.0 {
                errors.push("funding_amount", "Number must be at least 0.");
            }
        }
        if self.end_date < self.start_date {
            errors.push("end_date", "End date cannot be before start date.");
        }
        errors.into_result()
    }
}
