//! User identity model.
//!
//! # Invariants
//! - A user's role is fixed at registration; no operation changes it.
//! - Username and email are unique across all users.

use crate::model::validation::ValidationErrors;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

pub type UserId = i64;

/// Fixed account role. Behaviour differs only in permission predicates and
/// dashboard query shape, so it is a tag rather than a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Principal investigator; owns projects.
    Pi,
    /// Assigned to projects by a PI.
    TeamMember,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pi => "pi",
            Self::TeamMember => "team_member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pi" => Some(Self::Pi),
            "team_member" => Some(Self::TeamMember),
            _ => None,
        }
    }
}

/// Courtesy title rendered in full names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Title {
    #[default]
    Mr,
    Ms,
    Mrs,
    Dr,
    Prof,
}

impl Title {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mr => "Mr",
            Self::Ms => "Ms",
            Self::Mrs => "Mrs",
            Self::Dr => "Dr",
            Self::Prof => "Prof",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Mr" => Some(Self::Mr),
            "Ms" => Some(Self::Ms),
            "Mrs" => Some(Self::Mrs),
            "Dr" => Some(Self::Dr),
            "Prof" => Some(Self::Prof),
            _ => None,
        }
    }
}

/// Persisted account read model. The credential hash never leaves the
/// repository except through the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub title: Title,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: i64,
    pub last_login: Option<i64>,
}

impl User {
    pub fn is_pi(&self) -> bool {
        self.role == Role::Pi
    }

    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.title.as_str(),
            self.first_name,
            self.last_name
        )
    }
}

/// Registration input, already type-coerced by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub title: Title,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub password: String,
}

impl NewUser {
    /// Checks field shape only; uniqueness is checked against the store.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.username.trim().is_empty() {
            errors.push("username", "This field is required.");
        } else {
            errors.check_length("username", &self.username, 4, 20);
        }
        if !EMAIL_RE.is_match(self.email.trim()) {
            errors.push("email", "Invalid email address.");
        }
        errors.require_text("first_name", &self.first_name, 50);
        errors.require_text("last_name", &self.last_name, 50);
        if self.password.chars().count() < 6 {
            errors.push("password", "Field must be at least 6 characters long.");
        }
        errors.into_result()
    }
}
