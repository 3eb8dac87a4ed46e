//! Per-field validation errors shared by every write model.

use serde::Serialize;
use thiserror::Error;

/// One field-level constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Form field name the presentation layer renders the message next to.
    pub field: &'static str,
    pub message: String,
}

/// All field errors collected for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("validation failed: {}", describe(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an error set holding exactly one field error.
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns whether any error is attached to `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }

    /// Converts the collected set into `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Requires a non-blank value no longer than `max_chars`.
    pub(crate) fn require_text(&mut self, field: &'static str, value: &str, max_chars: usize) {
        if value.trim().is_empty() {
            self.push(field, "This field is required.");
        } else {
            self.check_length(field, value, 1, max_chars);
        }
    }

    /// Checks an optional value against `max_chars`.
    pub(crate) fn limit_text(&mut self, field: &'static str, value: Option<&str>, max_chars: usize) {
        if let Some(value) = value {
            self.check_length(field, value, 0, max_chars);
        }
    }

    pub(crate) fn check_length(
        &mut self,
        field: &'static str,
        value: &str,
        min_chars: usize,
        max_chars: usize,
    ) {
        let count = value.chars().count();
        if count < min_chars || count > max_chars {
            self.push(
                field,
                format!("Field must be between {min_chars} and {max_chars} characters long."),
            );
        }
    }
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}
