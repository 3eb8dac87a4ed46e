//! Email body rendering.
//!
//! `{{key}}` placeholders are replaced with HTML-escaped context values.
//! A placeholder left without a value is an error rather than a silently
//! blank field.

use std::collections::HashMap;
use thiserror::Error;

pub type TemplateContext = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    TaskAssignment,
    MeetingInvitation,
    MeetingReminder,
    ProjectAssignment,
}

impl TemplateId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskAssignment => "emails/task_assignment",
            Self::MeetingInvitation => "emails/meeting_invitation",
            Self::MeetingReminder => "emails/meeting_reminder",
            Self::ProjectAssignment => "emails/project_assignment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template `{template}` has no value for `{key}`")]
    MissingValue { template: &'static str, key: String },
}

/// Template seam: `render(template_id, context) -> html`.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: TemplateId, context: &TemplateContext)
        -> Result<String, TemplateError>;
}

const TASK_ASSIGNMENT_HTML: &str = "<h2>New Task Assigned</h2>
<p>Hello {{assignee_name}},</p>
<p>You have been assigned a new task in project <strong>{{project_title}}</strong>.</p>
<ul>
  <li>Task: {{task_title}}</li>
  <li>Priority: {{task_priority}}</li>
  <li>Due date: {{task_due_date}}</li>
</ul>
<p>{{task_description}}</p>";

const MEETING_INVITATION_HTML: &str = "<h2>Meeting Invitation</h2>
<p>You have been invited to <strong>{{meeting_title}}</strong> for project {{project_title}}.</p>
<ul>
  <li>When: {{meeting_date}}</li>
  <li>Duration: {{duration_minutes}} minutes</li>
  <li>Location: {{location}}</li>
  <li>Link: {{meeting_link}}</li>
</ul>
<p>{{agenda}}</p>";

const MEETING_REMINDER_HTML: &str = "<h2>Meeting Reminder</h2>
<p><strong>{{meeting_title}}</strong> for project {{project_title}} starts {{meeting_date}}.</p>
<ul>
  <li>Duration: {{duration_minutes}} minutes</li>
  <li>Location: {{location}}</li>
  <li>Link: {{meeting_link}}</li>
</ul>";

const PROJECT_ASSIGNMENT_HTML: &str = "<h2>Project Assignment</h2>
<p>You have been assigned to work on <strong>{{project_title}}</strong> ({{project_key}}) by {{pi_name}}.</p>
<ul>
  <li>Status: {{project_status}}</li>
  <li>Start: {{start_date}}</li>
  <li>End: {{end_date}}</li>
</ul>
<p>{{project_description}}</p>";

/// Renders the four built-in notification templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl BuiltinTemplates {
    fn source(template: TemplateId) -> &'static str {
        match template {
            TemplateId::TaskAssignment => TASK_ASSIGNMENT_HTML,
            TemplateId::MeetingInvitation => MEETING_INVITATION_HTML,
            TemplateId::MeetingReminder => MEETING_REMINDER_HTML,
            TemplateId::ProjectAssignment => PROJECT_ASSIGNMENT_HTML,
        }
    }
}

impl TemplateRenderer for BuiltinTemplates {
    fn render(
        &self,
        template: TemplateId,
        context: &TemplateContext,
    ) -> Result<String, TemplateError> {
        render_html(template.as_str(), Self::source(template), context)
    }
}

/// Substitutes every `{{key}}` in `source` from `context`.
pub fn render_html(
    name: &'static str,
    source: &str,
    context: &TemplateContext,
) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| TemplateError::MissingValue {
            template: name,
            key: after.to_string(),
        })?;
        let key = after[..end].trim();
        let value = context.get(key).ok_or_else(|| TemplateError::MissingValue {
            template: name,
            key: key.to_string(),
        })?;
        rendered.push_str(&escape_html(&display_value(value)));
        rest = &after[end + 2..];
    }
    rendered.push_str(rest);
    Ok(rendered)
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}
