//! Best-effort email dispatch with rendered notification content.

use crate::config::MailSettings;
use crate::logging::sanitize_message;
use crate::mail::templates::{TemplateContext, TemplateId, TemplateRenderer};
use crate::mail::{
    BuiltinTemplates, EmailBackend, EmailError, EmailMessage, LogBackend, SmtpBackend,
};
use crate::model::meeting::Meeting;
use crate::model::project::Project;
use crate::model::task::Task;
use crate::model::user::User;
use chrono::{DateTime, NaiveDate};
use log::{error, info, warn};
use serde_json::{json, Value};

const MAX_ERROR_CHARS: usize = 200;

/// Sends notification emails; every public send reports success as `bool`
/// and never propagates a failure.
pub struct EmailDispatcher {
    settings: MailSettings,
    backend: Box<dyn EmailBackend>,
    renderer: Box<dyn TemplateRenderer>,
}

impl EmailDispatcher {
    pub fn new(
        settings: MailSettings,
        backend: impl EmailBackend + 'static,
        renderer: impl TemplateRenderer + 'static,
    ) -> Self {
        Self {
            settings,
            backend: Box::new(backend),
            renderer: Box::new(renderer),
        }
    }

    /// SMTP delivery when mail is configured; otherwise a dispatcher whose
    /// sends are skipped with a warning.
    pub fn from_settings(settings: MailSettings) -> Result<Self, EmailError> {
        if settings.is_configured() {
            let backend = SmtpBackend::from_settings(&settings)?;
            Ok(Self::new(settings, backend, BuiltinTemplates))
        } else {
            Ok(Self::new(settings, LogBackend, BuiltinTemplates))
        }
    }

    /// A dispatcher with mail unconfigured.
    pub fn disabled() -> Self {
        Self::new(MailSettings::default(), LogBackend, BuiltinTemplates)
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_configured()
    }

    /// Sends one HTML email to `recipients`; returns whether it was handed
    /// to the transport.
    pub fn send(&self, subject: &str, recipients: &[String], html_body: &str) -> bool {
        if !self.settings.is_configured() {
            warn!("event=email_send module=mail status=skipped reason=mail_not_configured");
            return false;
        }
        if recipients.is_empty() {
            warn!("event=email_send module=mail status=skipped reason=no_recipients");
            return false;
        }

        let message = EmailMessage {
            from: self.settings.default_sender.clone(),
            to: recipients.to_vec(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        };
        match self.backend.send(&message) {
            Ok(()) => {
                info!(
                    "event=email_send module=mail status=ok backend={} recipients={}",
                    self.backend.name(),
                    recipients.len()
                );
                true
            }
            Err(err) => {
                error!(
                    "event=email_send module=mail status=error backend={} recipients={} server={} port={} tls={} ssl={} error={}",
                    self.backend.name(),
                    recipients.len(),
                    self.settings.server,
                    self.settings.port,
                    self.settings.use_tls,
                    self.settings.use_ssl,
                    sanitize_message(&err.to_string(), MAX_ERROR_CHARS)
                );
                false
            }
        }
    }

    pub fn send_task_assignment_email(&self, task: &Task, project: &Project, assignee: &User) -> bool {
        let context = context([
            ("assignee_name", json!(assignee.full_name())),
            ("project_title", json!(project.title)),
            ("task_title", json!(task.title)),
            ("task_priority", json!(task.priority.as_str())),
            ("task_due_date", json!(task.due_date.map(format_date))),
            ("task_description", json!(task.description)),
        ]);
        self.render_and_send(
            TemplateId::TaskAssignment,
            &context,
            &format!("New Task Assigned: {}", task.title),
            &[assignee.email.clone()],
        )
    }

    /// One batched invitation addressed to every attendee.
    pub fn send_meeting_invitation_email(
        &self,
        meeting: &Meeting,
        project: &Project,
        attendees: &[User],
    ) -> bool {
        self.render_and_send(
            TemplateId::MeetingInvitation,
            &meeting_context(meeting, project),
            &format!("Meeting Invitation: {}", meeting.title),
            &emails(attendees),
        )
    }

    /// Reminder content for an upcoming meeting. No scheduler calls this yet.
    pub fn send_meeting_reminder_email(
        &self,
        meeting: &Meeting,
        project: &Project,
        attendees: &[User],
    ) -> bool {
        self.render_and_send(
            TemplateId::MeetingReminder,
            &meeting_context(meeting, project),
            &format!("Meeting Reminder: {}", meeting.title),
            &emails(attendees),
        )
    }

    /// One email addressed to every member of the roster.
    pub fn send_project_assignment_email(
        &self,
        project: &Project,
        pi: &User,
        members: &[User],
    ) -> bool {
        let context = context([
            ("project_title", json!(project.title)),
            ("project_key", json!(project.project_key)),
            ("pi_name", json!(pi.full_name())),
            ("project_status", json!(project.status.as_str())),
            ("start_date", json!(format_date(project.start_date))),
            ("end_date", json!(format_date(project.end_date))),
            ("project_description", json!(project.description)),
        ]);
        self.render_and_send(
            TemplateId::ProjectAssignment,
            &context,
            &format!("You've been assigned to project: {}", project.title),
            &emails(members),
        )
    }

    fn render_and_send(
        &self,
        template: TemplateId,
        context: &TemplateContext,
        subject: &str,
        recipients: &[String],
    ) -> bool {
        match self.renderer.render(template, context) {
            Ok(html) => self.send(subject, recipients, &html),
            Err(err) => {
                error!(
                    "event=email_render module=mail status=error template={} error={err}",
                    template.as_str()
                );
                false
            }
        }
    }
}

fn context<const N: usize>(pairs: [(&str, Value); N]) -> TemplateContext {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn meeting_context(meeting: &Meeting, project: &Project) -> TemplateContext {
    context([
        ("meeting_title", json!(meeting.title)),
        ("project_title", json!(project.title)),
        ("meeting_date", json!(format_datetime(meeting.meeting_date))),
        ("duration_minutes", json!(meeting.duration_minutes)),
        ("location", json!(meeting.location)),
        ("meeting_link", json!(meeting.meeting_link)),
        ("agenda", json!(meeting.agenda)),
    ])
}

fn emails(users: &[User]) -> Vec<String> {
    users.iter().map(|user| user.email.clone()).collect()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

fn format_datetime(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|at| at.format("%B %d, %Y at %I:%M %p").to_string())
        .unwrap_or_default()
}
