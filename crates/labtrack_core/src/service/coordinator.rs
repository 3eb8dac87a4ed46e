//! Assignment coordinator: every lifecycle mutation of projects, tasks and
//! meetings.
//!
//! # Responsibility
//! - Gate each operation on the permission evaluator before any write.
//! - Keep rosters, assignments and attendance consistent with the owning
//!   project.
//! - Write notifications in the same transaction as the primary entity.
//! - Send email only after commit, best-effort.
//!
//! # Invariants
//! - One operation is one `IMMEDIATE` transaction; dropping it on any error
//!   rolls every write back.
//! - Rosters and attendee sets are replaced wholesale on edit.
//! - Unknown member/attendee ids are dropped silently.
//! - `update_task_status` is the one two-step operation: the status change
//!   commits before the optional comment is written.

use crate::mail::EmailDispatcher;
use crate::model::meeting::{Meeting, MeetingFields, MeetingId, MeetingStatus};
use crate::model::notification::{Notification, NotificationId};
use crate::model::now_epoch_ms;
use crate::model::project::{Project, ProjectFields, ProjectId};
use crate::model::task::{Task, TaskComment, TaskFields, TaskId, TaskStatus};
use crate::model::user::{Role, User, UserId};
use crate::model::validation::ValidationErrors;
use crate::permission::{
    can_cancel_meeting, can_create_meeting, can_create_project, can_create_task,
    can_delete_project, can_edit_meeting, can_edit_project, can_update_task_status,
    can_view_task, ensure, Action,
};
use crate::repo::meeting_repo::{MeetingRepository, SqliteMeetingRepository};
use crate::repo::notification_repo::SqliteNotificationRepository;
use crate::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoResult;
use crate::service::error::{CoordinatorError, CoordinatorResult, Precondition};
use crate::service::notifications::NotificationDispatcher;
use log::{info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::BTreeSet;

/// What happened to the email side effect of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Nobody to notify, so nothing was sent.
    NotAttempted,
    Sent,
    /// Logged by the email dispatcher; the operation still succeeded.
    Failed,
}

impl DeliveryStatus {
    fn from_sent(sent: bool) -> Self {
        if sent {
            Self::Sent
        } else {
            Self::Failed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Result of a committed operation plus its side effects.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
    pub email: DeliveryStatus,
}

pub struct AssignmentCoordinator<'a> {
    conn: &'a Connection,
    email: &'a EmailDispatcher,
}

impl<'a> AssignmentCoordinator<'a> {
    pub fn new(conn: &'a Connection, email: &'a EmailDispatcher) -> Self {
        Self { conn, email }
    }

    /// Creates a project owned by `actor` and assigns the resolved members.
    pub fn create_project(
        &self,
        actor: &User,
        fields: &ProjectFields,
        member_ids: &BTreeSet<UserId>,
    ) -> CoordinatorResult<Outcome<Project>> {
        gate(can_create_project(actor), Action::CreateProject, actor)?;
        let mut errors = collect(fields.validate());

        let tx = self.begin()?;
        let projects = SqliteProjectRepository::new(&tx);
        let users = SqliteUserRepository::new(&tx);

        if projects.project_key_taken(&fields.project_key, None)? {
            errors.push("project_key", DUPLICATE_PROJECT_KEY);
        }
        let members = resolve_team_members(&users, member_ids, &mut errors)?;
        errors.into_result()?;

        let project_id = projects.create_project(actor.id, fields, now_epoch_ms())?;
        projects.replace_team_members(project_id, &ids_of(&members))?;
        let project = load_project(&projects, project_id)?;
        let notifications = notifier(&tx)
            .notify_project_assigned(&project, actor, &members)
            .map_err(CoordinatorError::NotificationPersistence)?;
        tx.commit()?;

        let email = if members.is_empty() {
            DeliveryStatus::NotAttempted
        } else {
            DeliveryStatus::from_sent(
                self.email
                    .send_project_assignment_email(&project, actor, &members),
            )
        };
        info!(
            "event=project_create module=coordinator status=ok project={} members={} email={}",
            project.id,
            members.len(),
            email.as_str()
        );
        Ok(Outcome {
            value: project,
            notifications,
            email,
        })
    }

    /// Replaces fields and the whole roster, then notifies every resulting
    /// member again, whether or not membership changed.
    pub fn edit_project(
        &self,
        actor: &User,
        project_id: ProjectId,
        fields: &ProjectFields,
        member_ids: &BTreeSet<UserId>,
    ) -> CoordinatorResult<Outcome<Project>> {
        let tx = self.begin()?;
        let projects = SqliteProjectRepository::new(&tx);
        let users = SqliteUserRepository::new(&tx);

        let current = load_project(&projects, project_id)?;
        gate(can_edit_project(actor, &current), Action::EditProject, actor)?;

        let mut errors = collect(fields.validate());
        if projects.project_key_taken(&fields.project_key, Some(project_id))? {
            errors.push("project_key", DUPLICATE_PROJECT_KEY);
        }
        let members = resolve_team_members(&users, member_ids, &mut errors)?;
        errors.into_result()?;

        projects.update_project(project_id, fields, now_epoch_ms())?;
        projects.replace_team_members(project_id, &ids_of(&members))?;
        let project = load_project(&projects, project_id)?;
        let notifications = notifier(&tx)
            .notify_project_assigned(&project, actor, &members)
            .map_err(CoordinatorError::NotificationPersistence)?;
        tx.commit()?;

        let email = if members.is_empty() {
            DeliveryStatus::NotAttempted
        } else {
            DeliveryStatus::from_sent(
                self.email
                    .send_project_assignment_email(&project, actor, &members),
            )
        };
        info!(
            "event=project_edit module=coordinator status=ok project={} members={} email={}",
            project.id,
            members.len(),
            email.as_str()
        );
        Ok(Outcome {
            value: project,
            notifications,
            email,
        })
    }

    /// Deletes a project; tasks, meetings, comments, rosters and
    /// notifications go with it.
    pub fn delete_project(&self, actor: &User, project_id: ProjectId) -> CoordinatorResult<()> {
        let tx = self.begin()?;
        let projects = SqliteProjectRepository::new(&tx);
        let project = load_project(&projects, project_id)?;
        gate(can_delete_project(actor, &project), Action::DeleteProject, actor)?;

        projects.delete_project(project_id)?;
        tx.commit()?;

        info!("event=project_delete module=coordinator status=ok project={project_id}");
        Ok(())
    }

    /// Creates a task and notifies its assignee.
    pub fn create_task(
        &self,
        actor: &User,
        project_id: ProjectId,
        fields: &TaskFields,
    ) -> CoordinatorResult<Outcome<Task>> {
        let tx = self.begin()?;
        let projects = SqliteProjectRepository::new(&tx);
        let tasks = SqliteTaskRepository::new(&tx);
        let users = SqliteUserRepository::new(&tx);

        let project = load_project(&projects, project_id)?;
        gate(can_create_task(actor, &project), Action::CreateTask, actor)?;
        if !project.has_team() {
            return Err(precondition(Precondition::NoTeamMembersForTask { project_id }));
        }

        let mut errors = collect(fields.validate());
        if let Some(assignee) = fields.assigned_to {
            if !project.has_member(assignee) {
                errors.push("assigned_to", NOT_A_VALID_CHOICE);
            }
        }
        errors.into_result()?;

        let task_id = tasks.create_task(project_id, actor.id, fields, now_epoch_ms())?;
        let task = load_task(&tasks, task_id)?;
        let assignee = match task.assigned_to_id {
            Some(user_id) => users.get_user(user_id)?,
            None => None,
        };
        let notifications = notifier(&tx)
            .notify_task_assigned(&task, &project)
            .map_err(CoordinatorError::NotificationPersistence)?
            .into_iter()
            .collect();
        tx.commit()?;

        let email = match &assignee {
            Some(assignee) => DeliveryStatus::from_sent(
                self.email
                    .send_task_assignment_email(&task, &project, assignee),
            ),
            None => DeliveryStatus::NotAttempted,
        };
        info!(
            "event=task_create module=coordinator status=ok project={} task={} assigned={} email={}",
            project.id,
            task.id,
            assignee.is_some(),
            email.as_str()
        );
        Ok(Outcome {
            value: task,
            notifications,
            email,
        })
    }

    /// Moves a task to `status`, then appends `comment` in a second commit.
    ///
    /// A blank comment is ignored. If the comment cannot be saved the status
    /// change stays committed and `CommentNotSaved` carries the updated task.
    pub fn update_task_status(
        &self,
        actor: &User,
        task_id: TaskId,
        status: TaskStatus,
        comment: Option<&str>,
    ) -> CoordinatorResult<Task> {
        let tx = self.begin()?;
        let projects = SqliteProjectRepository::new(&tx);
        let tasks = SqliteTaskRepository::new(&tx);

        let mut task = load_task(&tasks, task_id)?;
        let project = load_project(&projects, task.project_id)?;
        gate(
            can_update_task_status(actor, &project, &task),
            Action::UpdateTaskStatus,
            actor,
        )?;

        let previous = task.status;
        let now = now_epoch_ms();
        let stamped = task.transition_to(status, now);
        task.updated_at = now;
        tasks.save_status(&task)?;
        tx.commit()?;

        info!(
            "event=task_status module=coordinator status=ok task={} from={} to={} completed_stamped={}",
            task.id,
            previous.as_str(),
            task.status.as_str(),
            stamped
        );

        if let Some(content) = comment.map(str::trim).filter(|content| !content.is_empty()) {
            if let Err(source) = self.append_comment(task.id, actor.id, content) {
                warn!(
                    "event=task_comment module=coordinator status=error task={} error_code=comment_not_saved",
                    task.id
                );
                return Err(CoordinatorError::CommentNotSaved {
                    task: Box::new(task),
                    source,
                });
            }
        }
        Ok(task)
    }

    /// Appends a comment; any user who may view the task may comment.
    /// Blank content is a no-op and returns `None`.
    pub fn add_comment(
        &self,
        actor: &User,
        task_id: TaskId,
        content: &str,
    ) -> CoordinatorResult<Option<TaskComment>> {
        let tx = self.begin()?;
        let projects = SqliteProjectRepository::new(&tx);
        let tasks = SqliteTaskRepository::new(&tx);

        let task = load_task(&tasks, task_id)?;
        let project = load_project(&projects, task.project_id)?;
        gate(
            can_view_task(actor, &project, &task),
            Action::CommentOnTask,
            actor,
        )?;

        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        let now = now_epoch_ms();
        let comment_id = tasks.add_comment(task.id, actor.id, content, now)?;
        tx.commit()?;

        info!(
            "event=task_comment module=coordinator status=ok task={} comment={comment_id}",
            task.id
        );
        Ok(Some(TaskComment {
            id: comment_id,
            task_id: task.id,
            user_id: actor.id,
            content: content.to_string(),
            created_at: now,
        }))
    }

    /// Schedules a meeting, notifies each attendee and sends one batched
    /// invitation.
    pub fn create_meeting(
        &self,
        actor: &User,
        project_id: ProjectId,
        fields: &MeetingFields,
        attendee_ids: &BTreeSet<UserId>,
    ) -> CoordinatorResult<Outcome<Meeting>> {
        let tx = self.begin()?;
        let projects = SqliteProjectRepository::new(&tx);
        let meetings = SqliteMeetingRepository::new(&tx);
        let users = SqliteUserRepository::new(&tx);

        let project = load_project(&projects, project_id)?;
        gate(can_create_meeting(actor, &project), Action::CreateMeeting, actor)?;
        if !project.has_team() {
            return Err(precondition(Precondition::NoTeamMembersForMeeting {
                project_id,
            }));
        }

        let mut errors = collect(fields.validate());
        let attendees = resolve_attendees(&users, &project, attendee_ids, &mut errors)?;
        errors.into_result()?;

        let meeting_id = meetings.create_meeting(project_id, actor.id, fields, now_epoch_ms())?;
        meetings.replace_attendees(meeting_id, &ids_of(&attendees))?;
        let meeting = load_meeting(&meetings, meeting_id)?;
        let notifications = notifier(&tx)
            .notify_meeting_scheduled(&meeting, &project, &attendees)
            .map_err(CoordinatorError::NotificationPersistence)?;
        tx.commit()?;

        let email = DeliveryStatus::from_sent(
            self.email
                .send_meeting_invitation_email(&meeting, &project, &attendees),
        );
        info!(
            "event=meeting_create module=coordinator status=ok project={} meeting={} attendees={} email={}",
            project.id,
            meeting.id,
            attendees.len(),
            email.as_str()
        );
        Ok(Outcome {
            value: meeting,
            notifications,
            email,
        })
    }

    /// Replaces meeting fields and the whole attendee set. Creator only.
    pub fn edit_meeting(
        &self,
        actor: &User,
        meeting_id: MeetingId,
        fields: &MeetingFields,
        attendee_ids: &BTreeSet<UserId>,
    ) -> CoordinatorResult<Meeting> {
        let tx = self.begin()?;
        let projects = SqliteProjectRepository::new(&tx);
        let meetings = SqliteMeetingRepository::new(&tx);
        let users = SqliteUserRepository::new(&tx);

        let current = load_meeting(&meetings, meeting_id)?;
        gate(can_edit_meeting(actor, &current), Action::EditMeeting, actor)?;
        let project = load_project(&projects, current.project_id)?;

        let mut errors = collect(fields.validate());
        let attendees = resolve_attendees(&users, &project, attendee_ids, &mut errors)?;
        errors.into_result()?;

        meetings.update_meeting(meeting_id, fields)?;
        meetings.replace_attendees(meeting_id, &ids_of(&attendees))?;
        let meeting = load_meeting(&meetings, meeting_id)?;
        tx.commit()?;

        info!(
            "event=meeting_edit module=coordinator status=ok meeting={} attendees={}",
            meeting.id,
            attendees.len()
        );
        Ok(meeting)
    }

    /// Sets the meeting to `cancelled` whatever its current status.
    pub fn cancel_meeting(&self, actor: &User, meeting_id: MeetingId) -> CoordinatorResult<Meeting> {
        let tx = self.begin()?;
        let meetings = SqliteMeetingRepository::new(&tx);

        let mut meeting = load_meeting(&meetings, meeting_id)?;
        gate(can_cancel_meeting(actor, &meeting), Action::CancelMeeting, actor)?;

        meetings.set_status(meeting_id, MeetingStatus::Cancelled)?;
        tx.commit()?;

        info!(
            "event=meeting_cancel module=coordinator status=ok meeting={meeting_id} from={}",
            meeting.status.as_str()
        );
        meeting.status = MeetingStatus::Cancelled;
        Ok(meeting)
    }

    /// Completes every scheduled meeting dated before `as_of` (epoch ms).
    ///
    /// Idempotent and safe to run from concurrent read paths; returns the
    /// number of meetings this call completed.
    pub fn refresh_meeting_statuses(&self, as_of: i64) -> CoordinatorResult<usize> {
        refresh_meeting_statuses(self.conn, as_of)
    }

    /// Flips one of the actor's own notifications to read; returns whether a
    /// row changed.
    pub fn mark_notification_read(
        &self,
        actor: &User,
        notification_id: NotificationId,
    ) -> CoordinatorResult<bool> {
        let updated = notifier(self.conn).mark_as_read(notification_id, actor.id)?;
        if !updated {
            warn!(
                "event=notification_read module=coordinator status=skipped notification={notification_id} user={}",
                actor.id
            );
        }
        Ok(updated)
    }

    fn begin(&self) -> CoordinatorResult<Transaction<'a>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    fn append_comment(&self, task_id: TaskId, user_id: UserId, content: &str) -> RepoResult<i64> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let comment_id =
            SqliteTaskRepository::new(&tx).add_comment(task_id, user_id, content, now_epoch_ms())?;
        tx.commit()?;
        Ok(comment_id)
    }
}

/// Housekeeping sweep shared by the coordinator and the read paths.
pub fn refresh_meeting_statuses(conn: &Connection, as_of: i64) -> CoordinatorResult<usize> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let completed = SqliteMeetingRepository::new(&tx).complete_past_meetings(as_of)?;
    tx.commit()?;

    if completed > 0 {
        info!("event=meeting_refresh module=coordinator status=ok completed={completed}");
    }
    Ok(completed)
}

const DUPLICATE_PROJECT_KEY: &str = "Project ID already exists. Please choose a different one.";
const NOT_A_VALID_CHOICE: &str = "Not a valid choice.";

fn gate(allowed: bool, action: Action, actor: &User) -> CoordinatorResult<()> {
    ensure(allowed, action, actor).map_err(|denied| {
        warn!(
            "event=permission_denied module=coordinator action={} user={}",
            action.as_str(),
            actor.id
        );
        CoordinatorError::from(denied)
    })
}

fn precondition(reason: Precondition) -> CoordinatorError {
    warn!("event=precondition module=coordinator status=rejected reason={reason}");
    CoordinatorError::from(reason)
}

fn collect(result: Result<(), ValidationErrors>) -> ValidationErrors {
    result.err().unwrap_or_default()
}

fn notifier(conn: &Connection) -> NotificationDispatcher<SqliteNotificationRepository<'_>> {
    NotificationDispatcher::new(SqliteNotificationRepository::new(conn))
}

fn ids_of(users: &[User]) -> BTreeSet<UserId> {
    users.iter().map(|user| user.id).collect()
}

/// Resolves roster ids to team-member accounts; unknown ids are dropped and
/// accounts with another role are reported on `team_members`.
fn resolve_team_members(
    users: &impl UserRepository,
    member_ids: &BTreeSet<UserId>,
    errors: &mut ValidationErrors,
) -> RepoResult<Vec<User>> {
    let resolved = users.resolve_users(member_ids)?;
    for user in resolved.iter().filter(|user| user.role != Role::TeamMember) {
        errors.push(
            "team_members",
            format!("'{}' is not a team member account.", user.username),
        );
    }
    Ok(resolved)
}

/// Resolves attendee ids; unknown ids are dropped, users outside the
/// project's team are rejected and at least one attendee is required.
fn resolve_attendees(
    users: &impl UserRepository,
    project: &Project,
    attendee_ids: &BTreeSet<UserId>,
    errors: &mut ValidationErrors,
) -> RepoResult<Vec<User>> {
    let resolved = users.resolve_users(attendee_ids)?;
    let outsiders: Vec<&User> = resolved
        .iter()
        .filter(|user| !project.has_member(user.id))
        .collect();
    for user in &outsiders {
        errors.push(
            "attendees",
            format!("'{}' is not on this project's team.", user.username),
        );
    }
    if resolved.is_empty() {
        errors.push("attendees", "Please select at least one attendee.");
    }
    Ok(resolved)
}

fn load_project(projects: &impl ProjectRepository, id: ProjectId) -> CoordinatorResult<Project> {
    projects
        .get_project(id)?
        .ok_or_else(|| CoordinatorError::not_found("project", id))
}

fn load_task(tasks: &impl TaskRepository, id: TaskId) -> CoordinatorResult<Task> {
    tasks
        .get_task(id)?
        .ok_or_else(|| CoordinatorError::not_found("task", id))
}

fn load_meeting(meetings: &impl MeetingRepository, id: MeetingId) -> CoordinatorResult<Meeting> {
    meetings
        .get_meeting(id)?
        .ok_or_else(|| CoordinatorError::not_found("meeting", id))
}
