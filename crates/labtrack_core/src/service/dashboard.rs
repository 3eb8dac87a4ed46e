//! Read-only dashboard aggregator and permission-gated detail views.
//!
//! # Responsibility
//! - Compose per-request views across projects, tasks, meetings and
//!   notifications. Nothing is cached.
//!
//! # Invariants
//! - PIs see what their owned projects contain; team members see what they
//!   are assigned to or attend.
//! - Views that show meeting status run the housekeeping refresh first.

use crate::model::meeting::{Meeting, MeetingId, MeetingStatus};
use crate::model::notification::Notification;
use crate::model::project::{Project, ProjectId, ProjectStatus};
use crate::model::task::{Task, TaskComment, TaskId, TaskStatus};
use crate::model::user::User;
use crate::permission::{can_view_meeting, can_view_project, can_view_task, ensure, Action};
use crate::repo::meeting_repo::{
    MeetingQuery, MeetingRepository, MeetingScope, SqliteMeetingRepository,
};
use crate::repo::notification_repo::SqliteNotificationRepository;
use crate::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use crate::repo::task_repo::{
    SqliteTaskRepository, TaskCounts, TaskOrder, TaskQuery, TaskRepository, TaskScope,
};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::service::coordinator::refresh_meeting_statuses;
use crate::service::error::{CoordinatorError, CoordinatorResult};
use crate::service::notifications::NotificationDispatcher;
use log::{debug, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

pub const UPCOMING_HORIZON_DAYS: i64 = 7;
pub const UPCOMING_MEETINGS_LIMIT: u32 = 5;
pub const PENDING_TASKS_LIMIT: u32 = 10;
pub const RECENT_ACTIVITY_LIMIT: u32 = 10;
pub const DASHBOARD_NOTIFICATIONS_LIMIT: u32 = 5;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProjectStats {
    pub total: u32,
    pub active: u32,
    pub completed: u32,
    /// Sum of funding amounts; missing amounts count as zero.
    pub total_funding: f64,
}

/// Counts by status plus total funding.
pub fn compute_project_stats(projects: &[Project]) -> ProjectStats {
    projects
        .iter()
        .fold(ProjectStats::default(), |mut stats, project| {
            stats.total += 1;
            match project.status {
                ProjectStatus::Active => stats.active += 1,
                ProjectStatus::Completed => stats.completed += 1,
                ProjectStatus::Proposal | ProjectStatus::OnHold => {}
            }
            stats.total_funding += project.funding_amount.unwrap_or(0.0);
            stats
        })
}

/// Completion percentage rounded to one decimal; `0.0` with no tasks.
pub fn progress_percent(counts: TaskCounts) -> f64 {
    if counts.total == 0 {
        return 0.0;
    }
    let percent = f64::from(counts.completed) / f64::from(counts.total) * 100.0;
    (percent * 10.0).round() / 10.0
}

/// One recent-activity feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub kind: &'static str,
    pub title: String,
    pub project_title: String,
    /// Last update in epoch milliseconds.
    pub date: i64,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub projects: Vec<Project>,
    pub stats: ProjectStats,
    pub upcoming_meetings: Vec<Meeting>,
    pub pending_tasks: Vec<Task>,
    pub unread_notifications: Vec<Notification>,
    pub recent_activity: Vec<Activity>,
    /// Meetings the housekeeping refresh completed on this read.
    pub meetings_completed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    pub project: Project,
    pub owner: Option<User>,
    pub team: Vec<User>,
    pub tasks: Vec<Task>,
    pub meetings: Vec<Meeting>,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub task: Task,
    pub project: Project,
    pub assignee: Option<User>,
    pub comments: Vec<TaskComment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingView {
    pub meeting: Meeting,
    pub project: Project,
    pub attendees: Vec<User>,
}

pub struct DashboardAggregator<'a> {
    conn: &'a Connection,
}

impl<'a> DashboardAggregator<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn projects(&self) -> SqliteProjectRepository<'a> {
        SqliteProjectRepository::new(self.conn)
    }

    fn tasks(&self) -> SqliteTaskRepository<'a> {
        SqliteTaskRepository::new(self.conn)
    }

    fn meetings(&self) -> SqliteMeetingRepository<'a> {
        SqliteMeetingRepository::new(self.conn)
    }

    fn users(&self) -> SqliteUserRepository<'a> {
        SqliteUserRepository::new(self.conn)
    }

    /// PI: owned projects. Team member: assigned projects.
    pub fn accessible_projects(&self, user: &User) -> CoordinatorResult<Vec<Project>> {
        let projects = if user.is_pi() {
            self.projects().list_owned_by(user.id)?
        } else {
            self.projects().list_for_member(user.id)?
        };
        Ok(projects)
    }

    /// Scheduled meetings visible to `user` dated within
    /// `[as_of, as_of + horizon_days]`, soonest first.
    pub fn upcoming_meetings(
        &self,
        user: &User,
        horizon_days: i64,
        as_of: i64,
    ) -> CoordinatorResult<Vec<Meeting>> {
        let query = MeetingQuery {
            statuses: vec![MeetingStatus::Scheduled],
            from: Some(as_of),
            until: Some(as_of.saturating_add(horizon_days.saturating_mul(DAY_MS))),
            limit: Some(UPCOMING_MEETINGS_LIMIT),
            ..MeetingQuery::new(MeetingScope::VisibleTo(user.id))
        };
        Ok(self.meetings().list_meetings(&query)?)
    }

    /// `todo`/`in_progress` tasks by due date, undated first.
    pub fn pending_tasks(&self, user: &User) -> CoordinatorResult<Vec<Task>> {
        let query = TaskQuery {
            pending_only: true,
            limit: Some(PENDING_TASKS_LIMIT),
            ..TaskQuery::new(task_scope(user))
        };
        Ok(self.tasks().list_tasks(&query)?)
    }

    /// Recently updated tasks, newest first.
    pub fn recent_activity(&self, user: &User, limit: u32) -> CoordinatorResult<Vec<Activity>> {
        let query = TaskQuery {
            order: TaskOrder::UpdatedDesc,
            limit: Some(limit),
            ..TaskQuery::new(task_scope(user))
        };
        let tasks = self.tasks().list_tasks(&query)?;

        let mut titles: HashMap<ProjectId, String> = HashMap::new();
        let mut activity = Vec::with_capacity(tasks.len());
        for task in tasks {
            let project_title = match titles.get(&task.project_id) {
                Some(title) => title.clone(),
                None => {
                    let title = self
                        .projects()
                        .get_project(task.project_id)?
                        .map(|project| project.title)
                        .unwrap_or_default();
                    titles.insert(task.project_id, title.clone());
                    title
                }
            };
            activity.push(Activity {
                kind: "task",
                title: format!("Task '{}' updated", task.title),
                project_title,
                date: task.updated_at,
                status: task.status,
            });
        }
        activity.sort_by(|left, right| right.date.cmp(&left.date));
        activity.truncate(limit as usize);
        Ok(activity)
    }

    pub fn project_progress(&self, project_id: ProjectId) -> CoordinatorResult<f64> {
        Ok(progress_percent(self.tasks().count_for_project(project_id)?))
    }

    pub fn unread_notifications(
        &self,
        user: &User,
        limit: u32,
    ) -> CoordinatorResult<Vec<Notification>> {
        let dispatcher =
            NotificationDispatcher::new(SqliteNotificationRepository::new(self.conn));
        Ok(dispatcher.unread(user.id, limit)?)
    }

    /// PI: every task of owned projects. Team member: assigned tasks.
    pub fn my_tasks(&self, user: &User) -> CoordinatorResult<Vec<Task>> {
        Ok(self.tasks().list_tasks(&TaskQuery::new(task_scope(user)))?)
    }

    /// Refreshes meeting statuses, then lists scheduled and completed
    /// meetings visible to `user` by date.
    pub fn calendar(&self, user: &User, as_of: i64) -> CoordinatorResult<Vec<Meeting>> {
        refresh_meeting_statuses(self.conn, as_of)?;
        let query = MeetingQuery {
            statuses: vec![MeetingStatus::Scheduled, MeetingStatus::Completed],
            ..MeetingQuery::new(MeetingScope::VisibleTo(user.id))
        };
        Ok(self.meetings().list_meetings(&query)?)
    }

    /// Refreshes meeting statuses, then composes the dashboard for `user`.
    pub fn dashboard(&self, user: &User, as_of: i64) -> CoordinatorResult<DashboardSnapshot> {
        let meetings_completed = refresh_meeting_statuses(self.conn, as_of)?;
        let projects = self.accessible_projects(user)?;
        let stats = compute_project_stats(&projects);
        let snapshot = DashboardSnapshot {
            stats,
            upcoming_meetings: self.upcoming_meetings(user, UPCOMING_HORIZON_DAYS, as_of)?,
            pending_tasks: self.pending_tasks(user)?,
            unread_notifications: self.unread_notifications(user, DASHBOARD_NOTIFICATIONS_LIMIT)?,
            recent_activity: self.recent_activity(user, RECENT_ACTIVITY_LIMIT)?,
            projects,
            meetings_completed,
        };
        debug!(
            "event=dashboard_read module=dashboard status=ok user={} projects={} pending={}",
            user.id,
            snapshot.projects.len(),
            snapshot.pending_tasks.len()
        );
        Ok(snapshot)
    }

    pub fn view_project(&self, actor: &User, project_id: ProjectId) -> CoordinatorResult<ProjectView> {
        let project = self
            .projects()
            .get_project(project_id)?
            .ok_or_else(|| CoordinatorError::not_found("project", project_id))?;
        gate(can_view_project(actor, &project), Action::ViewProject, actor)?;

        let users = self.users();
        let owner = users.get_user(project.pi_id)?;
        let team = users.resolve_users(&project.team_member_ids)?;
        let tasks = self
            .tasks()
            .list_tasks(&TaskQuery::new(TaskScope::Project(project_id)))?;
        let meetings = self
            .meetings()
            .list_meetings(&MeetingQuery::new(MeetingScope::Project(project_id)))?;
        let progress = self.project_progress(project_id)?;
        Ok(ProjectView {
            project,
            owner,
            team,
            tasks,
            meetings,
            progress,
        })
    }

    pub fn view_task(&self, actor: &User, task_id: TaskId) -> CoordinatorResult<TaskView> {
        let tasks = self.tasks();
        let task = tasks
            .get_task(task_id)?
            .ok_or_else(|| CoordinatorError::not_found("task", task_id))?;
        let project = self
            .projects()
            .get_project(task.project_id)?
            .ok_or_else(|| CoordinatorError::not_found("project", task.project_id))?;
        gate(can_view_task(actor, &project, &task), Action::ViewTask, actor)?;

        let assignee = match task.assigned_to_id {
            Some(user_id) => self.users().get_user(user_id)?,
            None => None,
        };
        let comments = tasks.list_comments(task_id)?;
        Ok(TaskView {
            task,
            project,
            assignee,
            comments,
        })
    }

    pub fn view_meeting(&self, actor: &User, meeting_id: MeetingId) -> CoordinatorResult<MeetingView> {
        let meeting = self
            .meetings()
            .get_meeting(meeting_id)?
            .ok_or_else(|| CoordinatorError::not_found("meeting", meeting_id))?;
        let project = self
            .projects()
            .get_project(meeting.project_id)?
            .ok_or_else(|| CoordinatorError::not_found("project", meeting.project_id))?;
        gate(
            can_view_meeting(actor, &project, &meeting),
            Action::ViewMeeting,
            actor,
        )?;

        let attendees = self.users().resolve_users(&meeting.attendee_ids)?;
        Ok(MeetingView {
            meeting,
            project,
            attendees,
        })
    }
}

fn task_scope(user: &User) -> TaskScope {
    if user.is_pi() {
        TaskScope::OwnedBy(user.id)
    } else {
        TaskScope::AssignedTo(user.id)
    }
}

fn gate(allowed: bool, action: Action, actor: &User) -> CoordinatorResult<()> {
    ensure(allowed, action, actor).map_err(|denied| {
        warn!(
            "event=permission_denied module=dashboard action={} user={}",
            action.as_str(),
            actor.id
        );
        CoordinatorError::from(denied)
    })
}
