//! Role and relationship permission gates.
//!
//! # Responsibility
//! - Answer "may this user perform this action on this entity" from role
//!   and membership alone.
//!
//! # Invariants
//! - Predicates are total and side-effect free.
//! - A failed gate surfaces as `PermissionDenied`, never as a generic error.

use crate::model::meeting::Meeting;
use crate::model::project::Project;
use crate::model::task::Task;
use crate::model::user::{Role, User, UserId};
use serde::Serialize;
use thiserror::Error;

/// Gated action, carried in denials so callers can log what was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ViewProject,
    EditProject,
    DeleteProject,
    CreateProject,
    CreateTask,
    ViewTask,
    UpdateTaskStatus,
    CommentOnTask,
    CreateMeeting,
    EditMeeting,
    CancelMeeting,
    ViewMeeting,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewProject => "view_project",
            Self::EditProject => "edit_project",
            Self::DeleteProject => "delete_project",
            Self::CreateProject => "create_project",
            Self::CreateTask => "create_task",
            Self::ViewTask => "view_task",
            Self::UpdateTaskStatus => "update_task_status",
            Self::CommentOnTask => "comment_on_task",
            Self::CreateMeeting => "create_meeting",
            Self::EditMeeting => "edit_meeting",
            Self::CancelMeeting => "cancel_meeting",
            Self::ViewMeeting => "view_meeting",
        }
    }
}

/// Authorization-denied signal; maps to a fixed "forbidden" response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("user {user_id} is not allowed to {}", .action.as_str())]
pub struct PermissionDenied {
    pub action: Action,
    pub user_id: UserId,
}

/// Converts a predicate result into a gate.
pub fn ensure(allowed: bool, action: Action, user: &User) -> Result<(), PermissionDenied> {
    if allowed {
        Ok(())
    } else {
        Err(PermissionDenied {
            action,
            user_id: user.id,
        })
    }
}

fn is_owner_or_member(user: &User, project: &Project) -> bool {
    project.is_owned_by(user.id) || project.has_member(user.id)
}

pub fn can_view_project(user: &User, project: &Project) -> bool {
    is_owner_or_member(user, project)
}

pub fn can_edit_project(user: &User, project: &Project) -> bool {
    project.is_owned_by(user.id)
}

pub fn can_delete_project(user: &User, project: &Project) -> bool {
    project.is_owned_by(user.id)
}

pub fn can_create_project(user: &User) -> bool {
    user.role == Role::Pi
}

pub fn can_create_task(user: &User, project: &Project) -> bool {
    is_owner_or_member(user, project)
}

/// `project` must be the task's own project.
pub fn can_view_task(user: &User, project: &Project, task: &Task) -> bool {
    is_owner_or_member(user, project) || task.is_assigned_to(user.id)
}

pub fn can_update_task_status(user: &User, project: &Project, task: &Task) -> bool {
    task.is_assigned_to(user.id) || project.is_owned_by(user.id)
}

pub fn can_create_meeting(user: &User, project: &Project) -> bool {
    project.is_owned_by(user.id)
}

pub fn can_edit_meeting(user: &User, meeting: &Meeting) -> bool {
    meeting.is_created_by(user.id)
}

pub fn can_cancel_meeting(user: &User, meeting: &Meeting) -> bool {
    meeting.is_created_by(user.id)
}

/// `project` must be the meeting's own project.
pub fn can_view_meeting(user: &User, project: &Project, meeting: &Meeting) -> bool {
    project.is_owned_by(user.id) || meeting.has_attendee(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::meeting::MeetingStatus;
    use crate::model::project::ProjectStatus;
    use crate::model::task::{TaskPriority, TaskStatus};
    use crate::model::user::Title;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    const OWNER: UserId = 1;
    const OTHER_PI: UserId = 2;
    const MEMBER: UserId = 3;
    const OUTSIDER: UserId = 4;

    fn user(id: UserId, role: Role) -> User {
        User {
            id,
            title: Title::Dr,
            username: format!("user{id}"),
            email: format!("user{id}@lab.test"),
            first_name: "Test".to_string(),
            last_name: format!("User{id}"),
            role,
            created_at: 0,
            last_login: None,
        }
    }

    fn everyone() -> Vec<User> {
        vec![
            user(OWNER, Role::Pi),
            user(OTHER_PI, Role::Pi),
            user(MEMBER, Role::TeamMember),
            user(OUTSIDER, Role::TeamMember),
        ]
    }

    fn project() -> Project {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Project {
            id: 10,
            project_key: "proj-001".to_string(),
            title: "Genome assembly".to_string(),
            description: None,
            start_date: day,
            end_date: day,
            status: ProjectStatus::Active,
            funding_source: None,
            funding_amount: None,
            pi_id: OWNER,
            team_member_ids: BTreeSet::from([MEMBER]),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn task(assignee: Option<UserId>) -> Task {
        Task {
            id: 20,
            project_id: 10,
            title: "Sequence".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            assigned_to_id: assignee,
            created_by_id: OWNER,
            created_at: 0,
            updated_at: 0,
            completed_at: None,
        }
    }

    fn meeting(attendees: &[UserId]) -> Meeting {
        Meeting {
            id: 30,
            project_id: 10,
            created_by_id: OWNER,
            title: "Kickoff".to_string(),
            agenda: None,
            meeting_date: 0,
            duration_minutes: 60,
            location: None,
            meeting_link: None,
            status: MeetingStatus::Scheduled,
            attendee_ids: attendees.iter().copied().collect(),
            created_at: 0,
        }
    }

    #[test]
    fn view_project_iff_owner_or_member() {
        let project = project();
        for user in everyone() {
            let expected = user.id == OWNER || user.id == MEMBER;
            assert_eq!(can_view_project(&user, &project), expected, "user {}", user.id);
            assert_eq!(can_create_task(&user, &project), expected, "user {}", user.id);
        }
    }

    #[test]
    fn only_owner_edits_deletes_and_schedules() {
        let project = project();
        for user in everyone() {
            let expected = user.id == OWNER;
            assert_eq!(can_edit_project(&user, &project), expected);
            assert_eq!(can_delete_project(&user, &project), expected);
            assert_eq!(can_create_meeting(&user, &project), expected);
        }
    }

    #[test]
    fn create_project_follows_role() {
        for user in everyone() {
            assert_eq!(can_create_project(&user), user.role == Role::Pi);
        }
    }

    #[test]
    fn assignee_outside_team_can_view_and_update_task() {
        let project = project();
        let task = task(Some(OUTSIDER));
        for user in everyone() {
            let view = matches!(user.id, OWNER | MEMBER | OUTSIDER);
            let update = matches!(user.id, OWNER | OUTSIDER);
            assert_eq!(can_view_task(&user, &project, &task), view, "user {}", user.id);
            assert_eq!(
                can_update_task_status(&user, &project, &task),
                update,
                "user {}",
                user.id
            );
        }
    }

    #[test]
    fn unassigned_task_is_updated_by_owner_only() {
        let project = project();
        let task = task(None);
        for user in everyone() {
            assert_eq!(
                can_update_task_status(&user, &project, &task),
                user.id == OWNER
            );
        }
    }

    #[test]
    fn meeting_visibility_and_creator_gates() {
        let project = project();
        let meeting = meeting(&[MEMBER]);
        for user in everyone() {
            assert_eq!(
                can_view_meeting(&user, &project, &meeting),
                matches!(user.id, OWNER | MEMBER)
            );
            assert_eq!(can_edit_meeting(&user, &meeting), user.id == OWNER);
            assert_eq!(can_cancel_meeting(&user, &meeting), user.id == OWNER);
        }
    }

    #[test]
    fn team_member_not_attending_cannot_view_meeting() {
        let project = project();
        let meeting = meeting(&[]);
        let member = user(MEMBER, Role::TeamMember);
        assert!(!can_view_meeting(&member, &project, &meeting));
    }

    #[test]
    fn ensure_reports_action_and_user() {
        let outsider = user(OUTSIDER, Role::TeamMember);
        let denied = ensure(false, Action::EditProject, &outsider).unwrap_err();
        assert_eq!(denied.action, Action::EditProject);
        assert_eq!(denied.user_id, OUTSIDER);
        assert!(ensure(true, Action::EditProject, &outsider).is_ok());
    }
}
