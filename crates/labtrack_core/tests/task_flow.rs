mod common;

use common::{capturing_mail, date, ids, project_fields, Lab};
use labtrack_core::repo::task_repo::{SqliteTaskRepository, TaskQuery, TaskRepository, TaskScope};
use labtrack_core::{
    AssignmentCoordinator, CoordinatorError, DashboardAggregator, DeliveryStatus,
    EmailDispatcher, NotificationType, Precondition, Project, TaskFields, TaskPriority,
    TaskStatus,
};
use std::collections::BTreeSet;

fn team_project(lab: &Lab, coordinator: &AssignmentCoordinator<'_>) -> Project {
    coordinator
        .create_project(
            &lab.pi,
            &project_fields("proj-001"),
            &ids(&[&lab.alice, &lab.bob]),
        )
        .unwrap()
        .value
}

fn task_for(assignee: Option<i64>) -> TaskFields {
    TaskFields {
        title: "Run assay".to_string(),
        description: Some("Plate 3 only".to_string()),
        priority: TaskPriority::High,
        due_date: Some(date(2024, 3, 15)),
        assigned_to: assignee,
    }
}

#[test]
fn created_task_notifies_and_emails_assignee() {
    let lab = Lab::new();
    let (email, outbox) = capturing_mail();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = team_project(&lab, &coordinator);
    let before = outbox.sent().len();

    let outcome = coordinator
        .create_task(&lab.pi, project.id, &task_for(Some(lab.alice.id)))
        .unwrap();

    let task = &outcome.value;
    assert_eq!(task.status, TaskStatus::Todo);
    assert_eq!(task.created_by_id, lab.pi.id);
    assert_eq!(task.completed_at, None);

    assert_eq!(outcome.notifications.len(), 1);
    assert_eq!(
        outcome.notifications[0].notification_type,
        NotificationType::TaskAssigned
    );
    assert_eq!(outcome.notifications[0].context.task_id, Some(task.id));

    assert_eq!(outcome.email, DeliveryStatus::Sent);
    let sent = outbox.sent();
    assert_eq!(sent.len(), before + 1);
    let last = &sent[sent.len() - 1];
    assert_eq!(last.subject, "New Task Assigned: Run assay");
    assert!(last.html_body.contains("March 15, 2024"));
}

#[test]
fn unassigned_task_has_no_side_effects() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = team_project(&lab, &coordinator);

    let outcome = coordinator
        .create_task(&lab.alice, project.id, &task_for(None))
        .unwrap();

    assert!(outcome.notifications.is_empty());
    assert_eq!(outcome.email, DeliveryStatus::NotAttempted);
    assert_eq!(outcome.value.created_by_id, lab.alice.id);
}

#[test]
fn project_without_team_rejects_tasks() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = coordinator
        .create_project(&lab.pi, &project_fields("empty"), &BTreeSet::new())
        .unwrap()
        .value;

    let err = coordinator
        .create_task(&lab.pi, project.id, &task_for(None))
        .unwrap_err();
    match err {
        CoordinatorError::Precondition(reason) => {
            assert_eq!(
                reason,
                Precondition::NoTeamMembersForTask {
                    project_id: project.id
                }
            );
            assert_eq!(
                reason.to_string(),
                "Please add team members to the project before creating tasks."
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn assignee_must_be_on_the_team() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = coordinator
        .create_project(&lab.pi, &project_fields("proj-001"), &ids(&[&lab.alice]))
        .unwrap()
        .value;

    let err = coordinator
        .create_task(&lab.pi, project.id, &task_for(Some(lab.bob.id)))
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Validation(ref errors) if errors.has_field("assigned_to")));

    let tasks = SqliteTaskRepository::new(&lab.conn)
        .list_tasks(&TaskQuery::new(TaskScope::Project(project.id)))
        .unwrap();
    assert!(tasks.is_empty());
}

#[test]
fn outsiders_cannot_create_tasks() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = team_project(&lab, &coordinator);

    let err = coordinator
        .create_task(&lab.other_pi, project.id, &task_for(None))
        .unwrap_err();
    assert!(err.is_forbidden());
}

#[test]
fn completed_at_is_stamped_once() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = team_project(&lab, &coordinator);
    let task = coordinator
        .create_task(&lab.pi, project.id, &task_for(Some(lab.alice.id)))
        .unwrap()
        .value;
    let dashboard = DashboardAggregator::new(&lab.conn);
    assert_eq!(dashboard.pending_tasks(&lab.alice).unwrap().len(), 1);

    let started = coordinator
        .update_task_status(&lab.alice, task.id, TaskStatus::InProgress, None)
        .unwrap();
    assert_eq!(started.completed_at, None);

    let done = coordinator
        .update_task_status(&lab.alice, task.id, TaskStatus::Completed, None)
        .unwrap();
    let first_stamp = done.completed_at.expect("completion time");
    assert!(dashboard.pending_tasks(&lab.alice).unwrap().is_empty());

    coordinator
        .update_task_status(&lab.alice, task.id, TaskStatus::InProgress, None)
        .unwrap();
    let redone = coordinator
        .update_task_status(&lab.pi, task.id, TaskStatus::Completed, None)
        .unwrap();
    assert_eq!(redone.completed_at, Some(first_stamp));

    let stored = SqliteTaskRepository::new(&lab.conn)
        .get_task(task.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(stored.completed_at, Some(first_stamp));
}

#[test]
fn only_assignee_or_owner_updates_status() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = team_project(&lab, &coordinator);
    let task = coordinator
        .create_task(&lab.pi, project.id, &task_for(Some(lab.alice.id)))
        .unwrap()
        .value;

    for actor in [&lab.bob, &lab.other_pi] {
        let err = coordinator
            .update_task_status(actor, task.id, TaskStatus::Completed, None)
            .unwrap_err();
        assert!(err.is_forbidden());
    }
    let stored = SqliteTaskRepository::new(&lab.conn)
        .get_task(task.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TaskStatus::Todo);
}

#[test]
fn status_update_appends_trimmed_comment() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = team_project(&lab, &coordinator);
    let task = coordinator
        .create_task(&lab.pi, project.id, &task_for(Some(lab.alice.id)))
        .unwrap()
        .value;

    coordinator
        .update_task_status(&lab.alice, task.id, TaskStatus::InProgress, Some("  started  "))
        .unwrap();
    coordinator
        .update_task_status(&lab.alice, task.id, TaskStatus::Completed, Some("   "))
        .unwrap();

    let view = DashboardAggregator::new(&lab.conn)
        .view_task(&lab.alice, task.id)
        .unwrap();
    assert_eq!(view.comments.len(), 1);
    assert_eq!(view.comments[0].content, "started");
    assert_eq!(view.comments[0].user_id, lab.alice.id);
}

#[test]
fn failed_comment_keeps_committed_status() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = team_project(&lab, &coordinator);
    let task = coordinator
        .create_task(&lab.pi, project.id, &task_for(Some(lab.alice.id)))
        .unwrap()
        .value;
    lab.conn
        .execute_batch(
            "CREATE TRIGGER reject_comments BEFORE INSERT ON task_comments
             BEGIN SELECT RAISE(ABORT, 'comments disabled'); END;",
        )
        .unwrap();

    let err = coordinator
        .update_task_status(&lab.alice, task.id, TaskStatus::Completed, Some("done"))
        .unwrap_err();
    match err {
        CoordinatorError::CommentNotSaved { task: updated, .. } => {
            assert_eq!(updated.status, TaskStatus::Completed);
            assert!(updated.completed_at.is_some());
        }
        other => panic!("unexpected error: {other}"),
    }

    let stored = SqliteTaskRepository::new(&lab.conn)
        .get_task(task.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert!(SqliteTaskRepository::new(&lab.conn)
        .list_comments(task.id)
        .unwrap()
        .is_empty());
}

#[test]
fn notification_failure_rolls_back_the_task() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = team_project(&lab, &coordinator);
    lab.conn
        .execute_batch(
            "CREATE TRIGGER reject_notifications BEFORE INSERT ON notifications
             BEGIN SELECT RAISE(ABORT, 'inbox offline'); END;",
        )
        .unwrap();

    let err = coordinator
        .create_task(&lab.pi, project.id, &task_for(Some(lab.alice.id)))
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotificationPersistence(_)));
    assert_eq!(err.code(), "notification_persistence_failed");

    let tasks = SqliteTaskRepository::new(&lab.conn)
        .list_tasks(&TaskQuery::new(TaskScope::Project(project.id)))
        .unwrap();
    assert!(tasks.is_empty());
}

#[test]
fn comments_follow_view_permission() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = team_project(&lab, &coordinator);
    let task = coordinator
        .create_task(&lab.pi, project.id, &task_for(Some(lab.alice.id)))
        .unwrap()
        .value;

    let comment = coordinator
        .add_comment(&lab.bob, task.id, "I can help")
        .unwrap()
        .expect("stored comment");
    assert_eq!(comment.task_id, task.id);
    assert_eq!(coordinator.add_comment(&lab.pi, task.id, "\n\t").unwrap(), None);
    assert!(coordinator
        .add_comment(&lab.other_pi, task.id, "drive-by")
        .unwrap_err()
        .is_forbidden());

    let comments = SqliteTaskRepository::new(&lab.conn)
        .list_comments(task.id)
        .unwrap();
    assert_eq!(comments, vec![comment]);
}
