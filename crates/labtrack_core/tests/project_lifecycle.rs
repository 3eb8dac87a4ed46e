mod common;

use common::{capturing_mail, date, ids, insert_user, project_fields, Lab};
use labtrack_core::repo::project_repo::{ProjectRepository, SqliteProjectRepository};
use labtrack_core::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use labtrack_core::{
    Action, AssignmentCoordinator, CoordinatorError, DeliveryStatus, EmailDispatcher,
    NotificationType, Role,
};
use std::collections::BTreeSet;

#[test]
fn pi_creates_project_with_one_member() {
    let lab = Lab::new();
    let (email, outbox) = capturing_mail();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    let outcome = coordinator
        .create_project(&lab.pi, &project_fields("proj-001"), &ids(&[&lab.alice]))
        .unwrap();

    let project = &outcome.value;
    assert_eq!(project.pi_id, lab.pi.id);
    assert_eq!(project.team_member_ids, ids(&[&lab.alice]));

    assert_eq!(outcome.notifications.len(), 1);
    let notification = &outcome.notifications[0];
    assert_eq!(notification.user_id, lab.alice.id);
    assert_eq!(notification.notification_type, NotificationType::ProjectAssigned);
    assert_eq!(notification.context.project_id, Some(project.id));
    assert!(!notification.is_read);

    assert_eq!(outcome.email, DeliveryStatus::Sent);
    let sent = outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec![lab.alice.email.clone()]);
    assert_eq!(
        sent[0].subject,
        "You've been assigned to project: Project proj-001"
    );

    let stored = SqliteProjectRepository::new(&lab.conn)
        .get_project(project.id)
        .unwrap()
        .unwrap();
    assert_eq!(&stored, project);
}

#[test]
fn project_without_members_sends_nothing() {
    let lab = Lab::new();
    let (email, outbox) = capturing_mail();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    let outcome = coordinator
        .create_project(&lab.pi, &project_fields("solo"), &BTreeSet::new())
        .unwrap();

    assert!(outcome.notifications.is_empty());
    assert_eq!(outcome.email, DeliveryStatus::NotAttempted);
    assert!(outbox.sent().is_empty());
}

#[test]
fn end_before_start_persists_nothing() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    let mut fields = project_fields("backwards");
    fields.start_date = date(2024, 6, 1);
    fields.end_date = date(2024, 5, 31);
    let err = coordinator
        .create_project(&lab.pi, &fields, &ids(&[&lab.alice]))
        .unwrap_err();

    match err {
        CoordinatorError::Validation(errors) => assert!(errors.has_field("end_date")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(SqliteProjectRepository::new(&lab.conn)
        .list_owned_by(lab.pi.id)
        .unwrap()
        .is_empty());
    assert_eq!(
        SqliteNotificationRepository::new(&lab.conn)
            .count_for_user(lab.alice.id)
            .unwrap(),
        0
    );
}

#[test]
fn duplicate_key_is_rejected_and_key_is_case_sensitive() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    coordinator
        .create_project(&lab.pi, &project_fields("proj-001"), &BTreeSet::new())
        .unwrap();

    let err = coordinator
        .create_project(&lab.other_pi, &project_fields("proj-001"), &BTreeSet::new())
        .unwrap_err();
    match err {
        CoordinatorError::Validation(errors) => {
            let messages: Vec<_> = errors
                .errors()
                .iter()
                .filter(|error| error.field == "project_key")
                .map(|error| error.message.as_str())
                .collect();
            assert_eq!(
                messages,
                vec!["Project ID already exists. Please choose a different one."]
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    coordinator
        .create_project(&lab.other_pi, &project_fields("PROJ-001"), &BTreeSet::new())
        .unwrap();
}

#[test]
fn editing_with_unchanged_key_succeeds() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    let project = coordinator
        .create_project(&lab.pi, &project_fields("proj-001"), &BTreeSet::new())
        .unwrap()
        .value;

    let mut fields = project_fields("proj-001");
    fields.title = "Renamed".to_string();
    let edited = coordinator
        .edit_project(&lab.pi, project.id, &fields, &BTreeSet::new())
        .unwrap()
        .value;

    assert_eq!(edited.project_key, "proj-001");
    assert_eq!(edited.title, "Renamed");
    assert!(edited.updated_at >= project.updated_at);
}

#[test]
fn editing_to_another_projects_key_fails() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    coordinator
        .create_project(&lab.pi, &project_fields("taken"), &BTreeSet::new())
        .unwrap();
    let second = coordinator
        .create_project(&lab.pi, &project_fields("free"), &BTreeSet::new())
        .unwrap()
        .value;

    let err = coordinator
        .edit_project(&lab.pi, second.id, &project_fields("taken"), &BTreeSet::new())
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Validation(ref errors) if errors.has_field("project_key")));
}

#[test]
fn outsider_cannot_edit_and_state_is_unchanged() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = coordinator
        .create_project(&lab.pi, &project_fields("proj-001"), &ids(&[&lab.alice]))
        .unwrap()
        .value;

    let mut fields = project_fields("hijacked");
    fields.title = "Hijacked".to_string();
    for actor in [&lab.bob, &lab.other_pi, &lab.alice] {
        let err = coordinator
            .edit_project(actor, project.id, &fields, &BTreeSet::new())
            .unwrap_err();
        assert!(err.is_forbidden());
        match err {
            CoordinatorError::PermissionDenied(denied) => {
                assert_eq!(denied.action, Action::EditProject);
                assert_eq!(denied.user_id, actor.id);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    let stored = SqliteProjectRepository::new(&lab.conn)
        .get_project(project.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored, project);
}

#[test]
fn team_member_cannot_create_project() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    let err = coordinator
        .create_project(&lab.alice, &project_fields("nope"), &BTreeSet::new())
        .unwrap_err();
    assert_eq!(err.code(), "forbidden");
}

#[test]
fn only_owner_can_delete() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let project = coordinator
        .create_project(&lab.pi, &project_fields("proj-001"), &ids(&[&lab.alice]))
        .unwrap()
        .value;

    assert!(coordinator
        .delete_project(&lab.alice, project.id)
        .unwrap_err()
        .is_forbidden());
    coordinator.delete_project(&lab.pi, project.id).unwrap();

    let err = coordinator.delete_project(&lab.pi, project.id).unwrap_err();
    assert!(matches!(err, CoordinatorError::NotFound { entity: "project", .. }));
}

#[test]
fn edit_replaces_roster_and_renotifies_every_member() {
    let lab = Lab::new();
    let (email, outbox) = capturing_mail();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);
    let carol = insert_user(&lab.conn, "carol_tm", Role::TeamMember);

    let project = coordinator
        .create_project(
            &lab.pi,
            &project_fields("proj-001"),
            &ids(&[&lab.alice, &lab.bob]),
        )
        .unwrap()
        .value;

    let outcome = coordinator
        .edit_project(
            &lab.pi,
            project.id,
            &project_fields("proj-001"),
            &ids(&[&lab.bob, &carol]),
        )
        .unwrap();

    assert_eq!(outcome.value.team_member_ids, ids(&[&lab.bob, &carol]));
    let notified: BTreeSet<_> = outcome
        .notifications
        .iter()
        .map(|notification| notification.user_id)
        .collect();
    assert_eq!(notified, ids(&[&lab.bob, &carol]));

    let notifications = SqliteNotificationRepository::new(&lab.conn);
    assert_eq!(notifications.count_for_user(lab.bob.id).unwrap(), 2);
    assert_eq!(notifications.count_for_user(carol.id).unwrap(), 1);
    assert_eq!(notifications.count_for_user(lab.alice.id).unwrap(), 1);

    let sent = outbox.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[1].to,
        vec![lab.bob.email.clone(), carol.email.clone()]
    );
}

#[test]
fn unknown_member_ids_are_dropped_silently() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    let mut members = ids(&[&lab.alice]);
    members.insert(9_999);
    let outcome = coordinator
        .create_project(&lab.pi, &project_fields("proj-001"), &members)
        .unwrap();

    assert_eq!(outcome.value.team_member_ids, ids(&[&lab.alice]));
    assert_eq!(outcome.notifications.len(), 1);
}

#[test]
fn pi_accounts_cannot_join_a_roster() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    let err = coordinator
        .create_project(
            &lab.pi,
            &project_fields("proj-001"),
            &ids(&[&lab.alice, &lab.other_pi]),
        )
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Validation(ref errors) if errors.has_field("team_members")));
}

#[test]
fn email_failure_does_not_roll_back() {
    let lab = Lab::new();
    let (email, outbox) = capturing_mail();
    outbox.fail_sends(true);
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    let outcome = coordinator
        .create_project(&lab.pi, &project_fields("proj-001"), &ids(&[&lab.alice]))
        .unwrap();

    assert_eq!(outcome.email, DeliveryStatus::Failed);
    assert!(outbox.sent().is_empty());
    assert!(SqliteProjectRepository::new(&lab.conn)
        .get_project(outcome.value.id)
        .unwrap()
        .is_some());
    assert_eq!(
        SqliteNotificationRepository::new(&lab.conn)
            .count_for_user(lab.alice.id)
            .unwrap(),
        1
    );
}

#[test]
fn unconfigured_mail_reports_failed_delivery() {
    let lab = Lab::new();
    let email = EmailDispatcher::disabled();
    let coordinator = AssignmentCoordinator::new(&lab.conn, &email);

    let outcome = coordinator
        .create_project(&lab.pi, &project_fields("proj-001"), &ids(&[&lab.alice]))
        .unwrap();

    assert_eq!(outcome.email, DeliveryStatus::Failed);
    assert_eq!(outcome.notifications.len(), 1);
}
