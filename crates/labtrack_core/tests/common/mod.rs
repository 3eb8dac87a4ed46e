#![allow(dead_code)]

use chrono::NaiveDate;
use labtrack_core::mail::BuiltinTemplates;
use labtrack_core::model::now_epoch_ms;
use labtrack_core::repo::user_repo::{SqliteUserRepository, UserRecord, UserRepository};
use labtrack_core::{
    open_db_in_memory, EmailDispatcher, MailSettings, MemoryBackend, ProjectFields, ProjectStatus,
    Role, Title, User, UserId,
};
use rusqlite::Connection;
use std::collections::BTreeSet;

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// A lab with one PI, two team members and a second PI who owns nothing.
pub struct Lab {
    pub conn: Connection,
    pub pi: User,
    pub alice: User,
    pub bob: User,
    pub other_pi: User,
}

impl Lab {
    pub fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let pi = insert_user(&conn, "grace_pi", Role::Pi);
        let alice = insert_user(&conn, "alice_tm", Role::TeamMember);
        let bob = insert_user(&conn, "bob_tm", Role::TeamMember);
        let other_pi = insert_user(&conn, "other_pi", Role::Pi);
        Self {
            conn,
            pi,
            alice,
            bob,
            other_pi,
        }
    }
}

pub fn insert_user(conn: &Connection, username: &str, role: Role) -> User {
    let repo = SqliteUserRepository::new(conn);
    let email = format!("{username}@lab.example");
    let id = repo
        .create_user(&UserRecord {
            title: Title::Dr,
            username,
            email: &email,
            first_name: username,
            last_name: "Tester",
            role,
            password_hash: "not-a-real-hash",
            created_at: now_epoch_ms(),
        })
        .unwrap();
    repo.get_user(id).unwrap().unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn project_fields(key: &str) -> ProjectFields {
    ProjectFields {
        project_key: key.to_string(),
        title: format!("Project {key}"),
        description: Some("Field study".to_string()),
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
        status: ProjectStatus::Active,
        funding_source: Some("NSF".to_string()),
        funding_amount: Some(50_000.0),
    }
}

pub fn ids(users: &[&User]) -> BTreeSet<UserId> {
    users.iter().map(|user| user.id).collect()
}

pub fn mail_settings() -> MailSettings {
    MailSettings {
        username: Some("noreply@lab.example".to_string()),
        password: Some("secret".to_string()),
        default_sender: Some("noreply@lab.example".to_string()),
        ..MailSettings::default()
    }
}

/// Dispatcher with mail configured, capturing into the returned outbox.
pub fn capturing_mail() -> (EmailDispatcher, MemoryBackend) {
    let outbox = MemoryBackend::new();
    let dispatcher = EmailDispatcher::new(mail_settings(), outbox.clone(), BuiltinTemplates);
    (dispatcher, outbox)
}
