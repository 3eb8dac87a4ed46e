//! User repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Username and email uniqueness is enforced by the schema; callers
//!   pre-check with `username_exists`/`email_exists` to report field errors.
//! - Credential hashes are only readable through `get_credentials`.

use crate::model::user::{Role, Title, User, UserId};
use crate::repo::{decode_tag, placeholders, RepoError, RepoResult};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const USER_SELECT_SQL: &str = "SELECT
    id,
    title,
    username,
    email,
    first_name,
    last_name,
    role,
    created_at,
    last_login
FROM users";

/// Insert model carrying an already-hashed credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord<'a> {
    pub title: Title,
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
    pub password_hash: &'a str,
    pub created_at: i64,
}

pub trait UserRepository {
    fn create_user(&self, record: &UserRecord<'_>) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn get_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Returns the user and stored credential hash for login.
    fn get_credentials(&self, username: &str) -> RepoResult<Option<(User, String)>>;
    fn username_exists(&self, username: &str) -> RepoResult<bool>;
    fn email_exists(&self, email: &str) -> RepoResult<bool>;
    /// Resolves ids to existing users ordered by id; unknown ids are skipped.
    fn resolve_users(&self, ids: &BTreeSet<UserId>) -> RepoResult<Vec<User>>;
    fn list_by_role(&self, role: Role) -> RepoResult<Vec<User>>;
    fn record_login(&self, id: UserId, at: i64) -> RepoResult<()>;
}

pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, record: &UserRecord<'_>) -> RepoResult<UserId> {
        self.conn.execute(
            "INSERT INTO users (
                title,
                username,
                email,
                password_hash,
                first_name,
                last_name,
                role,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                record.title.as_str(),
                record.username,
                record.email,
                record.password_hash,
                record.first_name,
                record.last_name,
                record.role.as_str(),
                record.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let sql = format!("{USER_SELECT_SQL} WHERE id = ?1;");
        let row = self
            .conn
            .query_row(&sql, [id], |row| Ok(read_user(row)))
            .optional()?;
        row.transpose()
    }

    fn get_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!("{USER_SELECT_SQL} WHERE username = ?1;");
        let row = self
            .conn
            .query_row(&sql, [username], |row| Ok(read_user(row)))
            .optional()?;
        row.transpose()
    }

    fn get_credentials(&self, username: &str) -> RepoResult<Option<(User, String)>> {
        let user = match self.get_by_username(username)? {
            Some(user) => user,
            None => return Ok(None),
        };
        let hash: String = self.conn.query_row(
            "SELECT password_hash FROM users WHERE id = ?1;",
            [user.id],
            |row| row.get(0),
        )?;
        Ok(Some((user, hash)))
    }

    fn username_exists(&self, username: &str) -> RepoResult<bool> {
        exists(self.conn, "SELECT 1 FROM users WHERE username = ?1;", username)
    }

    fn email_exists(&self, email: &str) -> RepoResult<bool> {
        exists(self.conn, "SELECT 1 FROM users WHERE email = ?1;", email)
    }

    fn resolve_users(&self, ids: &BTreeSet<UserId>) -> RepoResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{USER_SELECT_SQL} WHERE id IN ({}) ORDER BY id ASC;",
            placeholders(ids.len())
        );
        collect_users(self.conn, &sql, params_from_iter(ids.iter()))
    }

    fn list_by_role(&self, role: Role) -> RepoResult<Vec<User>> {
        let sql = format!("{USER_SELECT_SQL} WHERE role = ?1 ORDER BY last_name ASC, id ASC;");
        collect_users(self.conn, &sql, [role.as_str()])
    }

    fn record_login(&self, id: UserId, at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET last_login = ?2 WHERE id = ?1;",
            params![id, at],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }
}

fn exists(conn: &Connection, sql: &str, value: &str) -> RepoResult<bool> {
    let found = conn
        .query_row(sql, [value], |_| Ok(()))
        .optional()?
        .is_some();
    Ok(found)
}

fn collect_users(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> RepoResult<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut users = Vec::new();
    while let Some(row) = rows.next()? {
        users.push(read_user(row)?);
    }
    Ok(users)
}

pub(crate) fn read_user(row: &Row<'_>) -> RepoResult<User> {
    let title: String = row.get("title")?;
    let role: String = row.get("role")?;
    Ok(User {
        id: row.get("id")?,
        title: decode_tag("users.title", &title, Title::parse)?,
        username: row.get("username")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        role: decode_tag("users.role", &role, Role::parse)?,
        created_at: row.get("created_at")?,
        last_login: row.get("last_login")?,
    })
}
