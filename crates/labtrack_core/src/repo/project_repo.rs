//! Project and roster repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `project_key` lookups are exact and case-sensitive.
//! - `replace_team_members` swaps the whole roster; the caller supplies the
//!   already-resolved member set.
//! - Deleting a project relies on `ON DELETE CASCADE` for tasks, meetings,
//!   comments, rosters and notifications.

use crate::model::project::{Project, ProjectFields, ProjectId, ProjectStatus};
use crate::model::user::UserId;
use crate::repo::{decode_tag, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const PROJECT_SELECT_SQL: &str = "SELECT
    p.id,
    p.project_key,
    p.title,
    p.description,
    p.start_date,
    p.end_date,
    p.status,
    p.funding_source,
    p.funding_amount,
    p.pi_id,
    p.created_at,
    p.updated_at
FROM projects p";

pub trait ProjectRepository {
    fn create_project(&self, pi_id: UserId, fields: &ProjectFields, now: i64)
        -> RepoResult<ProjectId>;
    fn update_project(&self, id: ProjectId, fields: &ProjectFields, now: i64) -> RepoResult<()>;
    fn replace_team_members(&self, id: ProjectId, members: &BTreeSet<UserId>) -> RepoResult<()>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    /// Whether `project_key` is used by a project other than `excluding`.
    fn project_key_taken(&self, project_key: &str, excluding: Option<ProjectId>)
        -> RepoResult<bool>;
    fn list_owned_by(&self, pi_id: UserId) -> RepoResult<Vec<Project>>;
    fn list_for_member(&self, user_id: UserId) -> RepoResult<Vec<Project>>;
    fn delete_project(&self, id: ProjectId) -> RepoResult<()>;
}

pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_team(&self, project_id: ProjectId) -> RepoResult<BTreeSet<UserId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM project_members WHERE project_id = ?1;")?;
        let ids = stmt
            .query_map([project_id], |row| row.get::<_, UserId>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids)
    }

    fn collect(&self, sql: &str, param: i64) -> RepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([param])?;
        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(read_project(row)?);
        }
        for project in &mut projects {
            project.team_member_ids = self.load_team(project.id)?;
        }
        Ok(projects)
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(
        &self,
        pi_id: UserId,
        fields: &ProjectFields,
        now: i64,
    ) -> RepoResult<ProjectId> {
        self.conn.execute(
            "INSERT INTO projects (
                project_key,
                title,
                description,
                start_date,
                end_date,
                status,
                funding_source,
                funding_amount,
                pi_id,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10);",
            params![
                fields.project_key,
                fields.title,
                fields.description,
                fields.start_date,
                fields.end_date,
                fields.status.as_str(),
                fields.funding_source,
                fields.funding_amount,
                pi_id,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_project(&self, id: ProjectId, fields: &ProjectFields, now: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE projects
             SET
                project_key = ?2,
                title = ?3,
                description = ?4,
                start_date = ?5,
                end_date = ?6,
                status = ?7,
                funding_source = ?8,
                funding_amount = ?9,
                updated_at = ?10
             WHERE id = ?1;",
            params![
                id,
                fields.project_key,
                fields.title,
                fields.description,
                fields.start_date,
                fields.end_date,
                fields.status.as_str(),
                fields.funding_source,
                fields.funding_amount,
                now,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        Ok(())
    }

    fn replace_team_members(&self, id: ProjectId, members: &BTreeSet<UserId>) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM project_members WHERE project_id = ?1;", [id])?;
        let mut insert = self
            .conn
            .prepare("INSERT INTO project_members (project_id, user_id) VALUES (?1, ?2);")?;
        for user_id in members {
            insert.execute(params![id, user_id])?;
        }
        Ok(())
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let sql = format!("{PROJECT_SELECT_SQL} WHERE p.id = ?1;");
        let found = self
            .conn
            .query_row(&sql, [id], |row| Ok(read_project(row)))
            .optional()?
            .transpose()?;
        match found {
            Some(mut project) => {
                project.team_member_ids = self.load_team(project.id)?;
                Ok(Some(project))
            }
            None => Ok(None),
        }
    }

    fn project_key_taken(
        &self,
        project_key: &str,
        excluding: Option<ProjectId>,
    ) -> RepoResult<bool> {
        let taken = self
            .conn
            .query_row(
                "SELECT 1 FROM projects
                 WHERE project_key = ?1 COLLATE BINARY
                   AND (?2 IS NULL OR id != ?2);",
                params![project_key, excluding],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(taken)
    }

    fn list_owned_by(&self, pi_id: UserId) -> RepoResult<Vec<Project>> {
        let sql = format!("{PROJECT_SELECT_SQL} WHERE p.pi_id = ?1 ORDER BY p.created_at DESC, p.id DESC;");
        self.collect(&sql, pi_id)
    }

    fn list_for_member(&self, user_id: UserId) -> RepoResult<Vec<Project>> {
        let sql = format!(
            "{PROJECT_SELECT_SQL}
             INNER JOIN project_members pm ON pm.project_id = p.id
             WHERE pm.user_id = ?1
             ORDER BY p.created_at DESC, p.id DESC;"
        );
        self.collect(&sql, user_id)
    }

    fn delete_project(&self, id: ProjectId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM projects WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("project", id));
        }
        Ok(())
    }
}

fn read_project(row: &Row<'_>) -> RepoResult<Project> {
    let status: String = row.get("status")?;
    Ok(Project {
        id: row.get("id")?,
        project_key: row.get("project_key")?,
        title: row.get("title")?,
        description: row.get("description")?,
        start_date: row.get("start_date")?,
        end_date: row.get("end_date")?,
        status: decode_tag("projects.status", &status, ProjectStatus::parse)?,
        funding_source: row.get("funding_source")?,
        funding_amount: row.get("funding_amount")?,
        pi_id: row.get("pi_id")?,
        team_member_ids: BTreeSet::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
