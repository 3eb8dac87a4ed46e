//! Meeting and attendee repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `complete_past_meetings` only touches rows still `scheduled`, so
//!   repeated or concurrent runs converge on the same final state.
//! - `replace_attendees` swaps the whole attendee set.

use crate::model::meeting::{Meeting, MeetingFields, MeetingId, MeetingStatus};
use crate::model::project::ProjectId;
use crate::model::user::UserId;
use crate::repo::{decode_tag, placeholders, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const MEETING_SELECT_SQL: &str = "SELECT
    m.id,
    m.project_id,
    m.created_by_id,
    m.title,
    m.agenda,
    m.meeting_date,
    m.duration_minutes,
    m.location,
    m.meeting_link,
    m.status,
    m.created_at
FROM meetings m";

/// Which meetings a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingScope {
    Project(ProjectId),
    /// Meetings of projects the user owns plus meetings they attend.
    VisibleTo(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingQuery {
    pub scope: MeetingScope,
    /// Empty means any status.
    pub statuses: Vec<MeetingStatus>,
    /// Inclusive lower bound on `meeting_date`.
    pub from: Option<i64>,
    /// Inclusive upper bound on `meeting_date`.
    pub until: Option<i64>,
    pub limit: Option<u32>,
}

impl MeetingQuery {
    pub fn new(scope: MeetingScope) -> Self {
        Self {
            scope,
            statuses: Vec::new(),
            from: None,
            until: None,
            limit: None,
        }
    }
}

pub trait MeetingRepository {
    fn create_meeting(
        &self,
        project_id: ProjectId,
        created_by: UserId,
        fields: &MeetingFields,
        now: i64,
    ) -> RepoResult<MeetingId>;
    fn update_meeting(&self, id: MeetingId, fields: &MeetingFields) -> RepoResult<()>;
    fn replace_attendees(&self, id: MeetingId, attendees: &BTreeSet<UserId>) -> RepoResult<()>;
    fn set_status(&self, id: MeetingId, status: MeetingStatus) -> RepoResult<()>;
    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>>;
    /// Lists meetings ordered by `meeting_date` ascending.
    fn list_meetings(&self, query: &MeetingQuery) -> RepoResult<Vec<Meeting>>;
    /// Moves every `scheduled` meeting dated before `as_of` to `completed`
    /// and returns how many rows changed.
    fn complete_past_meetings(&self, as_of: i64) -> RepoResult<usize>;
}

pub struct SqliteMeetingRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMeetingRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_attendees(&self, meeting_id: MeetingId) -> RepoResult<BTreeSet<UserId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM meeting_attendees WHERE meeting_id = ?1;")?;
        let ids = stmt
            .query_map([meeting_id], |row| row.get::<_, UserId>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids)
    }
}

impl MeetingRepository for SqliteMeetingRepository<'_> {
    fn create_meeting(
        &self,
        project_id: ProjectId,
        created_by: UserId,
        fields: &MeetingFields,
        now: i64,
    ) -> RepoResult<MeetingId> {
        self.conn.execute(
            "INSERT INTO meetings (
                project_id,
                created_by_id,
                title,
                agenda,
                meeting_date,
                duration_minutes,
                location,
                meeting_link,
                status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                project_id,
                created_by,
                fields.title,
                fields.agenda,
                fields.meeting_date,
                fields.duration_minutes,
                fields.location,
                fields.meeting_link,
                MeetingStatus::Scheduled.as_str(),
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_meeting(&self, id: MeetingId, fields: &MeetingFields) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE meetings
             SET
                title = ?2,
                agenda = ?3,
                meeting_date = ?4,
                duration_minutes = ?5,
                location = ?6,
                meeting_link = ?7
             WHERE id = ?1;",
            params![
                id,
                fields.title,
                fields.agenda,
                fields.meeting_date,
                fields.duration_minutes,
                fields.location,
                fields.meeting_link,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("meeting", id));
        }
        Ok(())
    }

    fn replace_attendees(&self, id: MeetingId, attendees: &BTreeSet<UserId>) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM meeting_attendees WHERE meeting_id = ?1;", [id])?;
        let mut insert = self
            .conn
            .prepare("INSERT INTO meeting_attendees (meeting_id, user_id) VALUES (?1, ?2);")?;
        for user_id in attendees {
            insert.execute(params![id, user_id])?;
        }
        Ok(())
    }

    fn set_status(&self, id: MeetingId, status: MeetingStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE meetings SET status = ?2 WHERE id = ?1;",
            params![id, status.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("meeting", id));
        }
        Ok(())
    }

    fn get_meeting(&self, id: MeetingId) -> RepoResult<Option<Meeting>> {
        let sql = format!("{MEETING_SELECT_SQL} WHERE m.id = ?1;");
        let found = self
            .conn
            .query_row(&sql, [id], |row| Ok(read_meeting(row)))
            .optional()?
            .transpose()?;
        match found {
            Some(mut meeting) => {
                meeting.attendee_ids = self.load_attendees(meeting.id)?;
                Ok(Some(meeting))
            }
            None => Ok(None),
        }
    }

    fn list_meetings(&self, query: &MeetingQuery) -> RepoResult<Vec<Meeting>> {
        let mut sql = String::from(MEETING_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();

        match query.scope {
            MeetingScope::Project(project_id) => {
                sql.push_str(" WHERE m.project_id = ?");
                bind_values.push(Value::Integer(project_id));
            }
            MeetingScope::VisibleTo(user_id) => {
                sql.push_str(
                    " INNER JOIN projects p ON p.id = m.project_id
                      WHERE (p.pi_id = ? OR EXISTS (
                        SELECT 1 FROM meeting_attendees ma
                        WHERE ma.meeting_id = m.id AND ma.user_id = ?
                      ))",
                );
                bind_values.push(Value::Integer(user_id));
                bind_values.push(Value::Integer(user_id));
            }
        }

        if !query.statuses.is_empty() {
            let tags = placeholders(query.statuses.len());
            sql.push_str(&format!(" AND m.status IN ({tags})"));
            for status in &query.statuses {
                bind_values.push(Value::Text(status.as_str().to_string()));
            }
        }
        if let Some(from) = query.from {
            sql.push_str(" AND m.meeting_date >= ?");
            bind_values.push(Value::Integer(from));
        }
        if let Some(until) = query.until {
            sql.push_str(" AND m.meeting_date <= ?");
            bind_values.push(Value::Integer(until));
        }

        sql.push_str(" ORDER BY m.meeting_date ASC, m.id ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut meetings = Vec::new();
        while let Some(row) = rows.next()? {
            meetings.push(read_meeting(row)?);
        }
        for meeting in &mut meetings {
            meeting.attendee_ids = self.load_attendees(meeting.id)?;
        }
        Ok(meetings)
    }

    fn complete_past_meetings(&self, as_of: i64) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE meetings
             SET status = 'completed'
             WHERE status = 'scheduled'
               AND meeting_date < ?1;",
            [as_of],
        )?;
        Ok(changed)
    }
}

fn read_meeting(row: &Row<'_>) -> RepoResult<Meeting> {
    let status: String = row.get("status")?;
    Ok(Meeting {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        created_by_id: row.get("created_by_id")?,
        title: row.get("title")?,
        agenda: row.get("agenda")?,
        meeting_date: row.get("meeting_date")?,
        duration_minutes: row.get("duration_minutes")?,
        location: row.get("location")?,
        meeting_link: row.get("meeting_link")?,
        status: decode_tag("meetings.status", &status, MeetingStatus::parse)?,
        attendee_ids: BTreeSet::new(),
        created_at: row.get("created_at")?,
    })
}
