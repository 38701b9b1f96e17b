//! SQLite session repository implementation.
//!
//! Implements `SessionRepository` from `zaplink-core` using sqlx with split
//! read/write pools: raw queries, a private Row struct, reader for SELECTs
//! and writer for mutations.

use chrono::{DateTime, Utc};
use sqlx::Row;
use zaplink_core::repository::SessionRepository;
use zaplink_types::error::RepositoryError;
use zaplink_types::session::{Session, SessionId, SessionState};

use super::map_insert_error;
use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionRepository`.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain Session.
struct SessionRow {
    id: String,
    owner_id: String,
    name: String,
    state: String,
    phone_number: Option<String>,
    pending_artifact: Option<String>,
    created_at: String,
    last_connection_at: Option<String>,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
            state: row.try_get("state")?,
            phone_number: row.try_get("phone_number")?,
            pending_artifact: row.try_get("pending_artifact")?,
            created_at: row.try_get("created_at")?,
            last_connection_at: row.try_get("last_connection_at")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        let id: SessionId = self
            .id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid session id: {e}")))?;
        let state: SessionState = self
            .state
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;
        let last_connection_at = self
            .last_connection_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(Session {
            id,
            owner_id: self.owner_id,
            name: self.name,
            state,
            phone_number: self.phone_number,
            pending_artifact: self.pending_artifact,
            created_at,
            last_connection_at,
        })
    }
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: &Session) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO sessions (id, owner_id, name, state, phone_number, pending_artifact, created_at, last_connection_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(&session.owner_id)
        .bind(&session.name)
        .bind(session.state.to_string())
        .bind(&session.phone_number)
        .bind(&session.pending_artifact)
        .bind(format_datetime(&session.created_at))
        .bind(session.last_connection_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_insert_error(e, "sessions.id"))?;

        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row =
                    SessionRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, session: &Session) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE sessions
               SET name = ?, state = ?, phone_number = ?, pending_artifact = ?, last_connection_at = ?
               WHERE id = ?"#,
        )
        .bind(&session.name)
        .bind(session.state.to_string())
        .bind(&session.phone_number)
        .bind(&session.pending_artifact)
        .bind(session.last_connection_at.as_ref().map(format_datetime))
        .bind(session.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<Session>, RepositoryError> {
        let rows = match owner_id {
            Some(owner) => {
                sqlx::query("SELECT * FROM sessions WHERE owner_id = ? ORDER BY created_at DESC")
                    .bind(owner)
                    .fetch_all(&self.pool.reader)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM sessions ORDER BY created_at DESC")
                    .fetch_all(&self.pool.reader)
                    .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            let session_row =
                SessionRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            sessions.push(session_row.into_session()?);
        }

        Ok(sessions)
    }

    async fn count_for_owner(&self, owner_id: &str) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM sessions WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count as u64)
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
