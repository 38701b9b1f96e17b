//! SQLite message repository implementation.
//!
//! `(session_id, message_id)` is UNIQUE in the schema; an insert hitting
//! the constraint surfaces as `RepositoryError::Conflict`, which the
//! ingestion pipeline treats as "already exists".

use sqlx::Row;
use zaplink_core::repository::MessageRepository;
use zaplink_types::error::RepositoryError;
use zaplink_types::message::{Message, MessageKind, MessageStatus};
use zaplink_types::session::SessionId;

use super::map_insert_error;
use super::pool::DatabasePool;
use super::session::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `MessageRepository`.
#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain Message.
struct MessageRow {
    session_id: String,
    message_id: String,
    remote_jid: String,
    from_me: i64,
    participant: Option<String>,
    push_name: Option<String>,
    timestamp: i64,
    kind: String,
    content: Option<String>,
    media_url: Option<String>,
    status: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            message_id: row.try_get("message_id")?,
            remote_jid: row.try_get("remote_jid")?,
            from_me: row.try_get("from_me")?,
            participant: row.try_get("participant")?,
            push_name: row.try_get("push_name")?,
            timestamp: row.try_get("timestamp")?,
            kind: row.try_get("kind")?,
            content: row.try_get("content")?,
            media_url: row.try_get("media_url")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let session_id: SessionId = self
            .session_id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid session_id: {e}")))?;
        let kind: MessageKind = self
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let status: MessageStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(Message {
            session_id,
            message_id: self.message_id,
            remote_jid: self.remote_jid,
            from_me: self.from_me != 0,
            participant: self.participant,
            push_name: self.push_name,
            timestamp: self.timestamp,
            kind,
            content: self.content,
            media_url: self.media_url,
            status,
            created_at,
        })
    }
}

impl MessageRepository for SqliteMessageRepository {
    async fn insert(&self, message: &Message) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO messages (session_id, message_id, remote_jid, from_me, participant, push_name, timestamp, kind, content, media_url, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.session_id.to_string())
        .bind(&message.message_id)
        .bind(&message.remote_jid)
        .bind(message.from_me as i64)
        .bind(&message.participant)
        .bind(&message.push_name)
        .bind(message.timestamp)
        .bind(message.kind.to_string())
        .bind(&message.content)
        .bind(&message.media_url)
        .bind(message.status.to_string())
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_insert_error(e, "messages.session_id_message_id"))?;

        Ok(())
    }

    async fn get(
        &self,
        session_id: &SessionId,
        message_id: &str,
    ) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE session_id = ? AND message_id = ?")
            .bind(session_id.to_string())
            .bind(message_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let message_row =
                    MessageRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(message_row.into_message()?))
            }
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        session_id: &SessionId,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE messages SET status = ? WHERE session_id = ? AND message_id = ?")
                .bind(status.to_string())
                .bind(session_id.to_string())
                .bind(message_id)
                .execute(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn history(
        &self,
        session_id: &SessionId,
        remote_jid: &str,
        limit: i64,
        before_timestamp: Option<i64>,
    ) -> Result<Vec<Message>, RepositoryError> {
        // Take the newest `limit` rows of the window, then flip to ascending.
        let rows = match before_timestamp {
            Some(before) => {
                sqlx::query(
                    r#"SELECT * FROM messages
                       WHERE session_id = ? AND remote_jid = ? AND timestamp < ?
                       ORDER BY timestamp DESC LIMIT ?"#,
                )
                .bind(session_id.to_string())
                .bind(remote_jid)
                .bind(before)
                .bind(limit)
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(
                    r#"SELECT * FROM messages
                       WHERE session_id = ? AND remote_jid = ?
                       ORDER BY timestamp DESC LIMIT ?"#,
                )
                .bind(session_id.to_string())
                .bind(remote_jid)
                .bind(limit)
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }
        messages.reverse();

        Ok(messages)
    }

    async fn delete_for_session(&self, session_id: &SessionId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn count_for_session(&self, session_id: &SessionId) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM messages WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count as u64)
    }
}
