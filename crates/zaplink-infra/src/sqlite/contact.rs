//! SQLite contact repository implementation.
//!
//! `(session_id, jid)` is UNIQUE. Both write paths are read-modify-write
//! against the single-connection writer pool: provider updates overwrite
//! the fields they carry, interaction recording bumps `last_interaction`
//! monotonically and fills a missing push name. An insert losing a race to
//! the unique constraint falls back to the update path.

use chrono::{DateTime, Utc};
use sqlx::Row;
use zaplink_core::repository::ContactRepository;
use zaplink_types::contact::Contact;
use zaplink_types::error::RepositoryError;
use zaplink_types::provider::ContactFields;
use zaplink_types::session::SessionId;

use super::map_insert_error;
use super::pool::DatabasePool;
use super::session::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `ContactRepository`.
#[derive(Clone)]
pub struct SqliteContactRepository {
    pool: DatabasePool,
}

impl SqliteContactRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn insert(&self, contact: &Contact) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO contacts (session_id, jid, name, push_name, phone_number, is_group, is_blocked, last_interaction, profile_picture_url, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(contact.session_id.to_string())
        .bind(&contact.jid)
        .bind(&contact.name)
        .bind(&contact.push_name)
        .bind(&contact.phone_number)
        .bind(contact.is_group as i64)
        .bind(contact.is_blocked as i64)
        .bind(contact.last_interaction.as_ref().map(format_datetime))
        .bind(&contact.profile_picture_url)
        .bind(&contact.status)
        .bind(format_datetime(&contact.created_at))
        .bind(format_datetime(&contact.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_insert_error(e, "contacts.session_id_jid"))?;

        Ok(())
    }

    async fn write_back(&self, contact: &Contact) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE contacts
               SET name = ?, push_name = ?, is_blocked = ?, last_interaction = ?,
                   profile_picture_url = ?, status = ?, updated_at = ?
               WHERE session_id = ? AND jid = ?"#,
        )
        .bind(&contact.name)
        .bind(&contact.push_name)
        .bind(contact.is_blocked as i64)
        .bind(contact.last_interaction.as_ref().map(format_datetime))
        .bind(&contact.profile_picture_url)
        .bind(&contact.status)
        .bind(format_datetime(&contact.updated_at))
        .bind(contact.session_id.to_string())
        .bind(&contact.jid)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Insert a fresh contact, falling back to update when another writer
    /// created it first.
    async fn insert_or_write_back(&self, contact: &Contact) -> Result<(), RepositoryError> {
        match self.insert(contact).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::Conflict(_)) => self.write_back(contact).await,
            Err(e) => Err(e),
        }
    }
}

/// Internal row type for mapping SQLite rows to domain Contact.
struct ContactRow {
    session_id: String,
    jid: String,
    name: Option<String>,
    push_name: Option<String>,
    phone_number: Option<String>,
    is_group: i64,
    is_blocked: i64,
    last_interaction: Option<String>,
    profile_picture_url: Option<String>,
    status: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ContactRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            jid: row.try_get("jid")?,
            name: row.try_get("name")?,
            push_name: row.try_get("push_name")?,
            phone_number: row.try_get("phone_number")?,
            is_group: row.try_get("is_group")?,
            is_blocked: row.try_get("is_blocked")?,
            last_interaction: row.try_get("last_interaction")?,
            profile_picture_url: row.try_get("profile_picture_url")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_contact(self) -> Result<Contact, RepositoryError> {
        let session_id: SessionId = self
            .session_id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid session_id: {e}")))?;
        let last_interaction = self
            .last_interaction
            .as_deref()
            .map(parse_datetime)
            .transpose()?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;

        Ok(Contact {
            session_id,
            jid: self.jid,
            name: self.name,
            push_name: self.push_name,
            phone_number: self.phone_number,
            is_group: self.is_group != 0,
            is_blocked: self.is_blocked != 0,
            last_interaction,
            profile_picture_url: self.profile_picture_url,
            status: self.status,
            created_at,
            updated_at,
        })
    }
}

impl ContactRepository for SqliteContactRepository {
    async fn upsert_fields(
        &self,
        session_id: &SessionId,
        fields: &ContactFields,
    ) -> Result<Contact, RepositoryError> {
        let mut contact = self
            .get(session_id, &fields.jid)
            .await?
            .unwrap_or_else(|| Contact::new(session_id.clone(), fields.jid.clone()));

        if let Some(name) = &fields.name {
            contact.name = Some(name.clone());
        }
        if let Some(push_name) = &fields.push_name {
            contact.push_name = Some(push_name.clone());
        }
        if let Some(status) = &fields.status {
            contact.status = Some(status.clone());
        }
        if let Some(url) = &fields.profile_picture_url {
            contact.profile_picture_url = Some(url.clone());
        }
        contact.updated_at = Utc::now();

        self.insert_or_write_back(&contact).await?;
        Ok(contact)
    }

    async fn record_interaction(
        &self,
        session_id: &SessionId,
        jid: &str,
        push_name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut contact = self
            .get(session_id, jid)
            .await?
            .unwrap_or_else(|| Contact::new(session_id.clone(), jid));

        if contact.push_name.is_none() {
            contact.push_name = push_name.map(str::to_string);
        }
        contact.touch(at);

        self.insert_or_write_back(&contact).await
    }

    async fn get(
        &self,
        session_id: &SessionId,
        jid: &str,
    ) -> Result<Option<Contact>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM contacts WHERE session_id = ? AND jid = ?")
            .bind(session_id.to_string())
            .bind(jid)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let contact_row =
                    ContactRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(contact_row.into_contact()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, session_id: &SessionId) -> Result<Vec<Contact>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM contacts WHERE session_id = ? ORDER BY last_interaction DESC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut contacts = Vec::with_capacity(rows.len());
        for row in &rows {
            let contact_row =
                ContactRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            contacts.push(contact_row.into_contact()?);
        }

        Ok(contacts)
    }

    async fn delete_for_session(&self, session_id: &SessionId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM contacts WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::session::SqliteSessionRepository;
    use chrono::Duration;
    use zaplink_core::repository::SessionRepository;
    use zaplink_types::session::Session;

    const JID: &str = "5511999998888@s.whatsapp.net";

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn seeded_session(pool: &DatabasePool) -> SessionId {
        let sessions = SqliteSessionRepository::new(pool.clone());
        let session = Session::new("u1", "personal");
        sessions.create(&session).await.unwrap();
        session.id
    }

    #[tokio::test]
    async fn test_upsert_creates_with_derived_fields() {
        let pool = test_pool().await;
        let session_id = seeded_session(&pool).await;
        let repo = SqliteContactRepository::new(pool);

        let contact = repo
            .upsert_fields(
                &session_id,
                &ContactFields {
                    jid: JID.to_string(),
                    name: Some("Ana Silva".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(contact.phone_number.as_deref(), Some("5511999998888"));
        assert!(!contact.is_group);

        let found = repo.get(&session_id, JID).await.unwrap().unwrap();
        assert_eq!(found.name.as_deref(), Some("Ana Silva"));
    }

    #[tokio::test]
    async fn test_upsert_leaves_absent_fields_unchanged() {
        let pool = test_pool().await;
        let session_id = seeded_session(&pool).await;
        let repo = SqliteContactRepository::new(pool);

        repo.upsert_fields(
            &session_id,
            &ContactFields {
                jid: JID.to_string(),
                name: Some("Ana Silva".to_string()),
                status: Some("at work".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        // Second update carries only a push name.
        repo.upsert_fields(
            &session_id,
            &ContactFields {
                jid: JID.to_string(),
                push_name: Some("Ana".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let found = repo.get(&session_id, JID).await.unwrap().unwrap();
        assert_eq!(found.name.as_deref(), Some("Ana Silva"));
        assert_eq!(found.status.as_deref(), Some("at work"));
        assert_eq!(found.push_name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn test_record_interaction_is_monotonic() {
        let pool = test_pool().await;
        let session_id = seeded_session(&pool).await;
        let repo = SqliteContactRepository::new(pool);

        let now = Utc::now();
        repo.record_interaction(&session_id, JID, Some("Ana"), now)
            .await
            .unwrap();

        // An older interaction must not move the marker back.
        repo.record_interaction(&session_id, JID, None, now - Duration::hours(1))
            .await
            .unwrap();

        let found = repo.get(&session_id, JID).await.unwrap().unwrap();
        let stored = found.last_interaction.unwrap();
        assert!((stored - now).num_seconds().abs() < 2);
    }

    #[tokio::test]
    async fn test_record_interaction_fills_missing_push_name_only() {
        let pool = test_pool().await;
        let session_id = seeded_session(&pool).await;
        let repo = SqliteContactRepository::new(pool);

        repo.record_interaction(&session_id, JID, Some("Ana"), Utc::now())
            .await
            .unwrap();
        repo.record_interaction(&session_id, JID, Some("Other"), Utc::now())
            .await
            .unwrap();

        let found = repo.get(&session_id, JID).await.unwrap().unwrap();
        assert_eq!(found.push_name.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn test_list_orders_by_recency() {
        let pool = test_pool().await;
        let session_id = seeded_session(&pool).await;
        let repo = SqliteContactRepository::new(pool);

        let now = Utc::now();
        repo.record_interaction(&session_id, "old@s.whatsapp.net", None, now - Duration::hours(2))
            .await
            .unwrap();
        repo.record_interaction(&session_id, "new@s.whatsapp.net", None, now)
            .await
            .unwrap();

        let contacts = repo.list(&session_id).await.unwrap();
        let jids: Vec<&str> = contacts.iter().map(|c| c.jid.as_str()).collect();
        assert_eq!(jids, ["new@s.whatsapp.net", "old@s.whatsapp.net"]);
    }

    #[tokio::test]
    async fn test_group_jid_detection() {
        let pool = test_pool().await;
        let session_id = seeded_session(&pool).await;
        let repo = SqliteContactRepository::new(pool);

        let contact = repo
            .upsert_fields(
                &session_id,
                &ContactFields { jid: "123456-7890@g.us".to_string(), ..Default::default() },
            )
            .await
            .unwrap();
        assert!(contact.is_group);
    }

    #[tokio::test]
    async fn test_delete_for_session() {
        let pool = test_pool().await;
        let session_id = seeded_session(&pool).await;
        let other = seeded_session(&pool).await;
        let repo = SqliteContactRepository::new(pool);

        repo.record_interaction(&session_id, JID, None, Utc::now())
            .await
            .unwrap();
        repo.record_interaction(&other, JID, None, Utc::now())
            .await
            .unwrap();

        let removed = repo.delete_for_session(&session_id).await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.list(&session_id).await.unwrap().is_empty());
        assert_eq!(repo.list(&other).await.unwrap().len(), 1);
    }
}
