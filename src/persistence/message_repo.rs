//! Conversation message repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::loader::{MessageStore, StoreFuture};
use crate::models::message::{DeliveryStatus, Direction, Message};
use crate::{AppError, Result};

use super::db::Database;

/// Raw conversation row as stored.
///
/// The loader converts records into [`Message`] values with
/// [`MessageRecord::into_message`].
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MessageRecord {
    /// Message identifier.
    pub id: String,
    /// Owning lead identifier.
    pub lead_id: String,
    /// Message text.
    pub body: String,
    /// `inbound` or `outbound`.
    pub direction: String,
    /// RFC 3339 send timestamp.
    pub sent_at: String,
    /// Delivery status string.
    pub status: String,
    /// Non-zero when produced by the automation.
    pub auto_generated: i64,
    /// RFC 3339 read timestamp, if read.
    pub read_at: Option<String>,
}

impl MessageRecord {
    /// Convert the raw row into the domain [`Message`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if an enum column or timestamp is malformed.
    pub fn into_message(self) -> Result<Message> {
        let direction = Direction::parse(&self.direction)
            .ok_or_else(|| AppError::Db(format!("invalid direction: {}", self.direction)))?;
        let status = DeliveryStatus::parse(&self.status)
            .ok_or_else(|| AppError::Db(format!("invalid status: {}", self.status)))?;
        let sent_at = parse_timestamp(&self.sent_at, "sent_at")?;
        let read_at = self
            .read_at
            .as_deref()
            .map(|raw| parse_timestamp(raw, "read_at"))
            .transpose()?;

        Ok(Message {
            id: self.id,
            lead_id: self.lead_id,
            body: self.body,
            direction,
            sent_at,
            status,
            auto_generated: self.auto_generated != 0,
            read_at,
        })
    }
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            lead_id: message.lead_id.clone(),
            body: message.body.clone(),
            direction: message.direction.as_str().to_owned(),
            sent_at: format_timestamp(message.sent_at),
            status: message.status.as_str().to_owned(),
            auto_generated: i64::from(message.auto_generated),
            read_at: message.read_at.map(format_timestamp),
        }
    }
}

/// Fixed-width RFC 3339 so lexical order matches chronological order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {column}: {e}")))
}

/// Repository for conversation messages.
#[derive(Clone)]
pub struct MessageRepo {
    db: Arc<Database>,
}

impl MessageRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, message: &Message) -> Result<()> {
        let record = MessageRecord::from(message);

        sqlx::query(
            "INSERT INTO conversation_message
                 (id, lead_id, body, direction, sent_at, status, auto_generated, read_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&record.id)
        .bind(&record.lead_id)
        .bind(&record.body)
        .bind(&record.direction)
        .bind(&record.sent_at)
        .bind(&record.status)
        .bind(record.auto_generated)
        .bind(&record.read_at)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Fetch every row for `lead_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch_by_lead(&self, lead_id: &str) -> Result<Vec<MessageRecord>> {
        let rows = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, lead_id, body, direction, sent_at, status, auto_generated, read_at
             FROM conversation_message
             WHERE lead_id = ?1
             ORDER BY sent_at ASC, id ASC",
        )
        .bind(lead_id)
        .fetch_all(self.db.as_ref())
        .await?;
        Ok(rows)
    }

    /// Stamp `read_at` on the given messages that are still unread.
    ///
    /// Already-read rows keep their original timestamp. Returns the number
    /// of rows updated.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if an update fails.
    pub async fn mark_ids_read(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = format_timestamp(Utc::now());
        let mut tx = self.db.begin().await?;
        let mut updated = 0;
        for id in ids {
            let result = sqlx::query(
                "UPDATE conversation_message SET read_at = ?1
                 WHERE id = ?2 AND read_at IS NULL",
            )
            .bind(&now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;
        Ok(updated)
    }

    /// Count inbound messages for `lead_id` that have not been read.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_unread(&self, lead_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversation_message
             WHERE lead_id = ?1 AND direction = 'inbound' AND read_at IS NULL",
        )
        .bind(lead_id)
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(count)
    }
}

impl MessageStore for MessageRepo {
    fn fetch_messages(&self, lead_id: &str) -> StoreFuture<'_, Vec<MessageRecord>> {
        let lead_id = lead_id.to_owned();
        Box::pin(async move { self.fetch_by_lead(&lead_id).await })
    }

    fn mark_read(&self, ids: Vec<String>) -> StoreFuture<'_, u64> {
        Box::pin(async move { self.mark_ids_read(&ids).await })
    }

    fn append(&self, message: Message) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.insert(&message).await })
    }
}
