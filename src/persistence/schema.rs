//! `SQLite` schema bootstrap logic.
//!
//! All definitions use `IF NOT EXISTS` and are safe to re-run on every
//! startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply the conversation table and its indexes.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS conversation_message (
    id              TEXT PRIMARY KEY NOT NULL,
    lead_id         TEXT NOT NULL,
    body            TEXT NOT NULL,
    direction       TEXT NOT NULL CHECK(direction IN ('inbound','outbound')),
    sent_at         TEXT NOT NULL,
    status          TEXT NOT NULL CHECK(status IN ('pending','sent','delivered','failed','received')),
    auto_generated  INTEGER NOT NULL DEFAULT 0,
    read_at         TEXT
);

CREATE INDEX IF NOT EXISTS idx_conversation_message_lead_sent
    ON conversation_message (lead_id, sent_at);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
