//! Durable per-message processing state.
//!
//! One SQLite row per observed message, keyed by the source-assigned
//! message id. This table is the sole authority on "has this message been
//! published": both the backfill scanner and the live listener funnel
//! through [`Ledger::upsert_if_absent`], whose conflict-ignoring insert is
//! what makes concurrent delivery of the same id safe.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::LedgerError;
use crate::models::{IngestionRecord, SourceMessage};

#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

/// Totals for the `status` command.
#[derive(Debug, Clone, Copy)]
pub struct LedgerCounts {
    pub total: i64,
    pub published: i64,
    pub pending: i64,
    pub last_updated_at: Option<i64>,
}

impl Ledger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Return the existing record for this message id, creating an
    /// unprocessed one if none exists yet.
    ///
    /// The insert ignores conflicts on the primary key, so concurrent
    /// calls for the same id produce exactly one row; every caller then
    /// reads back whichever row won.
    pub async fn upsert_if_absent(
        &self,
        msg: &SourceMessage,
    ) -> Result<IngestionRecord, LedgerError> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO messages (message_id, chat_id, author_id, text, date, processed, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            ON CONFLICT(message_id) DO NOTHING
            "#,
        )
        .bind(msg.id)
        .bind(msg.chat_id)
        .bind(msg.author_id)
        .bind(&msg.text)
        .bind(msg.date.timestamp())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM messages WHERE message_id = ?")
            .bind(msg.id)
            .fetch_one(&self.pool)
            .await?;

        Ok(record_from_row(&row))
    }

    #[allow(dead_code)]
    pub async fn is_processed(&self, message_id: i64) -> Result<bool, LedgerError> {
        let processed: Option<bool> =
            sqlx::query_scalar("SELECT processed FROM messages WHERE message_id = ?")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(processed.unwrap_or(false))
    }

    /// All message ids already published, for cheap in-memory page skips
    /// during backfill.
    pub async fn processed_ids(&self) -> Result<HashSet<i64>, LedgerError> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT message_id FROM messages WHERE processed = 1")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().collect())
    }

    /// Attach the raw analysis payload to a record for audit.
    pub async fn record_analysis(
        &self,
        message_id: i64,
        analysis: &serde_json::Value,
    ) -> Result<(), LedgerError> {
        sqlx::query("UPDATE messages SET analysis_json = ?, updated_at = ? WHERE message_id = ?")
            .bind(analysis.to_string())
            .bind(Utc::now().timestamp())
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Mark a record as published under `page_title`.
    ///
    /// Returns false without touching anything when the record is missing
    /// or already carries a different title. Repeating the call with the
    /// same title is a no-op that still reports true.
    pub async fn mark_processed(
        &self,
        message_id: i64,
        page_title: &str,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET processed = 1, wiki_page = ?, updated_at = ?
            WHERE message_id = ? AND (processed = 0 OR wiki_page = ?)
            "#,
        )
        .bind(page_title)
        .bind(Utc::now().timestamp())
        .bind(message_id)
        .bind(page_title)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[allow(dead_code)]
    pub async fn get(&self, message_id: i64) -> Result<Option<IngestionRecord>, LedgerError> {
        let row = sqlx::query("SELECT * FROM messages WHERE message_id = ?")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    pub async fn counts(&self) -> Result<LedgerCounts, LedgerError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        let published: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE processed = 1")
                .fetch_one(&self.pool)
                .await?;
        let last_updated_at: Option<i64> =
            sqlx::query_scalar("SELECT MAX(updated_at) FROM messages")
                .fetch_one(&self.pool)
                .await?;

        Ok(LedgerCounts {
            total,
            published,
            pending: total - published,
            last_updated_at,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &SqliteRow) -> IngestionRecord {
    IngestionRecord {
        message_id: row.get("message_id"),
        chat_id: row.get("chat_id"),
        author_id: row.get("author_id"),
        text: row.get("text"),
        date: row.get("date"),
        processed: row.get("processed"),
        wiki_page: row.get("wiki_page"),
        analysis_json: row.get("analysis_json"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
