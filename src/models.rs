//! Core data types that flow through the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message as observed from the monitored conversation.
///
/// Produced by the backfill scanner or the live listener, consumed
/// immediately by the pipeline, never mutated. The source-assigned `id`
/// is the natural idempotency key.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub id: i64,
    pub chat_id: i64,
    pub author_id: i64,
    pub text: String,
    pub date: DateTime<Utc>,
}

/// Durable row recording a message's processing outcome.
///
/// At most one record exists per `message_id`. `wiki_page` is set exactly
/// when `processed` is true, and once a record is processed the pipeline
/// never reverts it.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct IngestionRecord {
    pub message_id: i64,
    pub chat_id: i64,
    pub author_id: i64,
    pub text: String,
    pub date: i64,
    pub processed: bool,
    pub wiki_page: Option<String>,
    pub analysis_json: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Structured output of the analysis gateway.
///
/// Every field is optional on the wire; a missing `title` makes the
/// pipeline synthesize one from the message id. Persisted only as an
/// opaque JSON blob for audit, never re-parsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// How a page write treats existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Concatenate after the existing body; degrades to creation when the
    /// page does not exist yet.
    Append,
    /// Replace the page body unconditionally.
    Overwrite,
}

/// The rendered content submitted to the wiki for one message.
#[derive(Debug, Clone)]
pub struct PageEdit {
    pub title: String,
    pub body: String,
    pub mode: EditMode,
    /// Category links attached on page creation.
    pub categories: Vec<String>,
}
