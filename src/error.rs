//! Typed errors for each collaborator boundary.
//!
//! Each external system gets its own enum so callers can tell a skippable
//! per-message failure from a fatal setup failure. The binary layer wraps
//! these in `anyhow` where a failure simply aborts the command.

use std::path::PathBuf;

/// Durable-store failure. Fatal during startup and migration, logged and
/// skipped per message in steady state.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("failed to create database directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Analysis gateway failure. The record stays unprocessed, so re-running a
/// backfill retries the message.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("refusing to analyze empty text")]
    EmptyText,

    #[error("analysis request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analysis service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model '{model}' not available on the analysis server")]
    ModelMissing { model: String },

    #[error("no JSON object in analysis response: {raw}")]
    NoJson { raw: String },

    #[error("analysis response is not valid JSON: {source}")]
    Parse {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed analysis payload: {0}")]
    Malformed(String),
}

/// Document-store failure. The record stays unprocessed, retryable.
#[derive(Debug, thiserror::Error)]
pub enum PublicationError {
    #[error("wiki request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("wiki returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("wiki API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("wiki login failed: {0}")]
    Login(String),

    #[error("malformed wiki response: {0}")]
    Malformed(String),
}

/// Chat bridge failure. Producers back off and continue; a single bad
/// response never crashes the process.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat bridge returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed chat bridge response: {0}")]
    Malformed(String),
}
