//! # Wikiscribe
//!
//! Watches a single chat conversation, runs every message through a local
//! LLM for a title/summary/categories analysis, and publishes the result
//! to a MediaWiki knowledge base, publishing each message at most once.
//!
//! Two producers feed one serialized consumer:
//!
//! ```text
//! ┌───────────────┐                  ┌─────────────┐
//! │ Live listener  │──▶ queue ──┐    │   Ollama    │
//! └───────────────┘            ▼    └──────▲──────┘
//! ┌───────────────┐      ┌──────────┐      │analyze
//! │ Backfill scan  │─────▶│ Pipeline │──────┘
//! └───────────────┘      └────┬─────┘──────────▶ MediaWiki
//!                             │
//!                             ▼
//!                        ┌──────────┐
//!                        │  SQLite   │  (per-message ledger)
//!                        └──────────┘
//! ```
//!
//! The SQLite ledger is the idempotency authority: a message observed by
//! both producers, or re-seen after a restart, is published exactly once
//! as long as the completion mark landed. Publication and the completion
//! mark are not transactional, so a crash between the two re-publishes
//! that one message on the next backfill (at-least-once, never silent
//! loss).
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`ledger`] | Durable per-message processing state |
//! | [`analysis`] | LLM analysis gateway |
//! | [`wiki`] | MediaWiki Action API client |
//! | [`chat`] | Chat bridge client (history + updates) |
//! | [`backfill`] | Historical page scanner |
//! | [`listener`] | Live update listener |
//! | [`pipeline`] | Per-message orchestration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analysis;
pub mod backfill;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod listener;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod status;
pub mod wiki;
