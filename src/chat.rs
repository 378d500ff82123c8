//! Chat bridge client: message history and the live update feed.
//!
//! The bridge is a small HTTP gateway in front of the chat platform; the
//! platform session itself is provisioned out of band. Two endpoints are
//! consumed here: `/messages` for paging backward through history and
//! `/updates` for long-polling new events. History is exposed through the
//! [`ChatHistory`] trait so the backfill scanner can run against a fake.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::models::SourceMessage;

/// A message as the bridge serializes it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    #[serde(default)]
    pub text: String,
    /// Unix seconds.
    pub date: i64,
}

impl WireMessage {
    pub fn into_message(self) -> SourceMessage {
        SourceMessage {
            id: self.id,
            chat_id: self.chat_id,
            author_id: self.sender_id,
            text: self.text,
            date: DateTime::from_timestamp(self.date, 0).unwrap_or(DateTime::UNIX_EPOCH),
        }
    }
}

/// One entry from the long-poll feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    updates: Vec<Update>,
}

/// Paged access to the conversation's history, newest first.
#[async_trait]
pub trait ChatHistory: Send + Sync {
    /// Up to `limit` messages strictly older than `before_id`
    /// (`before_id = 0` means "start from the most recent"). An empty
    /// page signals exhaustion.
    async fn messages_before(
        &self,
        before_id: i64,
        limit: usize,
    ) -> Result<Vec<SourceMessage>, ChatError>;
}

#[derive(Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    chat_id: i64,
}

impl BridgeClient {
    pub fn new(config: &ChatConfig, token: Option<String>) -> Result<Self, ChatError> {
        // The request timeout must outlast the long-poll hold.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token,
            chat_id: config.chat_id,
        })
    }

    /// Long-poll for updates past `offset`; returns when the bridge has
    /// events or its hold timer expires.
    pub async fn poll_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ChatError> {
        let json = self
            .get_json(
                "/updates",
                &[
                    ("offset", offset.to_string()),
                    ("timeout", timeout_secs.to_string()),
                ],
            )
            .await?;

        let parsed: UpdatesResponse = serde_json::from_value(json)
            .map_err(|e| ChatError::Malformed(format!("updates payload: {}", e)))?;

        Ok(parsed.updates)
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ChatError> {
        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ChatHistory for BridgeClient {
    async fn messages_before(
        &self,
        before_id: i64,
        limit: usize,
    ) -> Result<Vec<SourceMessage>, ChatError> {
        let json = self
            .get_json(
                "/messages",
                &[
                    ("chat_id", self.chat_id.to_string()),
                    ("limit", limit.to_string()),
                    ("offset_id", before_id.to_string()),
                ],
            )
            .await?;

        let parsed: MessagesResponse = serde_json::from_value(json)
            .map_err(|e| ChatError::Malformed(format!("messages payload: {}", e)))?;

        Ok(parsed
            .messages
            .into_iter()
            .map(WireMessage::into_message)
            .collect())
    }
}
