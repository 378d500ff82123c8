//! Analysis gateway for an Ollama-compatible text-analysis service.
//!
//! Sends message text to `/api/generate` and pulls a structured
//! title/summary/categories/tags object out of the model's free-form
//! reply. Models rarely return bare JSON, so the gateway scans for the
//! outermost braces and strips code fences before parsing; that heuristic
//! lives entirely behind this module so a stricter contract can replace
//! it without touching the pipeline.
//!
//! The gateway never retries. A failed message stays unprocessed in the
//! ledger and is picked up again by the next backfill pass.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::models::Analysis;

/// Anything that can turn message text into an [`Analysis`].
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Analysis, AnalysisError>;
}

pub struct AnalysisClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl AnalysisClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Startup probe: verify the service is reachable and the configured
    /// model is present in its tag list.
    pub async fn check(&self) -> Result<(), AnalysisError> {
        let resp = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = resp.json().await?;
        let models = json
            .get("models")
            .and_then(|m| m.as_array())
            .ok_or_else(|| AnalysisError::Malformed("missing models array".to_string()))?;

        let found = models
            .iter()
            .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
            .any(|name| name == self.model);

        if !found {
            return Err(AnalysisError::ModelMissing {
                model: self.model.clone(),
            });
        }

        Ok(())
    }

    fn prompt_for(text: &str) -> String {
        format!(
            r#"Analyze the following text and return the result as JSON:
{{
    "title": "Short title (five words or fewer)",
    "summary": "Brief description (one or two sentences)",
    "categories": ["category1", "category2"],
    "tags": ["tag1", "tag2"]
}}

Text to analyze:
{text}

Return ONLY the JSON, with no extra text."#
        )
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(&self, text: &str) -> Result<Analysis, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyText);
        }

        debug!(chars = text.len(), "requesting analysis");

        let body = serde_json::json!({
            "model": self.model,
            "prompt": Self::prompt_for(text),
            "stream": false,
        });

        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = resp.json().await?;
        let raw = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| AnalysisError::Malformed("missing response field".to_string()))?;

        let extracted = extract_json(raw)?;
        serde_json::from_str(&extracted).map_err(|source| AnalysisError::Parse {
            raw: raw.to_string(),
            source,
        })
    }
}

/// Pull the JSON object out of a model reply that may wrap it in prose or
/// code fences: slice from the first `{` to the last `}`, then strip a
/// leading/trailing fence marker if one survived.
fn extract_json(raw: &str) -> Result<String, AnalysisError> {
    let start = raw.find('{');
    let end = raw.rfind('}');

    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if s <= e => (s, e),
        _ => {
            return Err(AnalysisError::NoJson {
                raw: raw.to_string(),
            })
        }
    };

    let mut text = raw[start..=end].trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    Ok(text.trim().to_string())
}
