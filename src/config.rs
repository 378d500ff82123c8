use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub chat: ChatConfig,
    pub analysis: AnalysisConfig,
    pub wiki: WikiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Base URL of the chat bridge (history + update feed).
    pub api_url: String,
    /// The monitored conversation.
    pub chat_id: i64,
    /// The pipeline's own account id; its messages are dropped as self-echo.
    pub self_id: i64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_page_size() -> usize {
    100
}
fn default_queue_capacity() -> usize {
    256
}
fn default_poll_timeout_secs() -> u64 {
    25
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Base URL of the Ollama-compatible analysis service.
    pub url: String,
    pub model: String,
    #[serde(default = "default_analysis_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_analysis_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct WikiConfig {
    /// Full URL of the MediaWiki Action API endpoint (`…/api.php`).
    pub api_url: String,
    pub username: String,
    #[serde(default = "default_wiki_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_edit_summary")]
    pub edit_summary: String,
}

fn default_wiki_timeout_secs() -> u64 {
    30
}
fn default_edit_summary() -> String {
    "bot update".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chat.api_url.trim().is_empty() {
        anyhow::bail!("chat.api_url must not be empty");
    }
    if config.chat.chat_id == 0 {
        anyhow::bail!("chat.chat_id must be set");
    }
    if config.chat.page_size == 0 {
        anyhow::bail!("chat.page_size must be > 0");
    }
    if config.chat.queue_capacity == 0 {
        anyhow::bail!("chat.queue_capacity must be > 0");
    }

    if config.analysis.url.trim().is_empty() {
        anyhow::bail!("analysis.url must not be empty");
    }
    if config.analysis.model.trim().is_empty() {
        anyhow::bail!("analysis.model must not be empty");
    }

    if config.wiki.api_url.trim().is_empty() {
        anyhow::bail!("wiki.api_url must not be empty");
    }
    if config.wiki.username.trim().is_empty() {
        anyhow::bail!("wiki.username must not be empty");
    }

    Ok(config)
}
