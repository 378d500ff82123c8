//! MediaWiki Action API client.
//!
//! Pages are keyed by title. Writes go through `action=edit` with a CSRF
//! token obtained once at login; reads use `action=query` with
//! `formatversion=2`. The pipeline only ever appends, so the interesting
//! semantics live in [`merge_body`]: append to an existing page inserts a
//! blank-line separator, append to a missing page degrades to creation.
//!
//! Writes are last-write-wins. Nothing here is transactional with the
//! ledger; the pipeline documents the resulting gap.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::WikiConfig;
use crate::error::PublicationError;
use crate::models::{EditMode, PageEdit};

/// Destination for publication units.
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn read(&self, title: &str) -> Result<Option<String>, PublicationError>;

    /// Save the edit and return the page title it landed under.
    async fn write(&self, edit: &PageEdit, summary: &str) -> Result<String, PublicationError>;

    async fn exists(&self, title: &str) -> Result<bool, PublicationError> {
        Ok(self.read(title).await?.is_some())
    }
}

pub struct WikiClient {
    http: reqwest::Client,
    api_url: String,
    csrf_token: String,
}

impl WikiClient {
    /// Connect and authenticate: login-token handshake, `action=login`,
    /// then fetch the CSRF token used for every subsequent edit.
    pub async fn login(config: &WikiConfig, password: &str) -> Result<Self, PublicationError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let api_url = config.api_url.trim_end_matches('/').to_string();

        let tokens = api_get(
            &http,
            &api_url,
            &[("action", "query"), ("meta", "tokens"), ("type", "login")],
        )
        .await?;
        let login_token = tokens["query"]["tokens"]["logintoken"]
            .as_str()
            .ok_or_else(|| PublicationError::Malformed("missing login token".to_string()))?
            .to_string();

        let login = api_post(
            &http,
            &api_url,
            &[
                ("action", "login"),
                ("lgname", &config.username),
                ("lgpassword", password),
                ("lgtoken", &login_token),
            ],
        )
        .await?;
        let result = login["login"]["result"].as_str().unwrap_or("");
        if result != "Success" {
            return Err(PublicationError::Login(format!(
                "login result '{}' for user '{}'",
                result, config.username
            )));
        }

        let tokens = api_get(&http, &api_url, &[("action", "query"), ("meta", "tokens")]).await?;
        let csrf_token = tokens["query"]["tokens"]["csrftoken"]
            .as_str()
            .ok_or_else(|| PublicationError::Malformed("missing csrf token".to_string()))?
            .to_string();

        info!(user = %config.username, "wiki session established");

        Ok(Self {
            http,
            api_url,
            csrf_token,
        })
    }
}

#[async_trait]
impl PageStore for WikiClient {
    async fn read(&self, title: &str) -> Result<Option<String>, PublicationError> {
        let json = api_get(
            &self.http,
            &self.api_url,
            &[
                ("action", "query"),
                ("prop", "revisions"),
                ("rvprop", "content"),
                ("rvslots", "main"),
                ("titles", title),
                ("formatversion", "2"),
            ],
        )
        .await?;

        let page = json["query"]["pages"]
            .get(0)
            .ok_or_else(|| PublicationError::Malformed("missing pages array".to_string()))?;

        if page.get("missing").is_some() {
            return Ok(None);
        }

        let content = page["revisions"][0]["slots"]["main"]["content"]
            .as_str()
            .ok_or_else(|| PublicationError::Malformed("missing revision content".to_string()))?;

        Ok(Some(content.to_string()))
    }

    async fn write(&self, edit: &PageEdit, summary: &str) -> Result<String, PublicationError> {
        let existing = match edit.mode {
            EditMode::Append => self.read(&edit.title).await?,
            EditMode::Overwrite => None,
        };

        let mut text = merge_body(existing.as_deref(), &edit.body);
        // Category links are attached once, when the page is created.
        if existing.is_none() && !edit.categories.is_empty() {
            text.push_str("\n\n");
            text.push_str(&category_links(&edit.categories));
        }

        debug!(title = %edit.title, bytes = text.len(), "saving page");

        let json = api_post(
            &self.http,
            &self.api_url,
            &[
                ("action", "edit"),
                ("title", &edit.title),
                ("text", &text),
                ("summary", summary),
                ("bot", "1"),
                ("token", &self.csrf_token),
            ],
        )
        .await?;

        let result = json["edit"]["result"].as_str().unwrap_or("");
        if result != "Success" {
            return Err(PublicationError::Malformed(format!(
                "edit result '{}' for page '{}'",
                result, edit.title
            )));
        }

        Ok(edit.title.clone())
    }

    async fn exists(&self, title: &str) -> Result<bool, PublicationError> {
        let json = api_get(
            &self.http,
            &self.api_url,
            &[("action", "query"), ("titles", title), ("formatversion", "2")],
        )
        .await?;

        let page = json["query"]["pages"]
            .get(0)
            .ok_or_else(|| PublicationError::Malformed("missing pages array".to_string()))?;

        Ok(page.get("missing").is_none())
    }
}

/// Concatenate new content after the old body, separated by a blank line;
/// with no old body, the new content stands alone.
pub fn merge_body(existing: Option<&str>, new: &str) -> String {
    match existing {
        Some(old) => format!("{}\n\n{}", old, new),
        None => new.to_string(),
    }
}

fn category_links(categories: &[String]) -> String {
    categories
        .iter()
        .map(|c| format!("[[Category:{}]]", c))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn api_get(
    http: &reqwest::Client,
    api_url: &str,
    params: &[(&str, &str)],
) -> Result<serde_json::Value, PublicationError> {
    let resp = http
        .get(api_url)
        .query(params)
        .query(&[("format", "json")])
        .send()
        .await?;

    parse_api_response(resp).await
}

async fn api_post(
    http: &reqwest::Client,
    api_url: &str,
    form: &[(&str, &str)],
) -> Result<serde_json::Value, PublicationError> {
    let mut form: Vec<(&str, &str)> = form.to_vec();
    form.push(("format", "json"));

    let resp = http.post(api_url).form(&form).send().await?;

    parse_api_response(resp).await
}

async fn parse_api_response(resp: reqwest::Response) -> Result<serde_json::Value, PublicationError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PublicationError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let json: serde_json::Value = resp.json().await?;

    // The API reports failures with HTTP 200 and an error envelope.
    if let Some(error) = json.get("error") {
        return Err(PublicationError::Api {
            code: error["code"].as_str().unwrap_or("unknown").to_string(),
            info: error["info"].as_str().unwrap_or_default().to_string(),
        });
    }

    Ok(json)
}
