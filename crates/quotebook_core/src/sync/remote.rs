//! Remote quote source contract and HTTP adapter.
//!
//! # Responsibility
//! - Define the pull/push seam the sync driver talks to.
//! - Map a JSON placeholder-post feed into server quotes.
//!
//! # Invariants
//! - Fetch returns at most `fetch_limit` quotes, all with category `Server`.
//! - Errors carry the stage and a stable machine-readable code.

use crate::model::quote::Quote;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Category assigned to every quote fabricated from remote posts.
pub const SERVER_CATEGORY: &str = "Server";
/// Id prefix for quotes fabricated from remote posts.
pub const SERVER_ID_PREFIX: &str = "server-";

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Sync step that produced a remote error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Fetch,
    Push,
}

impl Display for SyncStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// Error envelope for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteError {
    pub source_id: String,
    pub stage: SyncStage,
    /// Stable code: `transport_failed`, `timeout`, `http_status` or `malformed_payload`.
    pub code: String,
    pub message: String,
    /// Whether the next periodic cycle may succeed without user action.
    pub retryable: bool,
}

impl RemoteError {
    pub fn new(
        source_id: impl Into<String>,
        stage: SyncStage,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            stage,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Builds the error reported when a call exceeds its time budget.
    pub fn timeout(source_id: impl Into<String>, stage: SyncStage, budget: Duration) -> Self {
        Self::new(
            source_id,
            stage,
            "timeout",
            format!("no response within {} ms", budget.as_millis()),
            true,
        )
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} failed ({}): {}",
            self.source_id, self.stage, self.code, self.message
        )
    }
}

impl Error for RemoteError {}

/// Pull/push seam for server synchronization.
#[async_trait]
pub trait RemoteQuoteSource: Send + Sync {
    /// Short identifier used in logs and error envelopes.
    fn source_id(&self) -> &str;

    /// Fetches the current remote snapshot.
    async fn fetch_quotes(&self) -> RemoteResult<Vec<Quote>>;

    /// Sends the full local sequence to the remote side.
    async fn push_quotes(&self, quotes: &[Quote]) -> RemoteResult<()>;
}

/// Endpoint settings for `HttpQuoteSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSourceSettings {
    pub fetch_url: String,
    pub push_url: String,
    pub fetch_limit: usize,
}

#[derive(Debug, Deserialize)]
struct RemotePost {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct PushEnvelope<'a> {
    title: &'a str,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

/// REST adapter reading placeholder posts and relabeling titles as quotes.
pub struct HttpQuoteSource {
    client: Client,
    settings: HttpSourceSettings,
}

impl HttpQuoteSource {
    const SOURCE_ID: &'static str = "http";

    pub fn new(settings: HttpSourceSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub fn with_client(client: Client, settings: HttpSourceSettings) -> Self {
        Self { client, settings }
    }

    fn error(&self, stage: SyncStage, code: &str, message: String, retryable: bool) -> RemoteError {
        RemoteError::new(Self::SOURCE_ID, stage, code, message, retryable)
    }

    fn transport_error(&self, stage: SyncStage, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            return self.error(stage, "timeout", err.to_string(), true);
        }
        self.error(stage, "transport_failed", err.to_string(), true)
    }
}

#[async_trait]
impl RemoteQuoteSource for HttpQuoteSource {
    fn source_id(&self) -> &str {
        Self::SOURCE_ID
    }

    async fn fetch_quotes(&self) -> RemoteResult<Vec<Quote>> {
        let url = self.settings.fetch_url.as_str();
        debug!("event=remote_fetch module=sync status=start source={}", Self::SOURCE_ID);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.transport_error(SyncStage::Fetch, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error(
                SyncStage::Fetch,
                "http_status",
                format!("unexpected status {status}"),
                status.is_server_error(),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| self.error(SyncStage::Fetch, "malformed_payload", err.to_string(), false))?;

        let quotes = quotes_from_posts(body, self.settings.fetch_limit)
            .map_err(|message| self.error(SyncStage::Fetch, "malformed_payload", message, false))?;

        info!(
            "event=remote_fetch module=sync status=ok source={} count={}",
            Self::SOURCE_ID,
            quotes.len()
        );
        Ok(quotes)
    }

    async fn push_quotes(&self, quotes: &[Quote]) -> RemoteResult<()> {
        let body = serde_json::to_string(quotes).map_err(|err| {
            self.error(SyncStage::Push, "malformed_payload", err.to_string(), false)
        })?;
        let envelope = PushEnvelope {
            title: "Quote Data",
            body,
            user_id: 1,
        };

        let response = self
            .client
            .post(self.settings.push_url.as_str())
            .json(&envelope)
            .send()
            .await
            .map_err(|err| self.transport_error(SyncStage::Push, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error(
                SyncStage::Push,
                "http_status",
                format!("unexpected status {status}"),
                status.is_server_error(),
            ));
        }

        // The echo is only inspected for shape; nothing is stored from it.
        match response.json::<Value>().await {
            Ok(echo) => debug!(
                "event=remote_push module=sync status=ok source={} echo_fields={}",
                Self::SOURCE_ID,
                echo.as_object().map_or(0, |fields| fields.len())
            ),
            Err(err) => warn!(
                "event=remote_push module=sync status=ok source={} echo_parse_error={}",
                Self::SOURCE_ID,
                err
            ),
        }

        info!(
            "event=remote_push module=sync status=ok source={} count={}",
            Self::SOURCE_ID,
            quotes.len()
        );
        Ok(())
    }
}

/// Converts a JSON array of posts into server quotes.
///
/// Takes the first `limit` entries that carry a non-blank `title`.
/// Fails when the payload is not an array or an entry is not an object.
pub fn quotes_from_posts(body: Value, limit: usize) -> Result<Vec<Quote>, String> {
    let Value::Array(entries) = body else {
        return Err("expected a JSON array of posts".to_string());
    };

    let mut quotes = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        if quotes.len() >= limit {
            break;
        }
        let post: RemotePost = serde_json::from_value(entry)
            .map_err(|err| format!("post #{index} is not an object: {err}"))?;
        let Some(title) = post.title.filter(|title| !title.trim().is_empty()) else {
            continue;
        };

        let quote = match post.id.as_ref().and_then(remote_id_text) {
            Some(id) => Quote::with_id(format!("{SERVER_ID_PREFIX}{id}"), title, SERVER_CATEGORY),
            None => Quote::new(title, SERVER_CATEGORY),
        };
        quotes.push(quote);
    }
    Ok(quotes)
}

fn remote_id_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}
