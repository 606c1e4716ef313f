//! Authenticated delivery of content snapshots to target sites.
//!
//! [`DispatchClient`] POSTs a [`SyncEnvelope`] to `{site.url}/sync/import`.
//! Transport failures (connect, DNS, timeout) are retried with exponential
//! backoff (1 s, 2 s, 4 s by default). HTTP error responses are never
//! retried: the target answered, and resending the same payload would get
//! the same answer.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use yachtsync_core::error::SyncError;
use yachtsync_core::site::{AuthScheme, SyncSite};
use yachtsync_core::snapshot::SyncEnvelope;

/// Default retry delays (exponential backoff: 1s, 2s, 4s).
pub const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Request timeout when media is imported asynchronously by the target.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Request timeout when the target downloads media inside the request.
pub const DEFAULT_MEDIA_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest error message kept from a response body.
const MAX_MESSAGE_LEN: usize = 500;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Delay before each retry; the number of entries bounds the retries.
    pub retry_delays: Vec<Duration>,
    /// Upper bound of random jitter added to every retry delay.
    pub max_jitter: Duration,
    pub request_timeout: Duration,
    pub media_timeout: Duration,
    /// Process-wide key used for sites without their own.
    pub default_api_key: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
            max_jitter: Duration::from_millis(250),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            media_timeout: DEFAULT_MEDIA_TIMEOUT,
            default_api_key: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of one dispatch, including every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub success: bool,
    /// HTTP status of the final response; `None` when none was received.
    pub status_code: Option<u16>,
    /// Raw response body of the final response.
    pub body: Option<String>,
    pub error: Option<SyncError>,
}

impl DispatchResult {
    fn failed(status_code: Option<u16>, body: Option<String>, error: SyncError) -> Self {
        Self {
            success: false,
            status_code,
            body,
            error: Some(error),
        }
    }

    /// Parsed JSON body, when the response had one.
    pub fn json(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
    }

    /// Convert into a `Result`, keeping the error of a failed dispatch.
    pub fn into_result(self) -> Result<Self, SyncError> {
        match self.error.clone() {
            Some(err) if !self.success => Err(err),
            None if !self.success => Err(SyncError::Remote {
                status: self.status_code.unwrap_or_default(),
                message: "dispatch failed".into(),
            }),
            _ => Ok(self),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Dispatcher seam
// ---------------------------------------------------------------------------

/// Sends one envelope to one site. Implemented by [`DispatchClient`] and
/// by fakes in orchestrator tests.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, site: &SyncSite, envelope: &SyncEnvelope) -> DispatchResult;
}

// ---------------------------------------------------------------------------
// DispatchClient
// ---------------------------------------------------------------------------

pub struct DispatchClient {
    client: reqwest::Client,
    config: DispatchConfig,
}

impl DispatchClient {
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("yachtsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn timeout_for(&self, envelope: &SyncEnvelope) -> Duration {
        if envelope.import_media {
            self.config.media_timeout
        } else {
            self.config.request_timeout
        }
    }

    fn backoff(&self, base: Duration) -> Duration {
        let jitter_ms = self.config.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Execute a single POST and classify the response.
    async fn try_send(
        &self,
        url: &str,
        key: &str,
        scheme: AuthScheme,
        envelope: &SyncEnvelope,
        timeout: Duration,
    ) -> DispatchResult {
        let request = self
            .client
            .post(url)
            .query(&[("type", envelope.kind.as_str())])
            .timeout(timeout)
            .json(envelope);
        let request = match scheme {
            AuthScheme::ApiKeyHeader => request.header("X-API-Key", key),
            AuthScheme::Bearer => request.bearer_auth(key),
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return DispatchResult::failed(None, None, SyncError::Transport(e.to_string())),
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return DispatchResult::failed(
                    Some(status),
                    None,
                    SyncError::Transport(format!("reading response body: {e}")),
                )
            }
        };
        classify(status, body)
    }
}

#[async_trait]
impl Dispatcher for DispatchClient {
    async fn send(&self, site: &SyncSite, envelope: &SyncEnvelope) -> DispatchResult {
        let Some(key) = site.resolve_api_key(self.config.default_api_key.as_deref()) else {
            return DispatchResult::failed(
                None,
                None,
                SyncError::Auth(format!("no API key configured for site {}", site.name)),
            );
        };

        let url = site.import_url();
        let timeout = self.timeout_for(envelope);
        let mut result = self
            .try_send(&url, key, site.auth_scheme, envelope, timeout)
            .await;

        for (attempt, delay) in self.config.retry_delays.iter().enumerate() {
            let retryable = result.error.as_ref().is_some_and(|e| {
                matches!(e, SyncError::Transport(_))
            });
            if !retryable {
                break;
            }
            let delay = self.backoff(*delay);
            tracing::warn!(
                site_id = site.id,
                url = %url,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = ?result.error,
                "Dispatch attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            result = self
                .try_send(&url, key, site.auth_scheme, envelope, timeout)
                .await;
        }

        if let Some(err) = &result.error {
            tracing::error!(
                site_id = site.id,
                slug = %envelope.data.slug,
                status = ?result.status_code,
                code = err.code(),
                error = %err,
                "Dispatch failed"
            );
        } else {
            tracing::debug!(site_id = site.id, slug = %envelope.data.slug, "Dispatch succeeded");
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Response classification
// ---------------------------------------------------------------------------

fn classify(status: u16, body: String) -> DispatchResult {
    let parsed: Option<serde_json::Value> = serde_json::from_str(&body).ok();
    let message = || error_message(parsed.as_ref(), &body);

    let error = match status {
        200..=299 => {
            let reported_failure = parsed
                .as_ref()
                .and_then(|v| v.get("success"))
                .and_then(serde_json::Value::as_bool)
                == Some(false);
            if !reported_failure {
                return DispatchResult {
                    success: true,
                    status_code: Some(status),
                    body: Some(body),
                    error: None,
                };
            }
            SyncError::Remote {
                status,
                message: message(),
            }
        }
        401 | 403 => SyncError::Auth(message()),
        400 | 422 => SyncError::Validation(message()),
        _ => SyncError::Remote {
            status,
            message: message(),
        },
    };
    DispatchResult::failed(Some(status), Some(body), error)
}

/// Human-readable error from a response: `message`/`error` fields, an
/// `errors` list, or the truncated raw body.
fn error_message(parsed: Option<&serde_json::Value>, body: &str) -> String {
    if let Some(value) = parsed {
        for key in ["message", "error"] {
            if let Some(text) = value.get(key).and_then(serde_json::Value::as_str) {
                return truncate(text);
            }
        }
        if let Some(errors) = value.get("errors").and_then(serde_json::Value::as_array) {
            let joined = errors
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return truncate(&joined);
            }
        }
    }
    if body.trim().is_empty() {
        "empty response body".to_string()
    } else {
        truncate(body.trim())
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
