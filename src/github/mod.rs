//! GitHub token verification and repository listing.
//!
//! A user's GitHub token is only ever checked by asking GitHub: a successful
//! `GET /user/repos` proves the token works and yields the repository list
//! shown in the UI.
//!
//! # Failure Classes
//!
//! | Upstream response                      | Result                            | Retried |
//! |----------------------------------------|-----------------------------------|---------|
//! | 2xx                                    | repositories                      | -       |
//! | 401, 403 (not rate limited)            | [`ExternalError::InvalidToken`]   | no      |
//! | 429, rate-limited 403, 5xx, network    | [`ExternalError::Unavailable`]    | yes     |
//!
//! Retries use exponential backoff: `initial_backoff * 2^attempt`, capped at
//! [`MAX_BACKOFF`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExternalError;

/// Public GitHub REST API.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Attempts per verification, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Upper bound on a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Repositories requested per page.
const PER_PAGE: u32 = 100;

const CLIENT_USER_AGENT: &str = concat!("pic-host/", env!("CARGO_PKG_VERSION"));

/// A repository visible to the token's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    pub html_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Verifies a third-party token by using it.
#[async_trait]
pub trait RepositoryVerifier: Send + Sync {
    /// List the repositories `token` can see. Success means the token is valid.
    async fn list_repositories(&self, token: &str) -> Result<Vec<Repository>, ExternalError>;
}

/// HTTP client for the GitHub REST API.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl GitHubClient {
    /// Create a client against `api_base` (e.g. [`DEFAULT_GITHUB_API_URL`]).
    pub fn new(api_base: impl Into<String>) -> Result<Self, ExternalError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(CLIENT_USER_AGENT)
            .build()
            .map_err(|e| ExternalError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        })
    }

    /// Override the retry schedule.
    pub fn with_retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn fetch_repositories(&self, token: &str) -> Result<Vec<Repository>, ExternalError> {
        let url = format!(
            "{}/user/repos?per_page={}&sort=updated",
            self.api_base, PER_PAGE
        );

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| ExternalError::Unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_failure(status, response.headers()));
        }

        response
            .json::<Vec<Repository>>()
            .await
            .map_err(|e| ExternalError::Unavailable(format!("unexpected response body: {}", e)))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

#[async_trait]
impl RepositoryVerifier for GitHubClient {
    async fn list_repositories(&self, token: &str) -> Result<Vec<Repository>, ExternalError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ExternalError::InvalidToken);
        }

        let mut attempt = 0;
        loop {
            match self.fetch_repositories(token).await {
                Ok(repos) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "GitHub request succeeded after retry");
                    }
                    return Ok(repos);
                }
                Err(ExternalError::Unavailable(reason)) if attempt + 1 < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    debug!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Transient GitHub failure, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(ExternalError::Unavailable(reason)) => {
                    warn!(attempts = attempt + 1, reason = %reason, "GitHub unavailable");
                    return Err(ExternalError::Unavailable(reason));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Map a non-success upstream status to a failure class.
fn classify_failure(status: StatusCode, headers: &HeaderMap) -> ExternalError {
    match status {
        StatusCode::UNAUTHORIZED => ExternalError::InvalidToken,
        StatusCode::FORBIDDEN if !is_rate_limited(headers) => ExternalError::InvalidToken,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            ExternalError::Unavailable("rate limited by GitHub".to_string())
        }
        s if s.is_server_error() => ExternalError::Unavailable(format!("GitHub returned {}", s)),
        s => ExternalError::Unavailable(format!("unexpected GitHub status {}", s)),
    }
}

/// GitHub signals primary rate limits with `x-ratelimit-remaining: 0` and
/// secondary limits with `retry-after`.
fn is_rate_limited(headers: &HeaderMap) -> bool {
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    exhausted || headers.contains_key("retry-after")
}
