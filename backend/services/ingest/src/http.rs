use std::time::Duration;

use pulse_common::PulseResult;
use pulse_config::env::parse_var_or;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::retry::{with_backoff, Attempt, RetryPolicy};

const USER_AGENT: &str = concat!("pulse-ingest/", env!("CARGO_PKG_VERSION"));

/// How a request authenticates. A supplied username selects basic auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, token: String },
    Bearer(String),
}

impl Credentials {
    pub fn new(username: Option<String>, token: String) -> Self {
        match username.filter(|u| !u.trim().is_empty()) {
            Some(username) => Self::Basic { username, token },
            None => Self::Bearer(token),
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Basic { username, token } => request.basic_auth(username, Some(token)),
            Self::Bearer(token) => request.bearer_auth(token),
        }
    }
}

/// Per-source transport knobs.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl HttpSettings {
    /// Read `<PREFIX>_MAX_RETRIES`, `<PREFIX>_TIMEOUT_SECS` and `<PREFIX>_RETRY_BASE_MS`.
    pub fn from_env(prefix: &str) -> PulseResult<Self> {
        let defaults = Self::default();
        let base_ms = parse_var_or(
            &format!("{prefix}_RETRY_BASE_MS"),
            u64::try_from(defaults.retry.base_delay.as_millis()).unwrap_or(1000),
        )?;

        Ok(Self {
            timeout_secs: parse_var_or(&format!("{prefix}_TIMEOUT_SECS"), defaults.timeout_secs)?,
            retry: RetryPolicy {
                max_retries: parse_var_or(
                    &format!("{prefix}_MAX_RETRIES"),
                    defaults.retry.max_retries,
                )?,
                base_delay: Duration::from_millis(base_ms),
                max_delay: defaults.retry.max_delay,
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("rate limited: retries exhausted after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("cancelled before completion")]
    Cancelled,
}

/// Authenticated, rate-limit-aware JSON transport owned by one adapter.
#[derive(Clone)]
pub struct SourceHttp {
    client: Client,
    credentials: Credentials,
    retry: RetryPolicy,
}

impl SourceHttp {
    pub fn new(
        credentials: Credentials,
        settings: &HttpSettings,
        headers: HeaderMap,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            credentials,
            retry: settings.retry.clone(),
        })
    }

    /// GET `url` and decode the body, retrying 429 responses with backoff.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, SourceError> {
        let body = with_backoff(&self.retry, cancel, || self.get_once(url, query)).await?;
        serde_json::from_slice(&body).map_err(|source| SourceError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn get_once(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Attempt<Vec<u8>>, SourceError> {
        let response = self
            .credentials
            .apply(self.client.get(url).query(query))
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            return Ok(Attempt::Done(response.bytes().await?.to_vec()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Ok(Attempt::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        Err(SourceError::HttpError { status, body })
    }
}
