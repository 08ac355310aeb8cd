//! Request plumbing and the web console health-check wait.

use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

use browserup_wait::{retry, RetryOutcome, WaitStrategy};

use crate::error::{ConsoleError, Result};

/// Per-request timeout for ordinary console calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout while polling the health check.
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Path of the aggregated health check.
const HEALTH_CHECK_PATH: &str = "load/health_checks";

/// One request against the console API.
#[derive(Debug)]
pub(crate) struct RequestSpec<'a> {
    /// Path relative to the console base URL, e.g. `load/runs`.
    pub path: &'a str,
    /// HTTP method.
    pub method: Method,
    /// Extra query parameters. `api_token` is always added.
    pub query: Vec<(&'a str, String)>,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
    /// Statuses treated as success; anything else is an unexpected
    /// response.
    pub expected: &'a [StatusCode],
}

impl<'a> RequestSpec<'a> {
    pub(crate) fn new(method: Method, path: &'a str) -> Self {
        Self {
            path,
            method,
            query: Vec::new(),
            body: None,
            expected: &[StatusCode::OK],
        }
    }

    pub(crate) fn query(mut self, name: &'a str, value: impl Into<String>) -> Self {
        self.query.push((name, value.into()));
        self
    }

    pub(crate) fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn expect(mut self, expected: &'a [StatusCode]) -> Self {
        self.expected = expected;
        self
    }
}

/// Authenticated client for one cluster's web console.
#[derive(Debug, Clone)]
pub struct ConsoleClient {
    http: reqwest::Client,
    base_url: Url,
    api_token: String,
}

impl ConsoleClient {
    /// Builds a client for the console at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, api_token: impl Into<String>) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| ConsoleError::Transport { source })?;
        Ok(Self {
            http,
            base_url,
            api_token: api_token.into(),
        })
    }

    /// The console base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn url_for(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|source| ConsoleError::InvalidBaseUrl {
                url: format!("{}{path}", self.base_url),
                source,
            })
    }

    pub(crate) fn api_token(&self) -> &str {
        &self.api_token
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Issues a request and validates its status against the expected set.
    pub(crate) async fn send_request(&self, spec: RequestSpec<'_>) -> Result<Response> {
        let url = self.url_for(spec.path)?;
        trace!(method = %spec.method, url = %url, "console request");

        let mut request = self
            .http
            .request(spec.method, url.clone())
            .query(&[("api_token", self.api_token.as_str())])
            .query(&spec.query)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = spec.body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if spec.expected.contains(&status) {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "unexpected console response");
            Err(ConsoleError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Polls the console health check until every subsystem reports `UP`.
    ///
    /// Uses the standard web console wait budget: 3s delay, up to 120
    /// attempts, 1000s overall.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::NotReady`] when the budget expires before
    /// all subsystems are up.
    pub async fn wait_for_ready(base_url: &str) -> Result<()> {
        Self::wait_for_ready_with(base_url, WaitStrategy::web_console()).await
    }

    /// [`Self::wait_for_ready`] with a caller-supplied budget.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::NotReady`] when the budget expires before
    /// all subsystems are up.
    pub async fn wait_for_ready_with(base_url: &str, strategy: WaitStrategy) -> Result<()> {
        let health_url = parse_base_url(base_url)?
            .join(HEALTH_CHECK_PATH)
            .map_err(|source| ConsoleError::InvalidBaseUrl {
                url: base_url.to_string(),
                source,
            })?;

        // Self-signed certificates are the norm on a fresh cluster ingress.
        let http = reqwest::Client::builder()
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|source| ConsoleError::Transport { source })?;

        debug!(url = %health_url, timeout_secs = strategy.max_elapsed.as_secs(), "waiting for web console");

        retry(strategy, || {
            let http = http.clone();
            let health_url = health_url.clone();
            async move {
                match poll_health(&http, health_url).await {
                    Ok(()) => RetryOutcome::Done(()),
                    Err(e) => RetryOutcome::Retry(e),
                }
            }
        })
        .await
        .map_err(|source| ConsoleError::NotReady {
            url: health_url.to_string(),
            source,
        })
    }
}

/// One subsystem's health entry.
#[derive(Debug, Deserialize)]
struct HealthCheck {
    id: String,
    value: String,
}

/// Why a single health poll did not succeed.
#[derive(Debug, Error)]
pub enum HealthPollError {
    /// The request itself failed.
    #[error("health check request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response was not the expected JSON list.
    #[error("health check response was malformed: {0}")]
    Malformed(#[source] reqwest::Error),

    /// A subsystem reported something other than `UP`.
    #[error("{id} not ready ({value})")]
    SubsystemDown {
        /// The subsystem id.
        id: String,
        /// Its reported health value.
        value: String,
    },
}

async fn poll_health(
    http: &reqwest::Client,
    url: Url,
) -> std::result::Result<(), HealthPollError> {
    let response = http
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(HealthPollError::Transport)?
        .error_for_status()
        .map_err(HealthPollError::Transport)?;

    let checks: Vec<HealthCheck> = response.json().await.map_err(HealthPollError::Malformed)?;
    for check in checks {
        if check.value != "UP" {
            return Err(HealthPollError::SubsystemDown {
                id: check.id,
                value: check.value,
            });
        }
    }
    Ok(())
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    // A trailing slash makes Url::join treat the last segment as a
    // directory instead of replacing it.
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };
    Url::parse(&normalized).map_err(|source| ConsoleError::InvalidBaseUrl {
        url: base_url.to_string(),
        source,
    })
}

fn transport_error(url: &Url, error: reqwest::Error) -> ConsoleError {
    if error.is_connect() {
        ConsoleError::Unreachable {
            url: url.to_string(),
        }
    } else {
        ConsoleError::Transport { source: error }
    }
}
