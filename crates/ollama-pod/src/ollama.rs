//! Client for the Ollama service running inside a pod.

use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from a model pull.
#[derive(Error, Debug)]
pub enum PullError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ollama answered with a non-success status.
    #[error("Ollama returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Ollama reported an error in the progress stream.
    #[error("{0}")]
    Server(String),

    /// The stream ended without a `success` status.
    #[error("pull stream ended before completion (last status: {0})")]
    Incomplete(String),

    /// The pull did not finish in time.
    #[error("pull did not finish within {0} seconds")]
    Timeout(u64),
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullProgress {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
}

/// Ollama HTTP API client bound to one endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl OllamaClient {
    /// Create a client for `base_url`.
    ///
    /// `request_timeout` bounds health probes and connection setup; pulls are
    /// bounded separately.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, PullError> {
        let client = Client::builder().connect_timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    /// Base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the service answers `GET /api/version`.
    ///
    /// Connection errors count as not healthy; the pod may still be booting.
    pub async fn is_healthy(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => {
                debug!(url = %url, status = %response.status(), "Health probe");
                response.status().is_success()
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Health probe failed");
                false
            }
        }
    }

    /// Pull `model` and follow the progress stream until it completes.
    ///
    /// # Errors
    /// Returns [`PullError`] if the request fails, Ollama reports an error,
    /// the stream ends early, or `timeout` elapses.
    pub async fn pull(&self, model: &str, timeout: Duration) -> Result<(), PullError> {
        match tokio::time::timeout(timeout, self.pull_stream(model)).await {
            Ok(result) => result,
            Err(_) => Err(PullError::Timeout(timeout.as_secs())),
        }
    }

    async fn pull_stream(&self, model: &str) -> Result<(), PullError> {
        let url = format!("{}/api/pull", self.base_url);
        debug!(url = %url, model = %model, "Pulling model");

        let response = self
            .client
            .post(&url)
            .json(&PullRequest {
                model,
                stream: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PullError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut last_status = String::from("none");

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if handle_line(&line, &mut last_status)? {
                    return Ok(());
                }
            }
        }

        // final line without trailing newline
        if handle_line(&buffer, &mut last_status)? {
            return Ok(());
        }

        Err(PullError::Incomplete(last_status))
    }
}

/// Process one NDJSON progress line. `true` once the pull succeeded.
fn handle_line(line: &[u8], last_status: &mut String) -> Result<bool, PullError> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Ok(false);
    }

    let progress: PullProgress = match serde_json::from_str(text) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, line = %text, "Skipping unparseable progress line");
            return Ok(false);
        }
    };

    if let Some(error) = progress.error {
        return Err(PullError::Server(error));
    }

    if let Some(status) = progress.status {
        debug!(
            status = %status,
            completed = progress.completed.unwrap_or(0),
            total = progress.total.unwrap_or(0),
            "Pull progress"
        );
        if status == "success" {
            return Ok(true);
        }
        *last_status = status;
    }

    Ok(false)
}
