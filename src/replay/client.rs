//! OTLP/HTTP JSON sender used by replay jobs.

use crate::core::{RecorderError, Result, SignalType};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// Header marking requests as replayed traffic
pub const REPLAY_HEADER: &str = "X-Replay-Session";

/// Per-request timeout when none is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts OTLP/JSON payloads to a collector.
#[derive(Debug, Clone)]
pub struct ReplayHttpClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl ReplayHttpClient {
    /// Client with the default 10s request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Client with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecorderError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL for `signal`. Endpoints already carrying a `/v1/` path are
    /// used as given.
    pub fn resolve_endpoint(endpoint: &str, signal: SignalType) -> String {
        if endpoint.contains("/v1/") {
            endpoint.to_string()
        } else {
            format!("{}{}", endpoint.trim_end_matches('/'), signal.otlp_path())
        }
    }

    /// POST one payload. Any non-2xx response is an ingestion failure.
    pub async fn send(&self, endpoint: &str, data: impl Into<Bytes>, signal: SignalType) -> Result<()> {
        let url = Self::resolve_endpoint(endpoint, signal);

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(REPLAY_HEADER, "true")
            .body(data.into())
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("request to {} timed out after {:?}", url, self.timeout)
                } else {
                    format!("request to {} failed: {}", url, e)
                };
                RecorderError::ingestion(None, reason)
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!("Sent {} payload to {} ({})", signal, url, status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(RecorderError::ingestion(
            Some(status.as_u16()),
            format!("{} rejected {} payload: {}", url, signal, body.trim()),
        ))
    }
}
