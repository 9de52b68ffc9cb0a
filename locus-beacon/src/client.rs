//! HTTP client posting telemetry to the server

use std::time::Duration;

use locus_common::telemetry::TelemetryReport;
use thiserror::Error;

/// Default ingest endpoint of a local server
pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000/api/beacons/data";

const USER_AGENT: &str = concat!("locus-beacon/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection, timeout or TLS failure
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("Server returned {0}: {1}")]
    Rejected(u16, String),
}

pub struct TelemetryClient {
    http_client: reqwest::Client,
    url: String,
}

impl TelemetryClient {
    pub fn new(url: impl Into<String>) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST one report; only a 2xx answer counts as delivered
    pub async fn send(&self, report: &TelemetryReport) -> Result<(), ClientError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(report)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected(status.as_u16(), body));
        }

        tracing::debug!(devices = report.devices.len(), "Telemetry delivered");
        Ok(())
    }
}
