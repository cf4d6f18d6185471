use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Health of a service as reported by its status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Running and the health endpoint answered with a 2xx status
    Healthy,
    /// Running but the health endpoint failed, timed out or answered non-2xx
    Unhealthy,
    /// Running with no health endpoint configured
    Unknown,
    /// Not running
    Down,
}

impl HealthState {
    /// Classify the outcome of a probe
    pub fn from_probe(outcome: &Result<u16>) -> Self {
        match outcome {
            Ok(code) if (200..300).contains(code) => HealthState::Healthy,
            _ => HealthState::Unhealthy,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
            HealthState::Unknown => write!(f, "unknown"),
            HealthState::Down => write!(f, "down"),
        }
    }
}

/// HTTP health prober with a bounded per-request timeout
#[derive(Debug, Clone)]
pub struct HealthChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| WardenError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET the URL and return the response status code
    pub async fn probe(&self, url: &str) -> Result<u16> {
        // The client timeout covers the request; this bounds anything outside it
        let request = self.client.get(url).send();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => Ok(response.status().as_u16()),
            Ok(Err(e)) => Err(WardenError::ProbeFailure(format!("{}: {}", url, e))),
            Err(_) => Err(WardenError::ProbeFailure(format!(
                "{}: no response within {:?}",
                url, self.timeout
            ))),
        }
    }

    /// Probe the URL and classify the outcome; never fails
    pub async fn check(&self, url: &str) -> HealthState {
        let outcome = self.probe(url).await;
        if let Err(ref e) = outcome {
            debug!("{}", e);
        }
        HealthState::from_probe(&outcome)
    }
}
