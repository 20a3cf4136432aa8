//! HTTP plumbing shared by the analyze and anonymize clients

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::RuntimeConfig;
use crate::error::UpstreamError;

const CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// A pooled HTTP client. Cheap to clone; every clone shares connections.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self { client })
    }

    /// POSTs `body` as JSON to `{base}{path}` for the upstream called `name`
    /// and decodes a 200 answer. Any other status is an error carrying the
    /// raw response body.
    pub async fn post_json<B, R>(
        &self,
        config: &RuntimeConfig,
        name: &str,
        path: &str,
        body: &B,
        deadline: Instant,
    ) -> Result<R, UpstreamError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = endpoint(config, name, path)?;
        let timeout = remaining(name, deadline)?;

        debug!("POST {} (timeout {:?})", url, timeout);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: url.clone(),
                source,
            })?;

        if status != StatusCode::OK {
            error!("{} returned {}: {}", url, status, text);
            return Err(UpstreamError::Status {
                url,
                status,
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|source| UpstreamError::Decode { url, source })
    }

    /// GETs `{base}/health`. Only transport failures count; a non-2xx
    /// answer still proves the upstream is reachable and is only logged.
    pub async fn ping(
        &self,
        config: &RuntimeConfig,
        name: &str,
        deadline: Instant,
    ) -> Result<StatusCode, UpstreamError> {
        let url = endpoint(config, name, "/health")?;
        let timeout = remaining(name, deadline)?;

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} answered health check with {}", url, status);
        }
        Ok(status)
    }
}

fn endpoint(config: &RuntimeConfig, name: &str, path: &str) -> Result<String, UpstreamError> {
    config
        .upstream(name)
        .map(|base| format!("{}{}", base, path))
        .ok_or_else(|| UpstreamError::NotConfigured(name.to_string()))
}

fn remaining(name: &str, deadline: Instant) -> Result<Duration, UpstreamError> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(UpstreamError::DeadlineExceeded(name.to_string()));
    }
    Ok(left)
}
