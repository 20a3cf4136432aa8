//! Reachability check for both upstreams

use tokio::time::Instant;
use tracing::{debug, error};

use crate::config::{ConfigLoader, ANALYZE_UPSTREAM, ANONYMIZE_UPSTREAM};
use crate::upstream::UpstreamClient;

pub const HEALTH_SUFFIX: &str = "/health";

const UPSTREAMS: [&str; 2] = [ANALYZE_UPSTREAM, ANONYMIZE_UPSTREAM];

pub fn is_health_path(path: &str) -> bool {
    path.ends_with(HEALTH_SUFFIX)
}

/// Healthy when the configuration loads and both upstreams answer
/// `GET /health` without a transport error. The first failure short-circuits.
pub async fn check_health(loader: &ConfigLoader, upstream: &UpstreamClient, deadline: Instant) -> bool {
    let config = match loader.load().await {
        Ok(config) => config,
        Err(e) => {
            error!("Health check failed loading config: {:#}", e);
            return false;
        }
    };

    for name in UPSTREAMS {
        match upstream.ping(&config, name, deadline).await {
            Ok(status) => debug!("Upstream '{}' reachable ({})", name, status),
            Err(e) => {
                error!("Health check failed for upstream '{}': {}", name, e);
                return false;
            }
        }
    }

    true
}
