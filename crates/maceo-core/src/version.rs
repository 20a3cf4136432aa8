//! Build metadata stamped onto every response

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_VERSION_FILE: &str = "static/version.json";

pub static VERSION_HEADER: HeaderName = HeaderName::from_static("x-maceo-version");
pub static COMMIT_HEADER: HeaderName = HeaderName::from_static("x-maceo-commit");

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VersionInfo {
    pub version: String,
    pub commit: String,
}

impl VersionInfo {
    /// Best effort: a missing or malformed file yields empty values.
    pub async fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                debug!("Could not read version file {}: {}", path.display(), e);
                return Self::default();
            }
        };

        serde_json::from_slice(&data).unwrap_or_else(|e| {
            debug!("Could not parse version file {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(VERSION_HEADER.clone(), header_value(&self.version));
        headers.insert(COMMIT_HEADER.clone(), header_value(&self.commit));
    }
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(""))
}
