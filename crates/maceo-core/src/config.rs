//! Configuration management for maceo

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ANALYZE_UPSTREAM: &str = "analyze";
pub const ANONYMIZE_UPSTREAM: &str = "anonymize";
pub const DEFAULT_CONFIG_PATH: &str = "/var/openfaas/secrets/maceo";

const DEFAULT_ANALYZE_URL: &str = "http://10.62.0.1:5001";
const DEFAULT_ANONYMIZE_URL: &str = "http://10.62.0.1:5002";

/// Settings that drive a single request: where the upstreams live and what
/// to ask the analyzer for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub upstreams: HashMap<String, String>,
    pub entities: Option<Vec<String>>,
    pub language: String,
    pub score_threshold: f64,
    pub anonymizers: Option<Value>,
    pub ad_hoc_recognizers: Option<Vec<Value>>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let mut upstreams = HashMap::new();
        upstreams.insert(ANALYZE_UPSTREAM.to_string(), DEFAULT_ANALYZE_URL.to_string());
        upstreams.insert(ANONYMIZE_UPSTREAM.to_string(), DEFAULT_ANONYMIZE_URL.to_string());

        Self {
            upstreams,
            entities: None,
            language: "en".to_string(),
            score_threshold: 0.0,
            anonymizers: None,
            ad_hoc_recognizers: None,
        }
    }
}

/// The on-disk shape. Every field is optional so that a file only has to
/// name what it changes.
#[derive(Debug, Deserialize)]
struct ConfigOverlay {
    upstreams: Option<HashMap<String, String>>,
    #[serde(default, deserialize_with = "present")]
    entities: Option<Option<Vec<String>>>,
    language: Option<String>,
    score_threshold: Option<f64>,
    #[serde(default, deserialize_with = "present")]
    anonymizers: Option<Option<Value>>,
    #[serde(default, deserialize_with = "present")]
    ad_hoc_recognizers: Option<Option<Vec<Value>>>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from a missing field (`None`).
fn present<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl RuntimeConfig {
    /// Base URL for a logical upstream name, with any trailing slash removed.
    pub fn upstream(&self, name: &str) -> Option<&str> {
        self.upstreams
            .get(name)
            .map(|url| url.trim_end_matches('/'))
    }

    pub fn with_upstream(mut self, name: &str, url: impl Into<String>) -> Self {
        self.upstreams.insert(name.to_string(), url.into());
        self
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::default().overlay(path, &contents)
    }

    /// Returns a copy of `self` with `contents` laid over it. `path` only
    /// picks the format and names the file in errors.
    pub fn overlay(&self, path: &Path, contents: &str) -> Result<Self> {
        let overlay: ConfigOverlay = if is_toml(path) {
            toml::from_str(contents)
                .with_context(|| format!("Failed to parse TOML config {}", path.display()))?
        } else {
            serde_json::from_str(contents)
                .with_context(|| format!("Failed to parse JSON config {}", path.display()))?
        };

        Ok(self.clone().apply(overlay))
    }

    fn apply(mut self, overlay: ConfigOverlay) -> Self {
        if let Some(upstreams) = overlay.upstreams {
            self.upstreams.extend(upstreams);
        }
        if let Some(entities) = overlay.entities {
            self.entities = entities;
        }
        if let Some(language) = overlay.language {
            self.language = language;
        }
        if let Some(score_threshold) = overlay.score_threshold {
            self.score_threshold = score_threshold;
        }
        if let Some(anonymizers) = overlay.anonymizers {
            self.anonymizers = anonymizers;
        }
        if let Some(ad_hoc_recognizers) = overlay.ad_hoc_recognizers {
            self.ad_hoc_recognizers = ad_hoc_recognizers;
        }
        self
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Builds a fresh [`RuntimeConfig`] for every request.
///
/// The loader itself is immutable; each call to [`ConfigLoader::load`] starts
/// from the built-in defaults and returns a new value, so concurrent requests
/// never observe each other's configuration.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
    defaults: RuntimeConfig,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH, RuntimeConfig::default())
    }
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>, defaults: RuntimeConfig) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &RuntimeConfig {
        &self.defaults
    }

    /// Only `NotFound` means "no file" and yields the defaults. Any other
    /// read error, or a file that does not parse, is an error.
    pub async fn load(&self) -> Result<RuntimeConfig> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", self.path.display());
                return Ok(self.defaults.clone());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file {}", self.path.display()));
            }
        };

        debug!("Loading config from {}", self.path.display());
        self.defaults.overlay(&self.path, &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_config_default() {
        let config = RuntimeConfig::default();

        assert_eq!(config.upstream(ANALYZE_UPSTREAM), Some("http://10.62.0.1:5001"));
        assert_eq!(config.upstream(ANONYMIZE_UPSTREAM), Some("http://10.62.0.1:5002"));
        assert_eq!(config.entities, None);
        assert_eq!(config.language, "en");
        assert_eq!(config.score_threshold, 0.0);
        assert!(config.anonymizers.is_none());
        assert!(config.ad_hoc_recognizers.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path().join("absent"), RuntimeConfig::default());

        let config = loader.load().await.unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let file = write_config("{ not json");
        let loader = ConfigLoader::new(file.path(), RuntimeConfig::default());

        assert!(loader.load().await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_an_error() {
        let file = write_config(r#"{"score_threshold": "high"}"#);
        let loader = ConfigLoader::new(file.path(), RuntimeConfig::default());

        assert!(loader.load().await.is_err());
    }

    #[tokio::test]
    async fn test_unreadable_path_is_not_treated_as_missing() {
        // a regular file used as a directory fails with ENOTDIR, not NotFound
        let file = write_config("{}");
        let loader = ConfigLoader::new(file.path().join("maceo"), RuntimeConfig::default());

        assert!(loader.load().await.is_err());
    }

    #[tokio::test]
    async fn test_file_overlays_defaults() {
        let file = write_config(
            r#"{
                "upstreams": {"analyze": "http://analyzer:3000"},
                "entities": ["PERSON", "EMAIL_ADDRESS"],
                "score_threshold": 0.35
            }"#,
        );
        let loader = ConfigLoader::new(file.path(), RuntimeConfig::default());

        let config = loader.load().await.unwrap();
        assert_eq!(config.upstream(ANALYZE_UPSTREAM), Some("http://analyzer:3000"));
        // not named in the file, so the default survives
        assert_eq!(config.upstream(ANONYMIZE_UPSTREAM), Some("http://10.62.0.1:5002"));
        assert_eq!(
            config.entities,
            Some(vec!["PERSON".to_string(), "EMAIL_ADDRESS".to_string()])
        );
        assert_eq!(config.language, "en");
        assert_eq!(config.score_threshold, 0.35);
    }

    #[tokio::test]
    async fn test_passthrough_values_are_kept_verbatim() {
        let file = write_config(
            r#"{
                "anonymizers": {"DEFAULT": {"type": "replace", "new_value": "<REDACTED>"}},
                "ad_hoc_recognizers": [
                    {"name": "Zip code", "supported_entity": "ZIP", "patterns": [{"regex": "\\d{5}", "score": 0.4}]}
                ]
            }"#,
        );

        let config = RuntimeConfig::from_file(file.path()).await.unwrap();
        assert_eq!(
            config.anonymizers,
            Some(json!({"DEFAULT": {"type": "replace", "new_value": "<REDACTED>"}}))
        );
        let recognizers = config.ad_hoc_recognizers.unwrap();
        assert_eq!(recognizers.len(), 1);
        assert_eq!(recognizers[0]["supported_entity"], "ZIP");
        assert_eq!(recognizers[0]["patterns"][0]["regex"], "\\d{5}");
    }

    #[tokio::test]
    async fn test_null_fields_clear_defaults() {
        let defaults = RuntimeConfig {
            entities: Some(vec!["PERSON".to_string()]),
            anonymizers: Some(json!({"DEFAULT": {"type": "mask"}})),
            ..RuntimeConfig::default()
        };
        let file = write_config(r#"{"entities": null, "anonymizers": null}"#);
        let loader = ConfigLoader::new(file.path(), defaults);

        let config = loader.load().await.unwrap();
        assert_eq!(config.entities, None);
        assert_eq!(config.anonymizers, None);
    }

    #[tokio::test]
    async fn test_load_does_not_change_loader_defaults() {
        let file = write_config(r#"{"language": "de"}"#);
        let loader = ConfigLoader::new(file.path(), RuntimeConfig::default());

        assert_eq!(loader.load().await.unwrap().language, "de");
        assert_eq!(loader.defaults().language, "en");
    }

    #[tokio::test]
    async fn test_toml_config_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
language = "es"
entities = ["PHONE_NUMBER"]

[upstreams]
anonymize = "http://anonymizer:3000/"

[anonymizers.DEFAULT]
type = "hash"
"#,
        )
        .unwrap();

        let config = RuntimeConfig::from_file(file.path()).await.unwrap();
        assert_eq!(config.language, "es");
        assert_eq!(config.entities, Some(vec!["PHONE_NUMBER".to_string()]));
        assert_eq!(config.upstream(ANONYMIZE_UPSTREAM), Some("http://anonymizer:3000"));
        assert_eq!(config.anonymizers, Some(json!({"DEFAULT": {"type": "hash"}})));
    }

    #[tokio::test]
    async fn test_with_upstream_replaces_base_url() {
        let config = RuntimeConfig::default().with_upstream(ANALYZE_UPSTREAM, "http://127.0.0.1:9000");
        assert_eq!(config.upstream(ANALYZE_UPSTREAM), Some("http://127.0.0.1:9000"));
        assert_eq!(config.upstream("unknown"), None);
    }
}
