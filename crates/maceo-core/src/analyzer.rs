//! Client for the analyze upstream, which locates PII spans in text

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{RuntimeConfig, ANALYZE_UPSTREAM};
use crate::error::UpstreamError;
use crate::upstream::UpstreamClient;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest<'a> {
    pub text: &'a str,
    pub language: &'a str,
    /// `null` asks the analyzer for every entity type it knows.
    pub entities: Option<&'a [String]>,
    pub score_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_hoc_recognizers: Option<&'a [Value]>,
}

impl<'a> AnalysisRequest<'a> {
    pub fn new(text: &'a str, config: &'a RuntimeConfig) -> Self {
        Self {
            text,
            language: &config.language,
            entities: config.entities.as_deref(),
            score_threshold: config.score_threshold,
            ad_hoc_recognizers: config.ad_hoc_recognizers.as_deref(),
        }
    }
}

/// One span reported by the analyzer. Offsets are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEntity {
    pub start: u64,
    pub end: u64,
    pub score: f64,
    pub entity_type: String,
}

#[derive(Clone, Debug)]
pub struct AnalyzerClient {
    upstream: UpstreamClient,
}

impl AnalyzerClient {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    pub async fn analyze(
        &self,
        text: &str,
        config: &RuntimeConfig,
        deadline: Instant,
    ) -> Result<Vec<DetectedEntity>, UpstreamError> {
        let request = AnalysisRequest::new(text, config);
        let entities: Vec<DetectedEntity> = self
            .upstream
            .post_json(config, ANALYZE_UPSTREAM, "/analyze", &request, deadline)
            .await?;

        debug!("Analyzer reported {} entities", entities.len());
        Ok(entities)
    }
}
