//! The analyze → anonymize chain for one piece of text

use tokio::time::Instant;
use tracing::info;

use crate::analyzer::AnalyzerClient;
use crate::anonymizer::AnonymizerClient;
use crate::config::RuntimeConfig;
use crate::error::HandlerError;
use crate::upstream::UpstreamClient;

#[derive(Clone, Debug)]
pub struct Pipeline {
    analyzer: AnalyzerClient,
    anonymizer: AnonymizerClient,
}

impl Pipeline {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self {
            analyzer: AnalyzerClient::new(upstream.clone()),
            anonymizer: AnonymizerClient::new(upstream),
        }
    }

    /// Runs both calls strictly in order. The anonymizer only ever sees the
    /// spans the analyzer produced for this same `text`; if analysis fails
    /// it is never called.
    pub async fn run(
        &self,
        text: &str,
        config: &RuntimeConfig,
        deadline: Instant,
    ) -> Result<String, HandlerError> {
        let entities = self
            .analyzer
            .analyze(text, config, deadline)
            .await
            .map_err(HandlerError::Analysis)?;

        let anonymized = self
            .anonymizer
            .anonymize(text, &entities, config, deadline)
            .await
            .map_err(HandlerError::Anonymization)?;

        info!(
            "Anonymized {} bytes of text ({} entities)",
            text.len(),
            entities.len()
        );
        Ok(anonymized)
    }
}
