//! Client for the anonymize upstream, which rewrites the detected spans

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::analyzer::DetectedEntity;
use crate::config::{RuntimeConfig, ANONYMIZE_UPSTREAM};
use crate::error::UpstreamError;
use crate::upstream::UpstreamClient;

#[derive(Debug, Clone, Serialize)]
pub struct AnonymizationRequest<'a> {
    pub text: &'a str,
    pub analyzer_results: &'a [DetectedEntity],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymizers: Option<&'a Value>,
}

impl<'a> AnonymizationRequest<'a> {
    pub fn new(text: &'a str, analyzer_results: &'a [DetectedEntity], config: &'a RuntimeConfig) -> Self {
        Self {
            text,
            analyzer_results,
            anonymizers: config.anonymizers.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnonymizationResult {
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct AnonymizerClient {
    upstream: UpstreamClient,
}

impl AnonymizerClient {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    pub async fn anonymize(
        &self,
        text: &str,
        entities: &[DetectedEntity],
        config: &RuntimeConfig,
        deadline: Instant,
    ) -> Result<String, UpstreamError> {
        let request = AnonymizationRequest::new(text, entities, config);
        let result: AnonymizationResult = self
            .upstream
            .post_json(config, ANONYMIZE_UPSTREAM, "/anonymize", &request, deadline)
            .await?;

        debug!("Anonymizer returned {} bytes", result.text.len());
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_carries_analyzer_results_unchanged() {
        let config = RuntimeConfig::default();
        let entities = vec![DetectedEntity {
            start: 0,
            end: 4,
            score: 0.9,
            entity_type: "NAME".to_string(),
        }];
        let request = AnonymizationRequest::new("John called", &entities, &config);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "text": "John called",
                "analyzer_results": [
                    {"start": 0, "end": 4, "score": 0.9, "entity_type": "NAME"}
                ]
            })
        );
    }

    #[test]
    fn test_request_with_anonymizers() {
        let config = RuntimeConfig {
            anonymizers: Some(json!({
                "PHONE_NUMBER": {"type": "mask", "masking_char": "*", "chars_to_mask": 4, "from_end": true}
            })),
            ..RuntimeConfig::default()
        };
        let request = AnonymizationRequest::new("call 555-0100", &[], &config);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["analyzer_results"], json!([]));
        assert_eq!(value["anonymizers"]["PHONE_NUMBER"]["masking_char"], "*");
    }

    #[test]
    fn test_parse_anonymizer_response() {
        let body = r#"{"text": "<NAME> called", "items": [{"start": 0, "end": 6, "entity_type": "NAME", "operator": "replace"}]}"#;
        let result: AnonymizationResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.text, "<NAME> called");
    }

    #[test]
    fn test_response_without_text_is_rejected() {
        assert!(serde_json::from_str::<AnonymizationResult>(r#"{"items": []}"#).is_err());
    }
}
