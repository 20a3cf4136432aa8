pub mod analyzer;
pub mod anonymizer;
pub mod config;
pub mod error;
pub mod handler;
pub mod health;
pub mod pipeline;
pub mod upstream;
pub mod version;

pub use analyzer::{AnalysisRequest, AnalyzerClient, DetectedEntity};
pub use anonymizer::{AnonymizationRequest, AnonymizationResult, AnonymizerClient};
pub use config::{ConfigLoader, RuntimeConfig, ANALYZE_UPSTREAM, ANONYMIZE_UPSTREAM, DEFAULT_CONFIG_PATH};
pub use error::{HandlerError, UpstreamError};
pub use handler::{router, AppState, ServerConfig};
pub use health::check_health;
pub use pipeline::Pipeline;
pub use upstream::UpstreamClient;
pub use version::{VersionInfo, DEFAULT_VERSION_FILE};
