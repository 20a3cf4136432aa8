//! HTTP entry point: path-suffix routing, request checks and response writing

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use crate::config::{ConfigLoader, RuntimeConfig, DEFAULT_CONFIG_PATH};
use crate::error::HandlerError;
use crate::health::{check_health, is_health_path};
use crate::pipeline::Pipeline;
use crate::upstream::UpstreamClient;
use crate::version::{VersionInfo, DEFAULT_VERSION_FILE};

pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Used when the request budget is too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub config_path: PathBuf,
    pub defaults: RuntimeConfig,
    pub version_file: PathBuf,
    /// Budget for a whole inbound request; every upstream call gets whatever
    /// is left of it.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            defaults: RuntimeConfig::default(),
            version_file: PathBuf::from(DEFAULT_VERSION_FILE),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }
}

/// Shared, read-only state handed to every request.
#[derive(Clone, Debug)]
pub struct AppState {
    loader: ConfigLoader,
    upstream: UpstreamClient,
    pipeline: Pipeline,
    version_file: PathBuf,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.request_timeout.is_zero() {
            anyhow::bail!("Request timeout must be greater than zero");
        }
        let upstream = UpstreamClient::new()?;

        Ok(Self {
            loader: ConfigLoader::new(config.config_path, config.defaults),
            pipeline: Pipeline::new(upstream.clone()),
            upstream,
            version_file: config.version_file,
            request_timeout: config.request_timeout,
        })
    }
}

/// Every path is served by the same handler; `/health` is told apart by
/// suffix only.
pub fn router(state: AppState) -> Router {
    Router::new().fallback(handle).with_state(state)
}

/// The body is taken raw rather than through an extractor so that no size
/// limit or rejection can produce a response without the version headers.
async fn handle(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let span = info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %parts.method,
        path = %parts.uri.path()
    );

    async move {
        let version = VersionInfo::load(&state.version_file).await;
        let deadline = deadline_after(state.request_timeout);

        let mut response = if is_health_path(parts.uri.path()) {
            health(&state, deadline).await
        } else {
            match process(&state, parts.method, body, deadline).await {
                Ok(text) => (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    text,
                )
                    .into_response(),
                Err(e) => {
                    if e.is_client_error() {
                        debug!("Rejected request: {}", e);
                    } else {
                        error!("Request failed: {}", e);
                    }
                    e.status().into_response()
                }
            }
        };

        version.apply(response.headers_mut());
        response
    }
    .instrument(span)
    .await
}

fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE)
}

async fn health(state: &AppState, deadline: Instant) -> Response {
    if check_health(&state.loader, &state.upstream, deadline).await {
        StatusCode::OK.into_response()
    } else {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

async fn process(
    state: &AppState,
    method: Method,
    body: Body,
    deadline: Instant,
) -> Result<String, HandlerError> {
    if method != Method::POST {
        return Err(HandlerError::MethodNotAllowed(method));
    }
    let body = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| HandlerError::ReadBody(e.to_string()))?;
    if body.is_empty() {
        return Err(HandlerError::EmptyBody);
    }
    let text = std::str::from_utf8(&body).map_err(|_| HandlerError::InvalidUtf8)?;

    let config = state.loader.load().await.map_err(HandlerError::Config)?;
    state.pipeline.run(text, &config, deadline).await
}
