//! Error types for the request pipeline

use axum::http::{Method, StatusCode};
use thiserror::Error;

/// Failure talking to one of the upstream services.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("no upstream configured for '{0}'")]
    NotConfigured(String),

    #[error("request deadline passed before calling {0}")]
    DeadlineExceeded(String),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything that can end a request early. Only the status code reaches
/// the caller.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("request body is empty")]
    EmptyBody,

    #[error("request body is not valid UTF-8")]
    InvalidUtf8,

    #[error("failed to read request body: {0}")]
    ReadBody(String),

    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    #[error("analysis failed: {0}")]
    Analysis(#[source] UpstreamError),

    #[error("anonymization failed: {0}")]
    Anonymization(#[source] UpstreamError),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            HandlerError::EmptyBody | HandlerError::InvalidUtf8 => StatusCode::BAD_REQUEST,
            HandlerError::ReadBody(_)
            | HandlerError::Config(_)
            | HandlerError::Analysis(_)
            | HandlerError::Anonymization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}
