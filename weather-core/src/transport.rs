use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use std::fmt::Debug;

pub mod http;
pub mod retry;

pub use http::HttpTransport;
pub use retry::{RetryPolicy, RetryingTransport};

/// A fully resolved request, ready to be put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), query: Vec::new(), headers: Vec::new(), body: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

/// Failures where no response came back at all.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Connect(_) | TransportError::Timeout(_))
    }
}

#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}
