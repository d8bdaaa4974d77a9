use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{HttpRequest, HttpResponse, Transport, TransportError};

/// Pool sizing for the underlying HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Number of distinct hosts the client is expected to keep pools for.
    pub pool_connections: usize,
    /// Idle connections kept alive per host.
    pub pool_maxsize: usize,
    pub timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self { pool_connections: 10, pool_maxsize: 20, timeout: Duration::from_secs(30) }
    }
}

/// Pooled reqwest client. A single instance is reused for every call so
/// connections stay warm between requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(options: PoolOptions) -> Result<Self, TransportError> {
        debug!(
            pool_connections = options.pool_connections,
            pool_maxsize = options.pool_maxsize,
            timeout_ms = options.timeout.as_millis() as u64,
            "building pooled HTTP client"
        );

        let http = Client::builder()
            .pool_max_idle_per_host(options.pool_maxsize)
            .timeout(options.timeout)
            .build()
            .map_err(|err| TransportError::Other(format!("failed to build HTTP client: {err}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.http.request(request.method.clone(), &request.url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await.map_err(classify)?;
        let status = res.status();
        let body = res.text().await.map_err(classify)?;

        Ok(HttpResponse { status, body })
    }
}

/// The URL carries the API key, so it never makes it into the message.
fn classify(err: reqwest::Error) -> TransportError {
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
