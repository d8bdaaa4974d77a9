//! Generic client for the upstream API: rate limit gate, dispatch through a
//! retrying pooled transport, and classification of whatever comes back.

use std::{fmt, sync::Arc};

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    clock::{SystemClock, TokioSleeper},
    config::Config,
    error::{ApiError, ErrorDetail, FieldError},
    model::{ApiWeather, Paginated},
    rate_limit::RateLimiter,
    transport::{
        HttpRequest, HttpResponse, HttpTransport, RetryingTransport, Transport, TransportError,
    },
};

/// Anything a successful response body can be decoded into.
pub trait ApiModel: DeserializeOwned + Send {
    /// True when the shape carries optional paging metadata and this value
    /// came back without it.
    fn pagination_missing(&self) -> bool {
        false
    }
}

impl ApiModel for serde_json::Value {}

impl ApiModel for ApiWeather {}

impl<T: DeserializeOwned + Send> ApiModel for Paginated<T> {
    fn pagination_missing(&self) -> bool {
        self.meta.is_none()
    }
}

/// One call against the upstream, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    endpoint: String,
    method: Method,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Where the upstream lives and how to authenticate against it.
#[derive(Clone)]
pub struct ApiTarget {
    pub base_url: String,
    pub id_path_parameter: String,
    pub api_key: String,
}

impl fmt::Debug for ApiTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTarget")
            .field("base_url", &self.base_url)
            .field("id_path_parameter", &self.id_path_parameter)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ApiTarget {
    /// `{base}{endpoint}{id_path_parameter}{api_key}`
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}{}{}", self.base_url, endpoint, self.id_path_parameter, self.api_key)
    }
}

/// One instance per upstream target; owns its rate limiter state and its
/// connection pool for its whole lifetime.
#[derive(Debug)]
pub struct ApiClient {
    target: ApiTarget,
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
}

impl ApiClient {
    pub fn new(target: ApiTarget, transport: Arc<dyn Transport>, limiter: RateLimiter) -> Self {
        Self { target, transport, limiter }
    }

    /// Pooled reqwest transport with the configured retry policy underneath
    /// a wall-clock rate limiter.
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let pooled = HttpTransport::new(config.pool_options())?;
        let transport =
            RetryingTransport::new(pooled, config.retry_policy(), Arc::new(TokioSleeper));
        let limiter =
            RateLimiter::new(config.rate_limit(), Arc::new(SystemClock), Arc::new(TokioSleeper));

        let target = ApiTarget {
            base_url: config.api.url.clone(),
            id_path_parameter: config.api.id_path_parameter.clone(),
            api_key: config.api.api_key.clone(),
        };

        Ok(Self::new(target, Arc::new(transport), limiter))
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Perform `request` and decode the body into `R`.
    pub async fn call<R: ApiModel>(&self, request: ApiRequest) -> Result<R, ApiError> {
        self.limiter.acquire().await;

        let http = HttpRequest {
            method: request.method,
            url: self.target.url_for(&request.endpoint),
            query: request.query,
            headers: request.headers,
            body: request.body,
        };

        debug!(method = %http.method, endpoint = %request.endpoint, "dispatching API call");

        let res = self.transport.send(&http).await.map_err(ApiError::NoResponse)?;
        let value = decode::<R>(res)?;

        if value.pagination_missing() {
            warn!(endpoint = %request.endpoint, "Expected pagination data missing in response");
        }

        Ok(value)
    }
}

fn decode<R: ApiModel>(res: HttpResponse) -> Result<R, ApiError> {
    let status = res.status;

    if !status.is_success() {
        let detail = match serde_json::from_str::<serde_json::Value>(&res.body) {
            Ok(value) => ErrorDetail::from_value(value),
            Err(_) => ErrorDetail::FieldErrors(vec![FieldError::unparsable_body()]),
        };
        debug!(status = %status, %detail, "API call failed");
        return Err(ApiError::Validation { status: Some(status.as_u16()), detail });
    }

    serde_json::from_str::<R>(&res.body).map_err(|err| ApiError::Validation {
        status: Some(status.as_u16()),
        detail: ErrorDetail::Message(format!("failed to decode response body: {err}")),
    })
}
