use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use super::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::clock::Sleeper;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total sends, the first one included. Never below 1.
    pub max_attempts: u32,
    pub backoff_factor: Duration,
    pub backoff_max: Duration,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: Duration::from_millis(500),
            backoff_max: Duration::from_secs(60),
            retry_statuses: vec![429, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// `min(backoff_max, backoff_factor * 2^attempt)`, `attempt` counting from 0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.backoff_factor.as_secs_f64() * 2f64.powi(attempt.min(64) as i32);
        let capped = scaled.min(self.backoff_max.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.backoff_max)
    }

    /// Only idempotent methods are sent more than once.
    pub fn is_retryable_method(&self, method: &Method) -> bool {
        [Method::GET, Method::HEAD, Method::PUT, Method::DELETE, Method::OPTIONS, Method::TRACE]
            .contains(method)
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Retries transient failures of the wrapped transport with exponential
/// backoff. Once attempts run out the last outcome is handed back as is.
#[derive(Debug)]
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { inner, policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryingTransport<T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if !self.policy.is_retryable_method(&request.method) {
            return self.inner.send(request).await;
        }

        let attempts = self.policy.attempts();
        let mut attempt = 0;

        loop {
            let outcome = self.inner.send(request).await;
            let last = attempt + 1 >= attempts;

            let retry = match &outcome {
                Ok(res) => self.policy.is_retryable_status(res.status),
                Err(err) => err.is_retryable(),
            };

            if !retry {
                return outcome;
            }
            if last {
                warn!(attempts, "retries exhausted");
                return outcome;
            }

            let delay = self.policy.delay_for(attempt);
            match &outcome {
                Ok(res) => {
                    debug!(status = %res.status, attempt, ?delay, "retrying after transient status")
                }
                Err(err) => debug!(error = %err, attempt, ?delay, "retrying after transport error"),
            }
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}
