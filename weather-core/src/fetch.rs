//! HTTP access with bounded retry and exponential backoff.

use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    config::RetryConfig,
    error::{FetchError, HttpFailure},
    model::FetchAttempt,
    url::redacted,
};

/// One GET, no retries. Non-2xx statuses are failures.
#[async_trait]
pub trait HttpClient: Send + Sync + Debug {
    async fn get(&self, url: &Url) -> Result<String, HttpFailure>;
}

#[async_trait]
impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    async fn get(&self, url: &Url) -> Result<String, HttpFailure> {
        (**self).get(url).await
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestClient {
    http: Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("weather-etl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &Url) -> Result<String, HttpFailure> {
        // reqwest errors embed the request URL, which carries the API key.
        let res = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HttpFailure::Transport(e.without_url()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| HttpFailure::Transport(e.without_url()))?;

        if !status.is_success() {
            return Err(HttpFailure::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Wait after the 0-based `failed_attempt`: `base_delay * 2^failed_attempt`.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(failed_attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        (&RetryConfig::default()).into()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            base_delay: cfg.base_delay,
        }
    }
}

#[derive(Debug)]
pub struct Fetcher<C> {
    client: C,
    policy: RetryPolicy,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET `url`, retrying failed attempts until the policy's ceiling.
    ///
    /// There is no sleep after the last attempt; the error carries the cause
    /// of that last attempt.
    pub async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let shown = redacted(url);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = FetchAttempt::first();

        loop {
            debug!(url = %shown, attempt = attempt.number, "HTTP GET start");

            match self.client.get(url).await {
                Ok(body) => {
                    if attempt.number > 1 {
                        info!(url = %shown, attempt = attempt.number, "HTTP GET succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(source) if attempt.number >= max_attempts => {
                    return Err(FetchError {
                        url: shown,
                        attempts: attempt.number,
                        waited: attempt.waited,
                        source,
                    });
                }
                Err(e) => {
                    let delay = self.policy.delay_after(attempt.number - 1);
                    warn!(
                        url = %shown,
                        error = %e,
                        "[retry {}/{}] HTTP GET failed, retrying in {:?}",
                        attempt.number,
                        max_attempts,
                        delay
                    );
                    sleep(delay).await;
                    attempt = attempt.next(delay);
                }
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}
