use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};
use url::Url;

use crate::config::ScraperConfig;
use crate::rate::RateGovernor;
use crate::robots::RobotsPolicy;
use crate::utils::error::{ConfigError, FetchError, FetchErrorKind};

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    /// Body exactly as served; parsing is the adapter's job.
    pub body: String,
    /// Attempts taken to obtain this response, including the successful one.
    pub attempts: u32,
}

/// HTTP fetches under politeness constraints: robots permission, per-site
/// pacing, rotated User-Agent, and capped exponential retry on transient
/// failures.
pub struct FetchClient {
    http: reqwest::Client,
    governor: Arc<RateGovernor>,
    robots: Arc<dyn RobotsPolicy>,
    user_agents: Vec<String>,
    max_retries: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl FetchClient {
    pub fn new(
        config: &ScraperConfig,
        governor: Arc<RateGovernor>,
        robots: Arc<dyn RobotsPolicy>,
    ) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            governor,
            robots,
            user_agents: config.user_agents.clone(),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.retry_base_delay_ms),
            backoff_cap: Duration::from_millis(config.retry_max_delay_ms),
        })
    }

    /// Fetches one page. Waits out the rate governor first; retries
    /// transient failures up to `max_retries` times with doubling backoff.
    /// 4xx statuses other than 429 fail immediately.
    pub async fn fetch(&self, url: &Url, site_key: &str) -> Result<FetchResponse, FetchError> {
        let host = url.host_str().unwrap_or_default();
        if !self.robots.is_allowed(host, url.path()).await {
            warn!(%url, "robots.txt disallows path, skipping");
            return Err(FetchError {
                kind: FetchErrorKind::RobotsDenied,
                url: url.to_string(),
                status: None,
                attempts: 0,
            });
        }

        let wait = self.governor.acquire(site_key).await;
        if !wait.is_zero() {
            debug!(site_key, ?wait, "rate governor pacing");
            tokio::time::sleep(wait).await;
        }

        // ExponentialBackoff yields 2^n ms; the factor rebases that to
        // backoff_base, backoff_base*2, backoff_base*4, ...
        let strategy = ExponentialBackoff::from_millis(2)
            .factor((self.backoff_base.as_millis() as u64 / 2).max(1))
            .max_delay(self.backoff_cap)
            .map(jitter)
            .take(self.max_retries as usize);

        let attempts = AtomicU32::new(0);
        let result = RetryIf::spawn(
            strategy,
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                self.attempt(url, attempt)
            },
            |err: &FetchError| {
                if err.is_retryable() {
                    warn!(%err, "fetch attempt failed, retrying");
                    true
                } else {
                    false
                }
            },
        )
        .await;

        if let Ok(resp) = &result {
            debug!(%url, status = resp.status, bytes = resp.body.len(), "fetch succeeded");
        }
        result
    }

    async fn attempt(&self, url: &Url, attempt: u32) -> Result<FetchResponse, FetchError> {
        let agent = self
            .user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or("pricewatch/0.1");

        let fail = |kind: FetchErrorKind, status: Option<u16>| FetchError {
            kind,
            url: url.to_string(),
            status,
            attempts: attempt,
        };

        let response = self
            .http
            .get(url.clone())
            .header(USER_AGENT, agent)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    FetchErrorKind::Timeout
                } else {
                    FetchErrorKind::Network
                };
                fail(kind, None)
            })?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|_| fail(FetchErrorKind::Network, Some(status.as_u16())))?;
            return Ok(FetchResponse {
                status: status.as_u16(),
                body,
                attempts: attempt,
            });
        }

        let kind = match status.as_u16() {
            429 => FetchErrorKind::RateLimited,
            code if status.is_client_error() => {
                debug!(%url, code, "client error, not retrying");
                FetchErrorKind::Http4xx
            }
            code if status.is_server_error() => {
                debug!(%url, code, "server error");
                FetchErrorKind::Http5xx
            }
            _ => FetchErrorKind::Network,
        };
        Err(fail(kind, Some(status.as_u16())))
    }
}
