// src/provider/retry.rs — Retry with exponential backoff for model providers
//
// Wraps any ModelProvider with a per-attempt timeout and bounded retry on
// transient failures: rate limits (429), server errors (5xx), timeouts,
// connection resets. Does NOT retry bad requests or auth errors.
// Running out of attempts yields RetriesExhausted, which callers report as
// an infrastructure failure rather than a low score.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatRequest, ChatResponse, ModelProvider};
use crate::infra::errors::JudgeError;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY_MS: u64 = 500;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 8_000;
const JITTER_FRACTION: f64 = 0.2;
const ATTEMPT_TIMEOUT_SECS: u64 = 60;
const MAX_RATE_LIMIT_DELAY_MS: u64 = 30_000;

/// Configuration for retry behavior. `max_attempts` counts every call,
/// including the first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
    pub attempt_timeout: Duration,
    /// Upper bound on a server-requested wait (`Retry-After`).
    pub max_rate_limit_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
            attempt_timeout: Duration::from_secs(ATTEMPT_TIMEOUT_SECS),
            max_rate_limit_delay: Duration::from_millis(MAX_RATE_LIMIT_DELAY_MS),
        }
    }
}

/// `[retry]` section of config.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
    pub attempt_timeout_seconds: u64,
    pub max_rate_limit_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay_ms: INITIAL_DELAY_MS,
            backoff_factor: BACKOFF_FACTOR,
            max_delay_ms: MAX_DELAY_MS,
            jitter_fraction: JITTER_FRACTION,
            attempt_timeout_seconds: ATTEMPT_TIMEOUT_SECS,
            max_rate_limit_delay_ms: MAX_RATE_LIMIT_DELAY_MS,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            initial_delay: Duration::from_millis(s.initial_delay_ms),
            backoff_factor: s.backoff_factor,
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter_fraction: s.jitter_fraction.clamp(0.0, 1.0),
            attempt_timeout: Duration::from_secs(s.attempt_timeout_seconds.max(1)),
            max_rate_limit_delay: Duration::from_millis(s.max_rate_limit_delay_ms),
        }
    }
}

/// A provider wrapper that adds timeouts and retry with exponential backoff.
pub struct RetryProvider {
    inner: Arc<dyn ModelProvider>,
    config: RetryConfig,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn ModelProvider>) -> Self {
        Self {
            inner,
            config: RetryConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn ModelProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Calculate the delay after a failed attempt (0-indexed).
    fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        // A server-provided wait wins, with a small buffer, up to the cap.
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay
                .saturating_add(Duration::from_millis(100))
                .min(self.config.max_rate_limit_delay);
        }

        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);

        let jitter = deterministic_jitter(attempt, self.config.jitter_fraction);
        Duration::from_millis((capped_ms * jitter).max(0.0) as u64)
    }

    async fn attempt(&self, request: ChatRequest) -> Result<ChatResponse, JudgeError> {
        let timeout = self.config.attempt_timeout;
        match tokio::time::timeout(timeout, self.inner.chat(request)).await {
            Ok(result) => result,
            Err(_) => Err(JudgeError::Timeout {
                provider: self.inner.id().to_string(),
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

/// Determine if an error should be retried.
fn should_retry(error: &JudgeError) -> bool {
    error.is_retriable()
}

/// Extract rate-limit retry delay from the error, if available.
fn rate_limit_delay(error: &JudgeError) -> Option<Duration> {
    match error {
        JudgeError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in tests.
/// Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[async_trait]
impl ModelProvider for RetryProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, JudgeError> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let e = match self.attempt(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !should_retry(&e) {
                return Err(e);
            }
            if attempt + 1 == max_attempts {
                tracing::error!(
                    provider = self.inner.id(),
                    attempts = max_attempts,
                    "Giving up after error: {}",
                    e
                );
                return Err(JudgeError::RetriesExhausted {
                    provider: self.inner.id().to_string(),
                    attempts: max_attempts,
                    last_error: e.to_string(),
                });
            }

            let delay = self.delay_for_attempt(attempt, rate_limit_delay(&e));
            tracing::warn!(
                provider = self.inner.id(),
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying after error: {}",
                e
            );
            tokio::time::sleep(delay).await;
        }

        Err(JudgeError::RetriesExhausted {
            provider: self.inner.id().to_string(),
            attempts: max_attempts,
            last_error: "no attempt was made".into(),
        })
    }
}
