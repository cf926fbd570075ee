//! ---
//! dbfo_section: "07-resilience-fault-tolerance"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Retry and backoff strategies for control-plane calls."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbfo_common::config::RetryConfig;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::metrics::ResilienceMetrics;

/// Classification hook used by [`RetryPolicy`] to decide whether an error is transient.
pub trait ErrorCode {
    /// Service error code carried by the error, if any.
    fn error_code(&self) -> Option<&str>;
}

/// Suspension point used between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync + fmt::Debug {
    /// Suspend the current task for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Sleeper that returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in call order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().push(delay);
    }
}

/// Immutable retry parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_seconds: f64,
    max_delay: Duration,
    retryable_error_codes: BTreeSet<String>,
}

impl RetryPolicy {
    /// Build a policy. `max_attempts` counts total invocations and is at least 1.
    pub fn new<I, S>(max_attempts: u32, base_delay_seconds: f64, retryable_error_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_seconds: base_delay_seconds.max(0.0),
            max_delay: Duration::from_secs(30),
            retryable_error_codes: retryable_error_codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a policy from the `[retry]` configuration section.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.base_delay_seconds,
            config.retryable_error_codes.iter().cloned(),
        )
        .with_max_delay(config.max_delay)
    }

    /// Cap every individual backoff delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Same attempt and delay parameters with a different retryable set.
    pub fn with_retryable_codes<I, S>(&self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            retryable_error_codes: codes.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    /// Total number of invocations allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Codes treated as transient.
    pub fn retryable_error_codes(&self) -> &BTreeSet<String> {
        &self.retryable_error_codes
    }

    /// Whether the error carries a code from the retryable set.
    pub fn is_retryable<E: ErrorCode + ?Sized>(&self, err: &E) -> bool {
        err.error_code()
            .map_or(false, |code| self.retryable_error_codes.contains(code))
    }

    /// Delay slept after failed attempt `attempt` (1-indexed): `base ^ attempt` seconds, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let seconds = self.base_delay_seconds.powi(exponent);
        Duration::try_from_secs_f64(seconds)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Worst-case total time spent sleeping for one call.
    pub fn worst_case_sleep(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| self.backoff_delay(attempt))
            .sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Runs a zero-argument operation under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: Arc<RetryPolicy>,
    sleeper: Arc<dyn Sleeper>,
    metrics: Option<ResilienceMetrics>,
}

impl RetryExecutor {
    /// Executor sleeping on the tokio timer.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            sleeper: Arc::new(TokioSleeper),
            metrics: None,
        }
    }

    /// Replace the sleeper, typically with a [`RecordingSleeper`] in tests.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attach a metrics handle.
    pub fn with_metrics(mut self, metrics: ResilienceMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Executor sharing this one's sleeper and metrics but using another policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            sleeper: self.sleeper.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `call` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The final error is returned unchanged.
    pub async fn execute<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorCode + fmt::Display,
    {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1u32;
        loop {
            debug!(operation, attempt, max_attempts, "invoking control-plane operation");
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "operation succeeded after retry");
                    }
                    self.record(operation, "success");
                    return Ok(value);
                }
                Err(err) => {
                    if !self.policy.is_retryable(&err) {
                        warn!(
                            operation,
                            attempt,
                            code = err.error_code().unwrap_or(""),
                            error = %err,
                            "non-retryable error; giving up",
                        );
                        self.record(operation, "fatal");
                        return Err(err);
                    }
                    if attempt >= max_attempts {
                        error!(
                            operation,
                            attempt,
                            code = err.error_code().unwrap_or(""),
                            error = %err,
                            "retry budget exhausted",
                        );
                        self.record(operation, "exhausted");
                        return Err(err);
                    }
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        code = err.error_code().unwrap_or(""),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient error; backing off",
                    );
                    self.record(operation, "retry");
                    if let Some(metrics) = &self.metrics {
                        metrics.observe_backoff(operation, delay);
                    }
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn record(&self, operation: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(operation, outcome);
        }
    }
}
