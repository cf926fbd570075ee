//! ---
//! dbfo_section: "07-resilience-fault-tolerance"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Retry and backoff strategies for control-plane calls."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
#![warn(missing_docs)]
//! Retry/backoff execution shared by every control-plane interaction of the
//! failover controller.

pub mod metrics;
pub mod retry;

pub use metrics::ResilienceMetrics;
pub use retry::{ErrorCode, RecordingSleeper, RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};

/// Crate prelude collecting the most commonly used builders.
pub mod prelude {
    pub use super::metrics::ResilienceMetrics;
    pub use super::retry::{ErrorCode, RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};
}
