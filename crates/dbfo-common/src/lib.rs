//! ---
//! dbfo_section: "01-core-functionality"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Shared primitives and utilities for the failover runtime."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
//! Core shared primitives for the DBFO workspace.
//! This crate exposes configuration loading, tracing initialisation and the
//! Prometheus registry helpers consumed across the workspace.

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, PromotionConfig, RetryConfig,
    TopologyConfig,
};
pub use logging::{init_console, init_tracing, LogFormat};
pub use metrics::{new_registry, render_text, SharedRegistry};
