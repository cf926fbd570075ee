//! ---
//! dbfo_section: "03-persistence-logging"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Metrics registry and text export utilities."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Registry, TextEncoder};

/// Shared registry type used across crates.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Encode every metric family of the registry in the Prometheus text format.
pub fn render_text(registry: &SharedRegistry) -> Result<String> {
    let families = registry.gather();
    TextEncoder::new()
        .encode_to_string(&families)
        .context("failed to encode metrics")
}

pub use prometheus;
