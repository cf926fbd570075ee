//! ---
//! dbfo_section: "07-resilience-fault-tolerance"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Database failover controller components."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::fmt;

use dbfo_resilience::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FailoverError>;

/// External service that produced a [`ControlPlaneError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Database,
    Dns,
    Notification,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Database => "database",
            Service::Dns => "dns",
            Service::Notification => "notification",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by a collaborator, carrying the service's own error code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{service} control plane returned {code}: {message}")]
pub struct ControlPlaneError {
    pub service: Service,
    pub code: String,
    pub message: String,
}

impl ControlPlaneError {
    pub fn new(service: Service, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Service::Database, code, message)
    }

    pub fn dns(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Service::Dns, code, message)
    }

    pub fn notification(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Service::Notification, code, message)
    }
}

impl ErrorCode for ControlPlaneError {
    fn error_code(&self) -> Option<&str> {
        Some(&self.code)
    }
}

#[derive(Debug, Error)]
pub enum FailoverError {
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
    #[error("invalid failover event: {0}")]
    InvalidEvent(String),
}

impl ErrorCode for FailoverError {
    fn error_code(&self) -> Option<&str> {
        match self {
            FailoverError::ControlPlane(err) => err.error_code(),
            FailoverError::InvalidEvent(_) => None,
        }
    }
}
