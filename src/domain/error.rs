//! Error taxonomy for monitor operations
//!
//! Every variant is raised before any state is touched. Publish failures
//! are a separate type because they are logged and never reach the caller.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// Missing or wrongly typed required field (HTTP 400)
    InvalidInput(String),
    /// Referenced zone does not exist (HTTP 404)
    NotFound(String),
}

impl MonitorError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        MonitorError::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        MonitorError::NotFound(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            MonitorError::InvalidInput(msg) | MonitorError::NotFound(msg) => msg,
        }
    }
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            MonitorError::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Downstream notification could not be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// Egress buffer is full, message dropped
    Full,
    /// Publisher task is gone
    Closed,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Full => f.write_str("egress channel full"),
            PublishError::Closed => f.write_str("egress channel closed"),
        }
    }
}

impl std::error::Error for PublishError {}
