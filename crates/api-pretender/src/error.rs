//! Error types for mock construction and lifecycle.

use thiserror::Error;

/// Failures surfaced to the caller of the programmatic API.
///
/// Validation failures are never returned here; they go to the reporter.
#[derive(Debug, Error)]
pub enum MockError {
    #[error("Failed to bind loopback listener: {0}")]
    Bind(#[source] std::io::Error),
    #[error("Failed to start mock server runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("Failed to read mock config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON mock config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML mock config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
