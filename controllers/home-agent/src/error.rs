//! Controller-specific error types.
//!
//! This module defines error types specific to the HomeAgent Controller
//! that are not covered by upstream library errors.

use kube_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the HomeAgent Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Resource store read or write failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Kubernetes client error (client construction, watches)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// HomeAgent spec cannot be acted upon
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Probe/metrics server I/O error
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
