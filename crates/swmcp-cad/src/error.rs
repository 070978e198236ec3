//! Error types for swmcp-cad

use std::time::Duration;

use swmcp_core::ProviderFault;
use thiserror::Error;

/// Errors reported by a [`CadBackend`](crate::backend::CadBackend)
#[derive(Error, Debug)]
pub enum BackendError {
    /// Worth retrying (application busy, automation server not ready)
    #[error("CAD backend temporarily unavailable: {0}")]
    Transient(String),

    /// Retrying will not help
    #[error("{0}")]
    Permanent(String),

    /// A single backend call exceeded the configured timeout
    #[error("CAD backend timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<BackendError> for ProviderFault {
    fn from(e: BackendError) -> Self {
        ProviderFault::failed(e)
    }
}
