//! Error types for swmcp-core

use thiserror::Error;

use crate::descriptor::CapabilityClass;
use crate::provider::ProviderFault;
use crate::schema::ValidationError;

/// Catalog assembly failed
///
/// Raised once, when the router is built; a session never starts with an
/// inconsistent catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Two descriptors of one class share a name
    #[error("Duplicate {class} name '{name}'")]
    DuplicateName { class: CapabilityClass, name: String },

    /// Two readable items share a URI
    #[error("Duplicate readable item URI '{uri}'")]
    DuplicateUri { uri: String },

    /// A readable item was registered without a URI
    #[error("Readable item '{name}' has no URI")]
    MissingUri { name: String },
}

/// Why a request ended in a failure envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    MalformedRequest,
    Validation,
    UnknownOperation,
    Provider,
}

/// Recoverable dispatch faults
///
/// None of these ever escape the router; each becomes a failure envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unknown {}: {identifier}", .class.identifier_noun())]
    UnknownOperation {
        class: CapabilityClass,
        identifier: String,
    },

    #[error(transparent)]
    Provider(#[from] ProviderFault),
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::MalformedRequest(_) => FaultKind::MalformedRequest,
            Self::Validation(_) => FaultKind::Validation,
            Self::UnknownOperation { .. } | Self::Provider(ProviderFault::UnknownOperation(_)) => {
                FaultKind::UnknownOperation
            }
            Self::Provider(_) => FaultKind::Provider,
        }
    }
}

/// Channel failure; the only fault that ends a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to read from channel: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to write to channel: {0}")]
    Write(#[source] std::io::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
