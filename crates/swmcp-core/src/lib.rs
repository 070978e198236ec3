//! swmcp core - capability registry and request dispatch
//!
//! This crate is the part of the swmcp server that knows nothing about
//! CAD. It provides:
//!
//! - Capability descriptors and argument schemas (`descriptor`, `schema`)
//! - The [`CapabilityProvider`] trait every provider implements
//! - A read-only [`Catalog`] assembled once from the registered providers
//! - The [`DispatchRouter`], which validates and routes invocations and
//!   always answers with exactly one [`ResponseEnvelope`]
//! - The [`SessionCoordinator`], which binds a router to one
//!   newline-delimited JSON-RPC channel (MCP over stdio) and answers with
//!   `rmcp::model` results and errors
//!
//! ## Flow
//!
//! 1. Providers are constructed and handed to [`DispatchRouter::new`]
//! 2. The session answers `initialize` and the `*/list` methods from the catalog
//! 3. Each `tools/call`, `resources/read` or `prompts/get` is dispatched on
//!    its own task and answered when it completes

pub mod catalog;
pub mod descriptor;
pub mod envelope;
pub mod protocol;
pub mod provider;
pub mod router;
pub mod schema;
pub mod session;

mod error;

pub use catalog::{Catalog, CatalogAnnouncement, CatalogEntry};
pub use descriptor::{CapabilityClass, CapabilityDescriptor, ItemAddress};
pub use envelope::ResponseEnvelope;
pub use error::{CatalogError, Fault, FaultKind, SessionError};
pub use protocol::implementation;
pub use provider::{Arguments, ArgumentsExt, CapabilityProvider, Payload, ProviderFault};
pub use router::{DispatchRouter, DispatchStage, InvocationRequest};
pub use schema::{ArgumentSchema, FieldSpec, FieldType, Requirement, ValidationError};
pub use session::{SessionCoordinator, SessionSummary};

// Re-exported so providers don't need their own dependency
pub use async_trait::async_trait;
pub use rmcp::model::{ErrorCode, ErrorData, Implementation};
