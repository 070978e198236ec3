//! swmcp-cad - SolidWorks capability providers
//!
//! The three providers registered with the swmcp dispatch router:
//!
//! - [`ActionProvider`]: conversion, analysis, batch conversion,
//!   installation checks and the format listing
//! - [`ResourceProvider`]: the `cad://` status, format, preset and
//!   statistics documents
//! - [`TemplateProvider`]: the analysis, export and troubleshooting prompts
//!
//! CAD work is delegated to a [`CadBackend`]. Operation counters are
//! shared between the action and resource providers through one
//! [`OperationStats`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use swmcp_cad::{ServerConfig, build_providers, dry_run_backend};
//! use swmcp_core::{CapabilityClass, DispatchRouter};
//!
//! let config = Arc::new(ServerConfig::default());
//! let providers = build_providers(Arc::clone(&config), dry_run_backend(&config));
//! let router = DispatchRouter::new(providers).unwrap();
//! assert_eq!(router.catalog().len(CapabilityClass::Action), 5);
//! ```

pub mod actions;
pub mod backend;
pub mod config;
pub mod formats;
pub mod prompts;
pub mod resources;
pub mod stats;

mod error;

use std::sync::Arc;

use swmcp_core::CapabilityProvider;

pub use actions::{ActionProvider, CallPolicy};
pub use backend::{CadBackend, ConversionJob, ConversionOutcome, DryRunBackend, FileReport, InstallationReport};
pub use config::ServerConfig;
pub use error::BackendError;
pub use formats::{ExportFormat, FormatTable, ImportFormat, NativeKind};
pub use prompts::TemplateProvider;
pub use resources::ResourceProvider;
pub use stats::{OperationStats, StatsSnapshot};

/// The backend shipped with the server, configured from `config`
pub fn dry_run_backend(config: &ServerConfig) -> Arc<dyn CadBackend> {
    Arc::new(DryRunBackend::new(
        config.solidworks_install_path.clone(),
        config.solidworks_version.clone(),
        config.solidworks_visible,
    ))
}

/// Construct the action, readable-item and template providers over one
/// backend and one set of counters
pub fn build_providers(config: Arc<ServerConfig>, backend: Arc<dyn CadBackend>) -> Vec<Arc<dyn CapabilityProvider>> {
    let stats = Arc::new(OperationStats::new());

    vec![
        Arc::new(ActionProvider::new(
            Arc::clone(&backend),
            Arc::clone(&stats),
            Arc::clone(&config),
        )),
        Arc::new(ResourceProvider::new(backend, stats, config)),
        Arc::new(TemplateProvider::new()),
    ]
}
