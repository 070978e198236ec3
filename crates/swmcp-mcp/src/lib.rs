//! swmcp MCP server
//!
//! Builds the dispatch router from a [`ServerConfig`] and binds it to a
//! session. The binary serves stdio; the helpers here are also used for
//! the one-shot `catalog` and `convert` commands.
//!
//! ## Usage
//!
//! Add to an MCP host's configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "solidworks": {
//!       "command": "swmcp-mcp",
//!       "args": ["serve", "--config", "swmcp.json"]
//!     }
//!   }
//! }
//! ```

pub mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::model::Implementation;
use serde_json::json;
use swmcp_cad::{CadBackend, ExportFormat, ServerConfig, build_providers, dry_run_backend};
use swmcp_core::{
    CapabilityClass, DispatchRouter, InvocationRequest, ResponseEnvelope, SessionCoordinator, SessionSummary,
};

pub const SERVER_NAME: &str = "swmcp";

const INSTRUCTIONS: &str = "Tools convert and analyze SolidWorks parts, assemblies and drawings. \
Read cad://formats/supported before choosing an export format, and cad://system/status to check \
whether SolidWorks is available.";

pub fn server_info() -> Implementation {
    Implementation {
        name: SERVER_NAME.to_string(),
        title: Some("SolidWorks MCP Server".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        icons: None,
        website_url: None,
    }
}

/// Router over the CAD providers, backed by the dry-run backend
pub fn build_router(config: &Arc<ServerConfig>) -> Result<DispatchRouter> {
    build_router_with(config, dry_run_backend(config))
}

pub fn build_router_with(config: &Arc<ServerConfig>, backend: Arc<dyn CadBackend>) -> Result<DispatchRouter> {
    DispatchRouter::new(build_providers(Arc::clone(config), backend)).context("Failed to assemble capability catalog")
}

/// Session bound to the configured concurrency limit
pub fn build_session(config: &Arc<ServerConfig>, router: DispatchRouter) -> SessionCoordinator {
    SessionCoordinator::new(router, server_info())
        .with_instructions(INSTRUCTIONS)
        .with_max_in_flight(config.max_concurrent_operations)
}

/// Serve one MCP host over stdin/stdout until it disconnects
pub async fn serve_stdio(config: Arc<ServerConfig>) -> Result<SessionSummary> {
    let router = build_router(&config)?;
    tracing::info!(
        tools = router.catalog().len(CapabilityClass::Action),
        resources = router.catalog().len(CapabilityClass::ReadableItem),
        prompts = router.catalog().len(CapabilityClass::Template),
        "catalog ready"
    );

    let session = build_session(&config, router);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let summary = session
        .run(stdin, tokio::io::stdout())
        .await
        .context("MCP session failed")?;
    Ok(summary)
}

/// The catalog as announced to hosts, for `swmcp-mcp catalog`
pub fn catalog_json(config: &Arc<ServerConfig>) -> Result<serde_json::Value> {
    let router = build_router(config)?;
    serde_json::to_value(router.catalog().announcement()).context("Failed to encode catalog")
}

/// Output path for a conversion when none was given: the input with the
/// format's extension
pub fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    input.with_extension(format.extension())
}

/// Run `convert_file` once through the router, without a host
pub async fn convert_once(
    config: &Arc<ServerConfig>,
    input: &Path,
    output: Option<&Path>,
    format: Option<ExportFormat>,
) -> Result<ResponseEnvelope> {
    let format = format.unwrap_or(config.default_export_format);
    let output = output.map_or_else(|| default_output_path(input, format), Path::to_path_buf);

    let mut arguments = serde_json::Map::new();
    arguments.insert("input_file_path".to_string(), json!(input));
    arguments.insert("output_file_path".to_string(), json!(output));
    arguments.insert("export_format".to_string(), json!(format.name()));
    let request = InvocationRequest::new(CapabilityClass::Action, "convert_file", arguments);

    let router = build_router(config)?;
    Ok(router.dispatch(request).await)
}
