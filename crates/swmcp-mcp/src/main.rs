//! swmcp MCP Server Binary
//!
//! Serves the SolidWorks capabilities to an MCP host over stdio, or runs a
//! single command without a host.
//!
//! ## Usage
//!
//! ```bash
//! swmcp-mcp                                   # serve on stdio
//! swmcp-mcp catalog                           # print the announced catalog
//! swmcp-mcp convert bracket.sldprt --format stl
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use swmcp_cad::{ExportFormat, ServerConfig};
use swmcp_mcp::logging;

#[derive(Parser)]
#[command(name = "swmcp-mcp")]
#[command(about = "SolidWorks automation over the Model Context Protocol", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file (environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Force debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve an MCP host on stdin/stdout (default)
    Serve,

    /// Print the capability catalog as JSON
    Catalog,

    /// Convert one file through the router and print the result
    Convert {
        /// SolidWorks file to convert
        input: PathBuf,

        /// Output file (defaults to the input with the format's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (STEP, IGES, STL, PDF, DWG, DXF, OBJ, 3MF)
        #[arg(short, long, value_parser = parse_format)]
        format: Option<ExportFormat>,
    },
}

fn parse_format(s: &str) -> Result<ExportFormat, String> {
    ExportFormat::try_from(s.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if cli.debug {
        config.debug_mode = true;
    }
    let config = Arc::new(config);

    let _log_guard = logging::init(config.effective_log_level(), cli.log_file.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "swmcp MCP server listening on stdio");
            let summary = swmcp_mcp::serve_stdio(config).await?;
            tracing::info!(
                requests = summary.requests,
                invocations = summary.invocations,
                cancelled = summary.cancelled,
                abandoned = summary.abandoned,
                "host disconnected, shutting down"
            );
        }
        Commands::Catalog => {
            let catalog = swmcp_mcp::catalog_json(&config)?;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        Commands::Convert { input, output, format } => {
            let envelope = swmcp_mcp::convert_once(&config, &input, output.as_deref(), format).await?;
            println!("{}", serde_json::to_string_pretty(&envelope.to_wire())?);
            if let Some(message) = envelope.failure_message() {
                bail!("Conversion failed: {}", message);
            }
        }
    }

    Ok(())
}
