//! Readable items
//!
//! Four JSON documents addressed by `cad://` URIs. Status and statistics
//! are computed on every read; the format table and export presets are
//! fixed.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use swmcp_core::{
    Arguments, CapabilityClass, CapabilityDescriptor, CapabilityProvider, Payload, ProviderFault, async_trait,
};

use crate::backend::CadBackend;
use crate::config::ServerConfig;
use crate::formats::FormatTable;
use crate::stats::OperationStats;

pub const STATUS_URI: &str = "cad://system/status";
pub const FORMATS_URI: &str = "cad://formats/supported";
pub const EXPORT_OPTIONS_URI: &str = "cad://templates/export-options";
pub const STATISTICS_URI: &str = "cad://statistics/recent-operations";

const JSON: &str = "application/json";

/// Serves the `cad://` readable items
pub struct ResourceProvider {
    backend: Arc<dyn CadBackend>,
    stats: Arc<OperationStats>,
    config: Arc<ServerConfig>,
}

impl ResourceProvider {
    pub fn new(backend: Arc<dyn CadBackend>, stats: Arc<OperationStats>, config: Arc<ServerConfig>) -> Self {
        Self {
            backend,
            stats,
            config,
        }
    }

    async fn system_status(&self) -> Value {
        let now = Utc::now();
        let uptime = (now - self.stats.started()).num_seconds().max(0);

        let mut status = json!({
            "backend": self.backend.name(),
            "configured_version": format!("SolidWorks {}", self.config.solidworks_version),
            "visible": self.config.solidworks_visible,
            "max_concurrent_operations": self.config.max_concurrent_operations,
            "uptime_seconds": uptime,
            "last_updated": now.to_rfc3339(),
        });

        // A failed installation check is part of the status, not a read failure
        match self.backend.check_installation().await {
            Ok(report) => {
                status["solidworks_installed"] = Value::Bool(report.solidworks_installed);
                status["api_connected"] = Value::Bool(report.api_available);
                status["version"] = Value::String(format!("SolidWorks {}", report.version));
                status["installation_path"] = json!(report.installation_path);
            }
            Err(e) => {
                tracing::warn!("installation check failed: {}", e);
                status["solidworks_installed"] = Value::Bool(false);
                status["api_connected"] = Value::Bool(false);
                status["installation_error"] = Value::String(e.to_string());
            }
        }
        status
    }
}

fn export_option_presets() -> Value {
    json!({
        "step": {
            "high_quality": {
                "units": "millimeters",
                "precision": "high",
                "include_surfaces": true,
                "include_curves": true
            },
            "standard": {
                "units": "millimeters",
                "precision": "medium",
                "include_surfaces": true,
                "include_curves": false
            }
        },
        "stl": {
            "high_resolution": {
                "units": "millimeters",
                "resolution": "fine",
                "angular_tolerance": 0.1,
                "chord_tolerance": 0.01
            },
            "3d_printing": {
                "units": "millimeters",
                "resolution": "medium",
                "angular_tolerance": 0.5,
                "chord_tolerance": 0.1
            }
        },
        "pdf": {
            "technical_drawing": {
                "page_size": "A4",
                "orientation": "landscape",
                "include_dimensions": true,
                "include_annotations": true,
                "quality": "high"
            },
            "presentation": {
                "page_size": "A4",
                "orientation": "portrait",
                "include_dimensions": false,
                "include_annotations": false,
                "quality": "medium"
            }
        }
    })
}

#[async_trait]
impl CapabilityProvider for ResourceProvider {
    fn class(&self) -> CapabilityClass {
        CapabilityClass::ReadableItem
    }

    fn list_descriptors(&self) -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::new(
                "CAD System Status",
                "Current status of SolidWorks installation and API",
            )
            .at_uri(STATUS_URI, JSON),
            CapabilityDescriptor::new(
                "Supported File Formats",
                "List of supported import/export file formats",
            )
            .at_uri(FORMATS_URI, JSON),
            CapabilityDescriptor::new(
                "Export Options Templates",
                "Predefined export option templates for different formats",
            )
            .at_uri(EXPORT_OPTIONS_URI, JSON),
            CapabilityDescriptor::new(
                "Recent Operations Statistics",
                "Statistics about recent file operations and conversions",
            )
            .at_uri(STATISTICS_URI, JSON),
        ]
    }

    async fn invoke(&self, operation: &str, _arguments: Arguments) -> Result<Payload, ProviderFault> {
        tracing::info!(uri = operation, "reading resource");

        match operation {
            STATUS_URI => Ok(Payload::Json(self.system_status().await)),
            FORMATS_URI => Payload::json(&FormatTable::new()),
            EXPORT_OPTIONS_URI => Ok(Payload::Json(export_option_presets())),
            STATISTICS_URI => Payload::json(&self.stats.snapshot()),
            other => Err(ProviderFault::UnknownOperation(other.to_string())),
        }
    }
}
