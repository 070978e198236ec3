//! Scripted backend and router helpers shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::Value;
use swmcp_cad::{
    BackendError, CadBackend, ConversionJob, ConversionOutcome, FileReport, InstallationReport, NativeKind,
    ServerConfig, build_providers,
};
use swmcp_core::{Arguments, DispatchRouter, async_trait};

/// Backend whose failures and latency are set by the test
#[derive(Default)]
pub struct ScriptedBackend {
    /// Transient failures to report before conversions start succeeding
    pub transient_failures: AtomicU32,
    /// Latency added to every conversion
    pub delay: Option<Duration>,
    /// File names (not paths) that always fail permanently
    pub broken: Vec<String>,
    pub convert_calls: AtomicU32,
}

impl ScriptedBackend {
    pub fn flaky(failures: u32) -> Self {
        Self {
            transient_failures: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.convert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CadBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn check_installation(&self) -> Result<InstallationReport, BackendError> {
        Ok(InstallationReport {
            solidworks_installed: true,
            version: "2025".to_string(),
            api_available: true,
            installation_path: Some(PathBuf::from("/opt/solidworks")),
            visible: false,
        })
    }

    async fn convert(&self, job: &ConversionJob) -> Result<ConversionOutcome, BackendError> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BackendError::Transient("SolidWorks is busy".to_string()));
        }

        let name = job
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.broken.contains(&name) {
            return Err(BackendError::Permanent(format!("Rebuild errors in {}", name)));
        }

        Ok(ConversionOutcome {
            output_file: job.output.clone(),
            written: true,
            message: format!("File converted successfully to {}", job.format),
        })
    }

    async fn inspect(&self, path: &Path, kind: NativeKind) -> Result<FileReport, BackendError> {
        Ok(FileReport {
            file_type: kind,
            size_bytes: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            created: None,
            modified: None,
            features: Some(vec!["Boss-Extrude1".to_string(), "Fillet1".to_string()]),
            mass_properties: None,
            materials: Some(vec!["AISI 304".to_string()]),
        })
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        solidworks_timeout: 2,
        solidworks_retry_attempts: 2,
        solidworks_batch_size: 2,
        ..ServerConfig::default()
    }
}

pub fn router_with(config: ServerConfig, backend: Arc<ScriptedBackend>) -> DispatchRouter {
    DispatchRouter::new(build_providers(Arc::new(config), backend)).unwrap()
}

pub fn router(backend: Arc<ScriptedBackend>) -> DispatchRouter {
    router_with(test_config(), backend)
}

pub fn args(value: Value) -> Arguments {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object arguments, got {}", other),
    }
}

/// Write `len` bytes to `dir/name` and return the path as a string
pub fn touch(dir: &Path, name: &str, len: usize) -> String {
    let path = dir.join(name);
    std::fs::write(&path, vec![0u8; len]).unwrap();
    path.to_string_lossy().into_owned()
}
