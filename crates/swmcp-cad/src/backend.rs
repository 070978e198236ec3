//! CAD backend abstraction
//!
//! Everything that actually touches SolidWorks goes through [`CadBackend`].
//! The providers own retries, timeouts and size limits; a backend only
//! performs one call and reports whether a failure is worth retrying.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::BackendError;
use crate::formats::{ExportFormat, NativeKind};

/// One file conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: ExportFormat,
    pub kind: NativeKind,
    pub options: Map<String, Value>,
}

/// What a backend did with a [`ConversionJob`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    pub output_file: PathBuf,
    /// False when the backend only planned the conversion
    pub written: bool,
    pub message: String,
}

/// Result of probing the local SolidWorks installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationReport {
    pub solidworks_installed: bool,
    pub version: String,
    pub api_available: bool,
    pub installation_path: Option<PathBuf>,
    pub visible: bool,
}

/// Mass properties as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassProperties {
    pub mass_kg: f64,
    pub volume_m3: f64,
    pub surface_area_m2: f64,
}

/// Properties of one native document
///
/// Sections a backend cannot read are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub file_type: NativeKind,
    pub size_bytes: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub features: Option<Vec<String>>,
    pub mass_properties: Option<MassProperties>,
    pub materials: Option<Vec<String>>,
}

/// The external collaborator that performs CAD work
#[async_trait]
pub trait CadBackend: Send + Sync {
    /// Short identifier reported in results ("dry-run")
    fn name(&self) -> &str;

    /// Check whether SolidWorks and its API are usable
    async fn check_installation(&self) -> Result<InstallationReport, BackendError>;

    /// Convert one native document
    async fn convert(&self, job: &ConversionJob) -> Result<ConversionOutcome, BackendError>;

    /// Read the properties of one native document
    async fn inspect(&self, path: &Path, kind: NativeKind) -> Result<FileReport, BackendError>;
}

/// Backend that validates requests against the filesystem without
/// driving SolidWorks
///
/// Conversions are checked (input readable, output directory present)
/// and reported as planned; nothing is written. File inspection returns
/// filesystem metadata only.
#[derive(Debug, Clone)]
pub struct DryRunBackend {
    install_path: Option<PathBuf>,
    version: String,
    visible: bool,
}

impl DryRunBackend {
    pub fn new(install_path: Option<PathBuf>, version: impl Into<String>, visible: bool) -> Self {
        Self {
            install_path,
            version: version.into(),
            visible,
        }
    }
}

#[async_trait]
impl CadBackend for DryRunBackend {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn check_installation(&self) -> Result<InstallationReport, BackendError> {
        let installed = match &self.install_path {
            Some(path) => tokio::fs::try_exists(path).await?,
            None => false,
        };
        tracing::debug!(installed, path = ?self.install_path, "checked SolidWorks installation");

        Ok(InstallationReport {
            solidworks_installed: installed,
            version: self.version.clone(),
            // No automation bridge is available to this backend
            api_available: false,
            installation_path: self.install_path.clone(),
            visible: self.visible,
        })
    }

    async fn convert(&self, job: &ConversionJob) -> Result<ConversionOutcome, BackendError> {
        let metadata = tokio::fs::metadata(&job.input).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                BackendError::Permanent(format!("Input file not found: {}", job.input.display()))
            }
            _ => BackendError::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(BackendError::Permanent(format!(
                "Input is not a file: {}",
                job.input.display()
            )));
        }

        if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !tokio::fs::try_exists(parent).await? {
                return Err(BackendError::Permanent(format!(
                    "Output directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        tracing::info!(
            input = %job.input.display(),
            output = %job.output.display(),
            format = job.format.name(),
            "planned conversion (dry run)"
        );

        Ok(ConversionOutcome {
            output_file: job.output.clone(),
            written: false,
            message: format!(
                "Conversion to {} validated (dry run, no output written)",
                job.format
            ),
        })
    }

    async fn inspect(&self, path: &Path, kind: NativeKind) -> Result<FileReport, BackendError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                BackendError::Permanent(format!("File not found: {}", path.display()))
            }
            _ => BackendError::Io(e),
        })?;

        Ok(FileReport {
            file_type: kind,
            size_bytes: metadata.len(),
            created: metadata.created().ok().map(to_utc),
            modified: metadata.modified().ok().map(to_utc),
            features: None,
            mass_properties: None,
            materials: None,
        })
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(input: PathBuf, output: PathBuf) -> ConversionJob {
        ConversionJob {
            input,
            output,
            format: ExportFormat::Step,
            kind: NativeKind::Part,
            options: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_dry_run_convert_checks_paths() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bracket.sldprt");
        std::fs::write(&input, b"solid").unwrap();
        let backend = DryRunBackend::new(None, "2025", false);

        let ok = backend
            .convert(&job(input.clone(), dir.path().join("bracket.step")))
            .await
            .unwrap();
        assert!(!ok.written);
        assert!(!dir.path().join("bracket.step").exists());

        let missing = backend
            .convert(&job(dir.path().join("nope.sldprt"), dir.path().join("x.step")))
            .await
            .unwrap_err();
        assert!(missing.to_string().contains("Input file not found"));
        assert!(!missing.is_transient());

        let no_dir = backend
            .convert(&job(input, dir.path().join("missing").join("x.step")))
            .await
            .unwrap_err();
        assert!(no_dir.to_string().contains("Output directory does not exist"));
    }

    #[tokio::test]
    async fn test_dry_run_installation_and_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DryRunBackend::new(Some(dir.path().to_path_buf()), "2025", true);

        let report = backend.check_installation().await.unwrap();
        assert!(report.solidworks_installed);
        assert!(!report.api_available);
        assert!(report.visible);

        let absent = DryRunBackend::new(Some(dir.path().join("absent")), "2025", false);
        assert!(!absent.check_installation().await.unwrap().solidworks_installed);

        let file = dir.path().join("top.sldasm");
        std::fs::write(&file, vec![0u8; 2048]).unwrap();
        let info = backend.inspect(&file, NativeKind::Assembly).await.unwrap();
        assert_eq!(info.size_bytes, 2048);
        assert_eq!(info.file_type, NativeKind::Assembly);
        assert!(info.modified.is_some());
        assert!(info.features.is_none());
    }
}
