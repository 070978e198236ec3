//! CAD actions
//!
//! Conversion, analysis, batch conversion, installation checks and the
//! format listing. Every call into the [`CadBackend`] goes through a
//! [`CallPolicy`], which bounds it with a timeout and retries transient
//! failures.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Map, Value, json};
use swmcp_core::{
    ArgumentSchema, Arguments, ArgumentsExt, CapabilityClass, CapabilityDescriptor, CapabilityProvider,
    FieldType, Payload, ProviderFault, async_trait,
};

use crate::backend::{CadBackend, ConversionJob, ConversionOutcome, FileReport};
use crate::config::ServerConfig;
use crate::error::BackendError;
use crate::formats::{ExportFormat, FormatTable, ImportFormat, NativeKind};
use crate::stats::OperationStats;

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

const DEFAULT_BATCH_PATTERN: &str = "*.sld*";

/// Timeout and retry rules for backend calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    /// Attempts after the first one, transient failures only
    pub retry_attempts: u32,
}

impl CallPolicy {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            timeout: config.timeout(),
            retry_attempts: config.solidworks_retry_attempts,
        }
    }

    /// Run `call` until it succeeds, fails permanently, times out or
    /// runs out of attempts
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            let err = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => return Err(BackendError::Timeout(self.timeout)),
            };

            if !err.is_transient() || attempt > self.retry_attempts {
                return Err(err);
            }

            tracing::warn!(operation = label, attempt, "transient backend failure, retrying: {}", err);
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            attempt += 1;
        }
    }
}

/// Which sections `analyze_file` reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnalysisType {
    Properties,
    Features,
    Mass,
    Materials,
    All,
}

impl AnalysisType {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "properties" => Some(Self::Properties),
            "features" => Some(Self::Features),
            "mass" => Some(Self::Mass),
            "materials" => Some(Self::Materials),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn includes(self, section: Self) -> bool {
        self == Self::All || self == section
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatListing {
    Import,
    Export,
    All,
}

impl FormatListing {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "import" => Some(Self::Import),
            "export" => Some(Self::Export),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Export => "export",
            Self::All => "all",
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchFailure {
    file: String,
    error: String,
}

/// Serves the five CAD actions
pub struct ActionProvider {
    backend: Arc<dyn CadBackend>,
    stats: Arc<OperationStats>,
    config: Arc<ServerConfig>,
    policy: CallPolicy,
}

impl ActionProvider {
    pub fn new(backend: Arc<dyn CadBackend>, stats: Arc<OperationStats>, config: Arc<ServerConfig>) -> Self {
        let policy = CallPolicy::from_config(&config);
        Self {
            backend,
            stats,
            config,
            policy,
        }
    }

    async fn convert_file(&self, args: &Arguments) -> Result<Payload, ProviderFault> {
        let input = args.str_arg("input_file_path")?;
        let output = args.str_arg("output_file_path")?;
        let format = parse_export_format(args.opt_str_arg("export_format")?, self.config.default_export_format)?;
        let options = args.opt_object_arg("export_options")?.cloned().unwrap_or_default();

        let outcome = self
            .convert_one(PathBuf::from(input), PathBuf::from(output), format, &options)
            .await?;

        Ok(Payload::Json(json!({
            "status": "success",
            "input_file": input,
            "output_file": outcome.output_file,
            "format": format.name(),
            "options": options,
            "backend": self.backend.name(),
            "written": outcome.written,
            "message": outcome.message,
        })))
    }

    /// Check, convert and record one file
    async fn convert_one(
        &self,
        input: PathBuf,
        output: PathBuf,
        format: ExportFormat,
        options: &Map<String, Value>,
    ) -> Result<ConversionOutcome, ProviderFault> {
        let kind = NativeKind::from_path(&input).ok_or_else(|| {
            ProviderFault::failed(format!(
                "Unsupported file type: {} (expected .sldprt, .sldasm or .slddrw)",
                input.display()
            ))
        })?;

        let result = self.convert_checked(input, output, format, kind, options).await;
        self.stats.record_conversion(format, kind, result.is_ok());
        result
    }

    async fn convert_checked(
        &self,
        input: PathBuf,
        output: PathBuf,
        format: ExportFormat,
        kind: NativeKind,
        options: &Map<String, Value>,
    ) -> Result<ConversionOutcome, ProviderFault> {
        self.check_size(&input).await?;

        let job = ConversionJob {
            input,
            output,
            format,
            kind,
            options: options.clone(),
        };

        let started = Instant::now();
        let backend = Arc::clone(&self.backend);
        let outcome = self
            .policy
            .run("convert_file", || {
                let backend = Arc::clone(&backend);
                let job = job.clone();
                async move { backend.convert(&job).await }
            })
            .await?;

        tracing::info!(
            input = %job.input.display(),
            format = format.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "conversion finished"
        );
        Ok(outcome)
    }

    async fn check_size(&self, path: &Path) -> Result<(), ProviderFault> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ProviderFault::failed(format!("Input file not found: {}", path.display()))
            }
            _ => ProviderFault::from(e),
        })?;

        let limit = self.config.max_file_size_bytes();
        if metadata.len() > limit {
            return Err(ProviderFault::failed(format!(
                "File too large: {} is {} bytes (limit {} MB)",
                path.display(),
                metadata.len(),
                self.config.max_file_size_mb
            )));
        }
        Ok(())
    }

    async fn analyze_file(&self, args: &Arguments) -> Result<Payload, ProviderFault> {
        let file_path = args.str_arg("file_path")?;
        let raw_type = args.opt_str_arg("analysis_type")?.unwrap_or("all");
        let analysis = AnalysisType::parse(raw_type).ok_or_else(|| {
            ProviderFault::invalid(
                "analysis_type",
                format!("'{}' is not one of properties, features, mass, materials, all", raw_type),
            )
        })?;

        let path = PathBuf::from(file_path);
        let kind = NativeKind::from_path(&path).ok_or_else(|| {
            ProviderFault::failed(format!("Unsupported file type: {}", path.display()))
        })?;

        let backend = Arc::clone(&self.backend);
        let report = self
            .policy
            .run("analyze_file", || {
                let backend = Arc::clone(&backend);
                let path = path.clone();
                async move { backend.inspect(&path, kind).await }
            })
            .await?;
        self.stats.record_analysis(kind);

        Ok(Payload::Json(analysis_report(file_path, raw_type, analysis, &report)))
    }

    async fn batch_convert(&self, args: &Arguments) -> Result<Payload, ProviderFault> {
        let input_dir = args.str_arg("input_directory")?;
        let output_dir = args.str_arg("output_directory")?;
        let format = parse_export_format(args.opt_str_arg("export_format")?, self.config.default_export_format)?;
        let pattern = args.opt_str_arg("file_pattern")?.unwrap_or(DEFAULT_BATCH_PATTERN);

        let files = scan_directory(Path::new(input_dir), pattern).await?;
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            ProviderFault::failed(format!("Failed to create output directory {}: {}", output_dir, e))
        })?;

        tracing::info!(
            input = input_dir,
            matched = files.len(),
            batch_size = self.config.solidworks_batch_size,
            "starting batch conversion"
        );

        let options = Map::new();
        let mut converted = Vec::new();
        let mut failures = Vec::new();

        for chunk in files.chunks(self.config.solidworks_batch_size.max(1)) {
            let jobs = chunk.iter().map(|input| {
                let output = Path::new(output_dir).join(output_name(input, format));
                self.convert_one(input.clone(), output, format, &options)
            });
            let results = futures::future::join_all(jobs).await;

            for (input, result) in chunk.iter().zip(results) {
                let name = file_name(input);
                match result {
                    Ok(_) => converted.push(format!("{} -> {}", name, output_name(input, format))),
                    Err(e) => {
                        tracing::warn!(file = %name, "batch item failed: {}", e);
                        failures.push(BatchFailure {
                            file: name,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
        self.stats.record_batch();

        let status = match (converted.len(), failures.len()) {
            (_, 0) => "success",
            (0, _) => "failed",
            _ => "partial",
        };

        Ok(Payload::Json(json!({
            "status": status,
            "input_directory": input_dir,
            "output_directory": output_dir,
            "format": format.name(),
            "pattern": pattern,
            "files_processed": files.len(),
            "files_successful": converted.len(),
            "files_failed": failures.len(),
            "converted_files": converted,
            "failed_files": failures,
        })))
    }

    async fn validate_installation(&self) -> Result<Payload, ProviderFault> {
        let backend = Arc::clone(&self.backend);
        let report = self
            .policy
            .run("validate_solidworks_installation", || {
                let backend = Arc::clone(&backend);
                async move { backend.check_installation().await }
            })
            .await?;

        Ok(Payload::Json(json!({
            "status": "success",
            "backend": self.backend.name(),
            "solidworks_installed": report.solidworks_installed,
            "version": report.version,
            "api_available": report.api_available,
            "installation_path": report.installation_path,
            "visible": report.visible,
            "supported_formats": {
                "import": ImportFormat::ALL.iter().map(ImportFormat::name).collect::<Vec<_>>(),
                "export": ExportFormat::ALL.iter().map(ExportFormat::name).collect::<Vec<_>>(),
            },
        })))
    }

    fn supported_formats(args: &Arguments) -> Result<Payload, ProviderFault> {
        let raw = args.opt_str_arg("format_type")?.unwrap_or("all");
        let listing = FormatListing::parse(raw).ok_or_else(|| {
            ProviderFault::invalid("format_type", format!("'{}' is not one of import, export, all", raw))
        })?;

        let table = FormatTable::new();
        let mut result = json!({
            "status": "success",
            "format_type": listing.as_str(),
        });
        if matches!(listing, FormatListing::Import | FormatListing::All) {
            result["import_formats"] = serde_json::to_value(&table.import_formats)
                .map_err(|e| ProviderFault::failed(format!("Failed to encode result: {}", e)))?;
        }
        if matches!(listing, FormatListing::Export | FormatListing::All) {
            result["export_formats"] = serde_json::to_value(&table.export_formats)
                .map_err(|e| ProviderFault::failed(format!("Failed to encode result: {}", e)))?;
        }
        Ok(Payload::Json(result))
    }
}

fn parse_export_format(raw: Option<&str>, default: ExportFormat) -> Result<ExportFormat, ProviderFault> {
    match raw {
        None => Ok(default),
        Some(raw) => ExportFormat::try_from(raw.to_string()).map_err(ProviderFault::Failed),
    }
}

fn analysis_report(file_path: &str, raw_type: &str, analysis: AnalysisType, report: &FileReport) -> Value {
    let mut result = json!({
        "status": "success",
        "file_path": file_path,
        "analysis_type": raw_type,
        "file_type": report.file_type,
    });

    // Sections the backend could not read are reported as null
    if analysis.includes(AnalysisType::Properties) {
        result["properties"] = json!({
            "size_bytes": report.size_bytes,
            "created": report.created,
            "modified": report.modified,
        });
    }
    if analysis.includes(AnalysisType::Features) {
        result["features"] = json!(report.features);
    }
    if analysis.includes(AnalysisType::Mass) {
        result["mass_properties"] = json!(report.mass_properties);
    }
    if analysis.includes(AnalysisType::Materials) {
        result["materials"] = json!(report.materials);
    }
    result
}

/// Native files directly inside `dir` whose names match `pattern`, sorted
async fn scan_directory(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ProviderFault> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ProviderFault::failed(format!("Input directory not found: {}", dir.display()))
        }
        _ => ProviderFault::from(e),
    })?;

    let pattern = pattern.to_lowercase();
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let name = file_name(&path).to_lowercase();
        if NativeKind::from_path(&path).is_some() && wildcard_match(&pattern, &name) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn output_name(input: &Path, format: ExportFormat) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}.{}", stem, format.extension())
}

/// Shell-style match: `*` is any run of characters, `?` exactly one
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Last `*` seen and the text position it is currently absorbing up to
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    p = star + 1;
                    t = absorbed + 1;
                    backtrack = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[async_trait]
impl CapabilityProvider for ActionProvider {
    fn class(&self) -> CapabilityClass {
        CapabilityClass::Action
    }

    fn list_descriptors(&self) -> Vec<CapabilityDescriptor> {
        let default_format = Value::String(self.config.default_export_format.name().to_string());

        vec![
            CapabilityDescriptor::new(
                "convert_file",
                "Convert SolidWorks file to specified format (STEP, IGES, STL, etc.)",
            )
            .with_schema(
                ArgumentSchema::new()
                    .required(
                        "input_file_path",
                        FieldType::String,
                        "Path to the SolidWorks file to convert",
                    )
                    .required(
                        "output_file_path",
                        FieldType::String,
                        "Path for the converted output file",
                    )
                    .with_default(
                        "export_format",
                        FieldType::String,
                        "Export format (STEP, IGES, STL, PDF, etc.)",
                        default_format.clone(),
                    )
                    .with_default(
                        "export_options",
                        FieldType::Object,
                        "Additional export options (optional)",
                        Value::Object(Map::new()),
                    ),
            ),
            CapabilityDescriptor::new(
                "analyze_file",
                "Analyze SolidWorks file and extract properties, features, and metadata",
            )
            .with_schema(
                ArgumentSchema::new()
                    .required(
                        "file_path",
                        FieldType::String,
                        "Path to the SolidWorks file to analyze",
                    )
                    .with_default(
                        "analysis_type",
                        FieldType::String,
                        "Type of analysis (properties, features, mass, materials, all)",
                        json!("all"),
                    ),
            ),
            CapabilityDescriptor::new("batch_convert", "Convert multiple SolidWorks files in batch").with_schema(
                ArgumentSchema::new()
                    .required(
                        "input_directory",
                        FieldType::String,
                        "Directory containing SolidWorks files",
                    )
                    .required(
                        "output_directory",
                        FieldType::String,
                        "Directory for converted files",
                    )
                    .with_default(
                        "export_format",
                        FieldType::String,
                        "Export format for all files",
                        default_format,
                    )
                    .with_default(
                        "file_pattern",
                        FieldType::String,
                        "File pattern to match (e.g., '*.sldprt', '*.sldasm')",
                        json!(DEFAULT_BATCH_PATTERN),
                    ),
            ),
            CapabilityDescriptor::new(
                "validate_solidworks_installation",
                "Validate SolidWorks installation and API availability",
            ),
            CapabilityDescriptor::new(
                "get_supported_formats",
                "Get list of supported import/export formats",
            )
            .with_schema(ArgumentSchema::new().with_default(
                "format_type",
                FieldType::String,
                "Type of formats (import, export, all)",
                json!("all"),
            )),
        ]
    }

    async fn invoke(&self, operation: &str, arguments: Arguments) -> Result<Payload, ProviderFault> {
        tracing::info!(operation, "executing action");

        match operation {
            "convert_file" => self.convert_file(&arguments).await,
            "analyze_file" => self.analyze_file(&arguments).await,
            "batch_convert" => self.batch_convert(&arguments).await,
            "validate_solidworks_installation" => self.validate_installation().await,
            "get_supported_formats" => Self::supported_formats(&arguments),
            other => Err(ProviderFault::UnknownOperation(other.to_string())),
        }
    }
}
