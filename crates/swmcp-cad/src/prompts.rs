//! Prompt templates
//!
//! Each template is composed in a fixed order: the mandatory body, then
//! any optional sections, then the closing guidance.

use swmcp_core::{
    ArgumentSchema, Arguments, ArgumentsExt, CapabilityClass, CapabilityDescriptor, CapabilityProvider,
    FieldType, Payload, ProviderFault, async_trait,
};

const ANALYZE_BODY: &str = "
You are an expert CAD engineer analyzing a SolidWorks file. Please provide a comprehensive analysis of the CAD file located at: {file_path}

Please analyze the following aspects:

1. **File Properties**:
   - File type (part, assembly, drawing)
   - Creation and modification dates
   - File size and complexity
   - SolidWorks version compatibility

2. **Design Analysis**:
   - Overall design intent and purpose
   - Key features and modeling techniques used
   - Design complexity and sophistication level
   - Potential design improvements or optimizations

3. **Manufacturing Considerations**:
   - Manufacturability assessment
   - Recommended manufacturing processes
   - Material considerations
   - Tolerance and precision requirements

4. **Performance Evaluation**:
   - Structural integrity assessment
   - Potential stress concentration areas
   - Weight optimization opportunities
   - Assembly considerations (if applicable)

5. **Quality Assessment**:
   - Model quality and best practices adherence
   - Feature tree organization
   - Parametric design effectiveness
   - Documentation completeness
";

const FOCUS_DESIGN: &str = "
Focus particularly on:
- Design methodology and approach
- Feature modeling techniques
- Parametric relationships
- Design intent capture
- Aesthetic and functional considerations
";

const FOCUS_MANUFACTURING: &str = "
Focus particularly on:
- Manufacturing feasibility
- Recommended production methods
- Tooling requirements
- Material selection
- Cost optimization opportunities
- Quality control considerations
";

const FOCUS_PERFORMANCE: &str = "
Focus particularly on:
- Structural analysis potential
- Load-bearing capabilities
- Stress distribution patterns
- Fatigue considerations
- Safety factors
- Performance optimization suggestions
";

const ANALYZE_CLOSING: &str = "

Please provide your analysis in a structured format with clear headings and actionable insights. Include specific recommendations for improvements where applicable.
";

const EXPORT_BODY: &str = "
You are a CAD file format expert. A user needs to export a SolidWorks file for the following use case: {use_case}

";

const EXPORT_GUIDANCE: &str = "
Please recommend the optimal export format(s) and provide detailed guidance including:

1. **Primary Recommendation**:
   - Recommended file format
   - Specific version or standard (if applicable)
   - Key advantages for this use case

2. **Export Settings**:
   - Recommended quality/precision settings
   - Units and coordinate system
   - Special options to enable/disable
   - File size considerations

3. **Alternative Options**:
   - Secondary format recommendations
   - Trade-offs between different formats
   - Compatibility considerations

4. **Use Case Specific Guidance**:
   - Workflow integration tips
   - Common pitfalls to avoid
   - Quality verification steps
   - Post-processing recommendations

5. **Compatibility Notes**:
   - Software compatibility
   - Version considerations
   - Platform-specific issues
   - Industry standard compliance

Please provide specific, actionable recommendations with clear reasoning for your choices.
";

const TROUBLESHOOT_BODY: &str = "
You are a SolidWorks conversion troubleshooting expert. A user is experiencing the following error during file conversion:

**Error Message**: {error_message}

";

const TROUBLESHOOT_GUIDANCE: &str = "

Please provide comprehensive troubleshooting guidance including:

1. **Error Analysis**:
   - Root cause identification
   - Common scenarios that trigger this error
   - Severity assessment (critical, moderate, minor)

2. **Immediate Solutions**:
   - Step-by-step resolution instructions
   - Quick fixes to try first
   - Settings adjustments
   - Alternative approaches

3. **Preventive Measures**:
   - Best practices to avoid this error
   - Pre-conversion checks
   - File preparation recommendations
   - Quality assurance steps

4. **Advanced Troubleshooting**:
   - Advanced diagnostic techniques
   - SolidWorks API considerations
   - System-level factors
   - Hardware/software requirements

5. **Workarounds**:
   - Alternative conversion paths
   - Intermediate format options
   - Manual intervention steps
   - Third-party tool recommendations

6. **When to Escalate**:
   - Scenarios requiring technical support
   - Data backup recommendations
   - Professional service options

Please provide clear, actionable solutions prioritized by likelihood of success and ease of implementation.
";

/// Analysis focus for `analyze_cad_file`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisFocus {
    Design,
    Manufacturing,
    Performance,
}

impl AnalysisFocus {
    /// Case-insensitive; unrecognized values yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "design" => Some(Self::Design),
            "manufacturing" => Some(Self::Manufacturing),
            "performance" => Some(Self::Performance),
            _ => None,
        }
    }

    fn section(self) -> &'static str {
        match self {
            Self::Design => FOCUS_DESIGN,
            Self::Manufacturing => FOCUS_MANUFACTURING,
            Self::Performance => FOCUS_PERFORMANCE,
        }
    }
}

pub fn render_analyze_cad_file(file_path: &str, focus: Option<&str>) -> String {
    let mut prompt = ANALYZE_BODY.replace("{file_path}", file_path);
    match focus.map(|f| (f, AnalysisFocus::parse(f))) {
        Some((_, Some(focus))) => prompt.push_str(focus.section()),
        Some((raw, None)) => tracing::debug!(focus = raw, "ignoring unrecognized analysis focus"),
        None => {}
    }
    prompt.push_str(ANALYZE_CLOSING);
    prompt.trim().to_string()
}

pub fn render_suggest_export_format(use_case: &str, file_type: Option<&str>) -> String {
    let mut prompt = EXPORT_BODY.replace("{use_case}", use_case);
    if let Some(file_type) = file_type {
        prompt.push_str(&format!("The source file is a SolidWorks {}.\n\n", file_type));
    }
    prompt.push_str(EXPORT_GUIDANCE);
    prompt.trim().to_string()
}

pub fn render_troubleshoot_conversion(
    error_message: &str,
    source_format: Option<&str>,
    target_format: Option<&str>,
) -> String {
    let mut prompt = TROUBLESHOOT_BODY.replace("{error_message}", error_message);
    if let Some(source) = source_format {
        prompt.push_str(&format!("**Source Format**: {}\n", source));
    }
    if let Some(target) = target_format {
        prompt.push_str(&format!("**Target Format**: {}\n", target));
    }
    prompt.push_str(TROUBLESHOOT_GUIDANCE);
    prompt.trim().to_string()
}

/// An optional string argument; an empty string counts as not given
fn non_empty<'a>(arguments: &'a Arguments, name: &str) -> Result<Option<&'a str>, ProviderFault> {
    Ok(arguments.opt_str_arg(name)?.filter(|s| !s.is_empty()))
}

/// Serves the three CAD prompt templates
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateProvider;

impl TemplateProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CapabilityProvider for TemplateProvider {
    fn class(&self) -> CapabilityClass {
        CapabilityClass::Template
    }

    fn list_descriptors(&self) -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::new(
                "analyze_cad_file",
                "Analyze CAD file properties and provide insights",
            )
            .with_schema(
                ArgumentSchema::new()
                    .required("file_path", FieldType::String, "Path to the CAD file")
                    .optional(
                        "analysis_focus",
                        FieldType::String,
                        "Focus area for analysis (design, manufacturing, performance)",
                    ),
            ),
            CapabilityDescriptor::new(
                "suggest_export_format",
                "Suggest optimal export format based on use case",
            )
            .with_schema(
                ArgumentSchema::new()
                    .required(
                        "use_case",
                        FieldType::String,
                        "Intended use case (3D printing, simulation, sharing, etc.)",
                    )
                    .optional(
                        "file_type",
                        FieldType::String,
                        "Source file type (part, assembly, drawing)",
                    ),
            ),
            CapabilityDescriptor::new(
                "troubleshoot_conversion",
                "Help troubleshoot file conversion issues",
            )
            .with_schema(
                ArgumentSchema::new()
                    .required(
                        "error_message",
                        FieldType::String,
                        "Error message encountered during conversion",
                    )
                    .optional("source_format", FieldType::String, "Source file format")
                    .optional("target_format", FieldType::String, "Target export format"),
            ),
        ]
    }

    async fn invoke(&self, operation: &str, arguments: Arguments) -> Result<Payload, ProviderFault> {
        tracing::info!(prompt = operation, "rendering prompt");

        let text = match operation {
            "analyze_cad_file" => render_analyze_cad_file(
                arguments.str_arg("file_path")?,
                non_empty(&arguments, "analysis_focus")?,
            ),
            "suggest_export_format" => render_suggest_export_format(
                arguments.str_arg("use_case")?,
                non_empty(&arguments, "file_type")?,
            ),
            "troubleshoot_conversion" => render_troubleshoot_conversion(
                arguments.str_arg("error_message")?,
                non_empty(&arguments, "source_format")?,
                non_empty(&arguments, "target_format")?,
            ),
            other => return Err(ProviderFault::UnknownOperation(other.to_string())),
        };

        Ok(Payload::Text(text))
    }
}
