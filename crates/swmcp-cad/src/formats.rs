//! File format tables
//!
//! SolidWorks reads three native document types and exchanges geometry
//! through a fixed set of neutral formats. Names are matched
//! case-insensitively everywhere.

use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Formats a SolidWorks document can be exported to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(into = "&'static str")]
pub enum ExportFormat {
    /// STEP (ISO 10303)
    #[default]
    Step,
    /// IGES
    Iges,
    /// STL (stereolithography, for 3D printing)
    Stl,
    /// PDF document
    Pdf,
    /// AutoCAD drawing
    Dwg,
    /// Drawing exchange format
    Dxf,
    /// Wavefront OBJ
    Obj,
    /// 3D Manufacturing Format
    ThreeMf,
}

impl ExportFormat {
    pub const ALL: [Self; 8] = [
        Self::Step,
        Self::Iges,
        Self::Stl,
        Self::Pdf,
        Self::Dwg,
        Self::Dxf,
        Self::Obj,
        Self::ThreeMf,
    ];

    /// Canonical upper-case name ("STEP", "3MF")
    pub fn name(&self) -> &'static str {
        match self {
            Self::Step => "STEP",
            Self::Iges => "IGES",
            Self::Stl => "STL",
            Self::Pdf => "PDF",
            Self::Dwg => "DWG",
            Self::Dxf => "DXF",
            Self::Obj => "OBJ",
            Self::ThreeMf => "3MF",
        }
    }

    /// File extension written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Iges => "iges",
            Self::Stl => "stl",
            Self::Pdf => "pdf",
            Self::Dwg => "dwg",
            Self::Dxf => "dxf",
            Self::Obj => "obj",
            Self::ThreeMf => "3mf",
        }
    }

    /// Parse a format name or extension
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "step" | "stp" => Some(Self::Step),
            "iges" | "igs" => Some(Self::Iges),
            "stl" => Some(Self::Stl),
            "pdf" => Some(Self::Pdf),
            "dwg" => Some(Self::Dwg),
            "dxf" => Some(Self::Dxf),
            "obj" => Some(Self::Obj),
            "3mf" => Some(Self::ThreeMf),
            _ => None,
        }
    }

    /// Comma-separated list of every name, for error messages
    pub fn supported_list() -> String {
        Self::ALL.map(|f| f.name()).join(", ")
    }

    fn info(self) -> FormatInfo {
        let (description, detail) = match self {
            Self::Step => ("STEP Files", Detail::Version("AP214/AP203")),
            Self::Iges => ("IGES Files", Detail::Version("2014")),
            Self::Stl => ("STL Files", Detail::Kind("mesh")),
            Self::Pdf => ("PDF Documents", Detail::Kind("document")),
            Self::Dwg => ("AutoCAD Drawing", Detail::Version("2024")),
            Self::Dxf => ("Drawing Exchange Format", Detail::Version("2024")),
            Self::Obj => ("Wavefront OBJ", Detail::Kind("mesh")),
            Self::ThreeMf => ("3D Manufacturing Format", Detail::Version("1.0")),
        };
        FormatInfo::new(self.extension(), description, detail)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for ExportFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| {
            format!(
                "Unsupported export format '{}'. Supported: {}",
                value,
                Self::supported_list()
            )
        })
    }
}

impl From<ExportFormat> for &'static str {
    fn from(format: ExportFormat) -> Self {
        format.name()
    }
}

impl<'de> serde::Deserialize<'de> for ExportFormat {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Neutral formats SolidWorks can open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Step,
    Iges,
    Stl,
    Obj,
    ThreeMf,
    Ply,
}

impl ImportFormat {
    pub const ALL: [Self; 6] = [
        Self::Step,
        Self::Iges,
        Self::Stl,
        Self::Obj,
        Self::ThreeMf,
        Self::Ply,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Step => "STEP",
            Self::Iges => "IGES",
            Self::Stl => "STL",
            Self::Obj => "OBJ",
            Self::ThreeMf => "3MF",
            Self::Ply => "PLY",
        }
    }

    fn info(self) -> FormatInfo {
        match self {
            Self::Step => ExportFormat::Step.info(),
            Self::Iges => ExportFormat::Iges.info(),
            Self::Stl => ExportFormat::Stl.info(),
            Self::Obj => ExportFormat::Obj.info(),
            Self::ThreeMf => ExportFormat::ThreeMf.info(),
            Self::Ply => FormatInfo::new("ply", "Polygon File Format", Detail::Kind("mesh")),
        }
    }
}

/// SolidWorks native document types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeKind {
    Part,
    Assembly,
    Drawing,
}

impl NativeKind {
    pub const ALL: [Self; 3] = [Self::Part, Self::Assembly, Self::Drawing];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Part => "sldprt",
            Self::Assembly => "sldasm",
            Self::Drawing => "slddrw",
        }
    }

    /// Lower-case type name ("part")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Part => "part",
            Self::Assembly => "assembly",
            Self::Drawing => "drawing",
        }
    }

    /// Plural label used in statistics ("parts")
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Part => "parts",
            Self::Assembly => "assemblies",
            Self::Drawing => "drawings",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "sldprt" => Some(Self::Part),
            "sldasm" => Some(Self::Assembly),
            "slddrw" => Some(Self::Drawing),
            _ => None,
        }
    }

    /// Infer the document type from a file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    fn info(self) -> FormatInfo {
        let description = match self {
            Self::Part => "SolidWorks Part",
            Self::Assembly => "SolidWorks Assembly",
            Self::Drawing => "SolidWorks Drawing",
        };
        FormatInfo::new(self.extension(), description, Detail::Kind(self.as_str()))
    }
}

impl fmt::Display for NativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Detail {
    Version(&'static str),
    Kind(&'static str),
}

/// One row of the supported-formats table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    pub extension: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'static str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl FormatInfo {
    fn new(extension: &'static str, description: &'static str, detail: Detail) -> Self {
        let (version, kind) = match detail {
            Detail::Version(v) => (Some(v), None),
            Detail::Kind(k) => (None, Some(k)),
        };
        Self {
            extension,
            description,
            version,
            kind,
        }
    }
}

/// The full format table, as published by `cad://formats/supported`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatTable {
    pub import_formats: Vec<FormatInfo>,
    pub export_formats: Vec<FormatInfo>,
    pub native_formats: Vec<FormatInfo>,
}

impl FormatTable {
    pub fn new() -> Self {
        Self {
            import_formats: ImportFormat::ALL.into_iter().map(ImportFormat::info).collect(),
            export_formats: ExportFormat::ALL.into_iter().map(ExportFormat::info).collect(),
            native_formats: NativeKind::ALL.into_iter().map(NativeKind::info).collect(),
        }
    }
}

impl Default for FormatTable {
    fn default() -> Self {
        Self::new()
    }
}
