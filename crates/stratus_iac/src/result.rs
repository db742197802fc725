//! Generation results, issues and previews.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use stratus_core::CloudProvider;

use crate::options::OutputFormat;

/// Role of a generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Main,
    Variables,
    Outputs,
    Provider,
    Versions,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Main => "main",
            FileType::Variables => "variables",
            FileType::Outputs => "outputs",
            FileType::Provider => "provider",
            FileType::Versions => "versions",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rendered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    /// Path relative to the output directory.
    pub path: String,
    pub content: String,
    pub file_type: FileType,
    pub format: OutputFormat,
    pub size: usize,
    pub resource_count: usize,
    pub line_count: usize,
    /// SHA-256 of the body, i.e. the content without the preamble.
    pub checksum: String,
}

impl GeneratedFile {
    pub fn new(
        path: impl Into<String>,
        preamble: &str,
        body: &str,
        file_type: FileType,
        format: OutputFormat,
        resource_count: usize,
    ) -> Self {
        let content = format!("{}{}", preamble, body);
        Self {
            path: path.into(),
            size: content.len(),
            line_count: content.lines().count(),
            checksum: checksum(body),
            content,
            file_type,
            format,
            resource_count,
        }
    }
}

/// Hex SHA-256 digest.
pub fn checksum(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Pipeline stage an issue was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Filter,
    Mapping,
    Dependency,
    Render,
    Validation,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A non-fatal problem recorded during generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub resource_id: Option<String>,
    pub file: Option<String>,
    pub message: String,
}

impl GenerationIssue {
    pub fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            resource_id: None,
            file: None,
            message: message.into(),
        }
    }

    pub fn for_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl std::fmt::Display for GenerationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}/{:?}]", self.kind, self.severity)?;
        if let Some(id) = &self.resource_id {
            write!(f, " {}", id)?;
        }
        if let Some(file) = &self.file {
            write!(f, " ({})", file)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetadata {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_resources: usize,
    /// Resources left after include/exclude.
    pub filtered_resources: usize,
    pub mapped_resources: usize,
    pub file_count: usize,
    pub total_lines: usize,
    pub total_bytes: usize,
    /// Mapped resources per provider.
    pub provider_stats: BTreeMap<CloudProvider, usize>,
    pub error_count: usize,
    pub warning_count: usize,
    pub written_to: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub files: Vec<GeneratedFile>,
    pub errors: Vec<GenerationIssue>,
    pub warnings: Vec<GenerationIssue>,
    pub metadata: GenerationMetadata,
}

impl GenerationResult {
    pub fn file(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Resource blocks across all files.
    pub fn rendered_resources(&self) -> usize {
        self.files.iter().map(|f| f.resource_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewFile {
    pub path: String,
    pub file_type: FileType,
    pub resource_count: usize,
}

/// What `generate` would produce, without rendering.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationPreview {
    pub total_resources: usize,
    pub filtered_resources: usize,
    pub mappable_resources: usize,
    pub files: Vec<PreviewFile>,
    pub providers: Vec<CloudProvider>,
    /// Ids of resources no mapper could translate.
    pub unmapped: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_ignores_preamble() {
        let a = GeneratedFile::new("main.tf", "# at 1\n", "body\n", FileType::Main, OutputFormat::Hcl, 0);
        let b = GeneratedFile::new("main.tf", "# at 2\n", "body\n", FileType::Main, OutputFormat::Hcl, 0);
        assert_eq!(a.checksum, b.checksum);
        assert_ne!(a.content, b.content);
        assert_eq!(a.line_count, 2);
        assert_eq!(a.size, a.content.len());
        assert_eq!(a.checksum.len(), 64);
    }

    #[test]
    fn test_issue_display() {
        let issue = GenerationIssue::new(IssueKind::Mapping, Severity::High, "no mapper")
            .for_resource("vm-1")
            .in_file("main.tf");
        assert_eq!(issue.to_string(), "[Mapping/High] vm-1 (main.tf): no mapper");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
        let json = serde_json::to_string(&IssueKind::Dependency).unwrap();
        assert_eq!(json, "\"dependency\"");
    }
}
