use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractFileStat {
    pub path: String,
    /// Values first seen in this document.
    pub new_values: usize,
    /// Matching nodes with non-empty text.
    pub nodes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareSummary {
    pub schema_version: u32,
    pub table: String,
    pub values: usize,
    pub files: Vec<ExtractFileStat>,
    pub failed: Vec<FileFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReinjectFileStat {
    pub path: String,
    pub output: String,
    pub replaced: usize,
    /// Nodes whose update failed and were left unchanged.
    pub node_failures: usize,
    /// `written` or `kept-existing`.
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateSummary {
    pub schema_version: u32,
    /// `completed` or `cancelled`.
    pub outcome: String,
    pub table: String,
    pub entries: usize,
    pub files: Vec<ReinjectFileStat>,
    pub failed: Vec<FileFailure>,
    /// Documents left alone because the run was cancelled.
    pub not_attempted: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationSummary {
    pub neutral: String,
    pub import: String,
    pub export: String,
    pub swapped: Vec<String>,
    /// Import keys the neutral file does not define.
    pub missing_in_neutral: Vec<String>,
    /// Where the import file went after disposal.
    pub disposed_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    /// `import-missing` or `export-exists`.
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapSummary {
    pub schema_version: u32,
    /// `completed`, `cancelled` or `failed`.
    pub outcome: String,
    pub error: Option<String>,
    pub completed: Vec<RotationSummary>,
    pub declined: Vec<String>,
    pub skipped: Vec<SkippedFile>,
    pub not_attempted: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapPlanEntry {
    pub neutral: String,
    pub import: String,
    pub export: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapPlan {
    pub schema_version: u32,
    pub ready: Vec<SwapPlanEntry>,
    pub skipped: Vec<SkippedFile>,
}
