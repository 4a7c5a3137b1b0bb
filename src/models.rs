//! Core data models for scrutiny
//!
//! These models flow through the whole pipeline: the discoverer produces
//! `FileRecord`s, rules produce `Issue`s, the scorer folds them into a
//! `ScoreResult`, and the orchestrator accumulates everything into the
//! `RunReport` that is written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};

use crate::error::ErrorKind;

/// File type detected from the path (extension or well-known file name)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Ruby,
    Javascript,
    Json,
    Markdown,
    Html,
    Css,
    Shell,
    #[default]
    Unknown,
}

impl FileType {
    /// Detect the type of a file from its path
    pub fn detect(path: &Path) -> FileType {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if matches!(name, "Rakefile" | "Gemfile" | "Guardfile" | "Capfile") {
            return FileType::Ruby;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "rb" | "rake" | "gemspec" | "ru" => FileType::Ruby,
            "js" | "mjs" | "cjs" | "jsx" => FileType::Javascript,
            "json" => FileType::Json,
            "md" | "markdown" => FileType::Markdown,
            "html" | "htm" | "erb" => FileType::Html,
            "css" | "scss" => FileType::Css,
            "sh" | "bash" | "zsh" => FileType::Shell,
            _ => FileType::Unknown,
        }
    }

    /// Whether the type is program source (as opposed to data or prose)
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            FileType::Ruby | FileType::Javascript | FileType::Shell | FileType::Css | FileType::Html
        )
    }

    /// Line comment syntax as `(prefix, suffix)`, if the type has comments
    pub fn comment_syntax(&self) -> Option<(&'static str, &'static str)> {
        match self {
            FileType::Ruby | FileType::Shell => Some(("# ", "")),
            FileType::Javascript => Some(("// ", "")),
            FileType::Css => Some(("/* ", " */")),
            FileType::Html | FileType::Markdown => Some(("<!-- ", " -->")),
            FileType::Json | FileType::Unknown => None,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileType::Ruby => "ruby",
            FileType::Javascript => "javascript",
            FileType::Json => "json",
            FileType::Markdown => "markdown",
            FileType::Html => "html",
            FileType::Css => "css",
            FileType::Shell => "shell",
            FileType::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// A candidate file found by the discoverer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Path relative to the scanned root
    #[serde(serialize_with = "serialize_slash_path")]
    pub path: PathBuf,
    pub detected_type: FileType,
    pub byte_size: u64,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, byte_size: u64) -> Self {
        let path = path.into();
        let detected_type = FileType::detect(&path);
        Self {
            path,
            detected_type,
            byte_size,
        }
    }

    /// Relative path with `/` separators on every platform
    pub fn display_path(&self) -> String {
        slash_path(&self.path)
    }
}

pub(crate) fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn serialize_slash_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&slash_path(path))
}

/// Issue categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Naming,
    Structure,
    Length,
    Documentation,
    Redundancy,
    Complexity,
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueCategory::Naming => write!(f, "naming"),
            IssueCategory::Structure => write!(f, "structure"),
            IssueCategory::Length => write!(f, "length"),
            IssueCategory::Documentation => write!(f, "documentation"),
            IssueCategory::Redundancy => write!(f, "redundancy"),
            IssueCategory::Complexity => write!(f, "complexity"),
        }
    }
}

/// A single triggered rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// Name of the rule that raised the issue
    pub rule: String,
    pub category: IssueCategory,
    pub message: String,
    /// 1-based line number, when the issue points at a line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub score_penalty: f64,
    /// Error tag for issues that stand in for a per-file failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl Issue {
    pub fn new(
        rule: impl Into<String>,
        category: IssueCategory,
        message: impl Into<String>,
        score_penalty: f64,
    ) -> Self {
        Self {
            rule: rule.into(),
            category,
            message: message.into(),
            line: None,
            score_penalty,
            error: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn tagged(mut self, error: ErrorKind) -> Self {
        self.error = Some(error);
        self
    }
}

/// Maximum (and starting) compliance score
pub const MAX_SCORE: f64 = 100.0;

/// Outcome of scoring one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub file: FileRecord,
    pub score: f64,
    pub issues: Vec<Issue>,
    pub passed: bool,
}

impl ScoreResult {
    /// Fold issues into a score: 100 minus all penalties, clamped to [0, 100].
    pub fn from_issues(file: FileRecord, issues: Vec<Issue>, threshold: f64) -> Self {
        let penalty: f64 = issues.iter().map(|i| i.score_penalty).sum();
        Self::with_score(file, MAX_SCORE - penalty, issues, threshold)
    }

    /// Build a result for a file whose content could not be scored at all
    pub fn failed(file: FileRecord, issue: Issue, threshold: f64) -> Self {
        Self::with_score(file, 0.0, vec![issue], threshold)
    }

    fn with_score(file: FileRecord, raw: f64, issues: Vec<Issue>, threshold: f64) -> Self {
        let score = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, MAX_SCORE) };
        Self {
            file,
            score,
            issues,
            passed: score >= threshold,
        }
    }
}

/// One reading from the resource monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    pub memory_bytes: u64,
    pub cpu_percent: f64,
    pub network_percent: f64,
}

impl ResourceSample {
    pub fn now(memory_bytes: u64, cpu_percent: f64, network_percent: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            memory_bytes,
            cpu_percent,
            network_percent,
        }
    }
}

/// Which pipeline was run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Validate,
    Fix,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Validate => write!(f, "validate"),
            RunMode::Fix => write!(f, "fix"),
        }
    }
}

/// A file the rewriter refused to touch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRewrite {
    #[serde(serialize_with = "serialize_slash_path")]
    pub path: PathBuf,
    pub error: ErrorKind,
    pub message: String,
}

/// What the rewriter did across the run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RewriteSummary {
    /// Files written back (or that would be, under `--dry-run`)
    pub modified: Vec<String>,
    pub skipped: Vec<SkippedRewrite>,
}

/// Why a run stopped early
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbortReason {
    pub kind: ErrorKind,
    pub message: String,
}

/// The durable output of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub mode: RunMode,
    #[serde(serialize_with = "serialize_slash_path")]
    pub root: PathBuf,
    pub dry_run: bool,
    pub compliance_threshold: f64,
    pub files_scanned: usize,
    pub files_passed: usize,
    pub files_failed: usize,
    /// Mean score; `None` (serialized as `null`) when nothing was scanned
    pub overall_score: Option<f64>,
    pub per_file_results: Vec<ScoreResult>,
    pub rewrites: RewriteSummary,
    pub circuit_breaker_activations: u64,
    pub resource_samples: Vec<ResourceSample>,
    pub aborted: bool,
    pub abort_reason: Option<AbortReason>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new(mode: RunMode, root: impl Into<PathBuf>, dry_run: bool, threshold: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            mode,
            root: root.into(),
            dry_run,
            compliance_threshold: threshold,
            files_scanned: 0,
            files_passed: 0,
            files_failed: 0,
            overall_score: None,
            per_file_results: Vec::new(),
            rewrites: RewriteSummary::default(),
            circuit_breaker_activations: 0,
            resource_samples: Vec::new(),
            aborted: false,
            abort_reason: None,
            duration_ms: 0,
        }
    }

    /// Append a batch of results, keeping counters and the mean in step
    pub fn append(&mut self, results: impl IntoIterator<Item = ScoreResult>) {
        for result in results {
            self.files_scanned += 1;
            if result.passed {
                self.files_passed += 1;
            } else {
                self.files_failed += 1;
            }
            self.per_file_results.push(result);
        }
        self.overall_score = if self.per_file_results.is_empty() {
            None
        } else {
            let total: f64 = self.per_file_results.iter().map(|r| r.score).sum();
            Some(total / self.per_file_results.len() as f64)
        };
    }

    /// Whether the run meets the threshold. An empty run is compliant.
    pub fn is_compliant(&self) -> bool {
        self.overall_score
            .map_or(true, |score| score >= self.compliance_threshold)
    }
}
