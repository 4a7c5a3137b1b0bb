//! Validator configuration support
//!
//! Loads the validator settings from a `master.json`-style JSON document
//! (or the same keys in TOML). Keys are read from a `"validator"` section
//! when the document has one, otherwise from the top level, so the tool can
//! share a larger framework config file without owning its schema.
//!
//! # Configuration Format
//!
//! ```json
//! {
//!   "validator": {
//!     "compliance_threshold": 80.0,
//!     "batch_size": 100,
//!     "exclude": ["**/generated/**"],
//!     "rules": { "max_line_length": 120, "max_words_per_line": 15 },
//!     "monitor": { "sample_interval_ms": 10000, "cpu_limit_percent": 10.0 }
//!   }
//! }
//! ```
//!
//! Every key is optional. A missing default config file means "use the
//! defaults"; a config that does not parse is reported and replaced by the
//! defaults. Only an explicitly requested file that cannot be read is fatal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ValidatorError, ValidatorResult};

/// Config file looked up in the root when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "master.json";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "VALIDATOR_CONFIG";

/// Report file written into the root when no path is given
pub const DEFAULT_REPORT_FILE: &str = "run_report.json";

/// Files considered for scoring unless `include` is configured
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &[
    "**/*.rb",
    "**/*.rake",
    "**/*.gemspec",
    "**/Rakefile",
    "**/Gemfile",
    "**/*.js",
    "**/*.mjs",
    "**/*.cjs",
    "**/*.jsx",
    "**/*.json",
    "**/*.md",
    "**/*.markdown",
    "**/*.html",
    "**/*.htm",
    "**/*.erb",
    "**/*.css",
    "**/*.scss",
    "**/*.sh",
    "**/*.bash",
    "**/*.zsh",
];

/// Built-in exclusions, applied on top of user `exclude` patterns
/// unless `skip_default_excludes` is set.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/vendor/**",
    "**/target/**",
    "**/tmp/**",
    "**/log/**",
    "**/*.min.js",
    "**/*.min.css",
    "**/run_report.json",
];

/// Top-level validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Minimum score for a file (and the run mean) to pass (default: 80.0)
    #[serde(default = "default_compliance_threshold")]
    pub compliance_threshold: f64,

    /// Files per batch (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Scoring workers; `None` means one per logical CPU
    #[serde(default)]
    pub workers: Option<usize>,

    /// Times to wait out an active circuit breaker before aborting (default: 10)
    #[serde(default = "default_max_breaker_retries")]
    pub max_breaker_retries: u32,

    /// Wait between breaker checks in milliseconds (default: 10000)
    #[serde(default = "default_breaker_retry_interval_ms")]
    pub breaker_retry_interval_ms: u64,

    /// Report location; relative paths resolve against the root
    #[serde(default)]
    pub report_path: Option<PathBuf>,

    /// Include globs; empty means `DEFAULT_INCLUDE_PATTERNS`
    #[serde(default)]
    pub include: Vec<String>,

    /// Exclude globs, added to `DEFAULT_EXCLUDE_PATTERNS`
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Disable the built-in exclusions
    #[serde(default)]
    pub skip_default_excludes: bool,

    /// Honour `.gitignore` files while walking (default: true)
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,

    #[serde(default)]
    pub rules: RuleConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            compliance_threshold: default_compliance_threshold(),
            batch_size: default_batch_size(),
            workers: None,
            max_breaker_retries: default_max_breaker_retries(),
            breaker_retry_interval_ms: default_breaker_retry_interval_ms(),
            report_path: None,
            include: Vec::new(),
            exclude: Vec::new(),
            skip_default_excludes: false,
            respect_gitignore: true,
            rules: RuleConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

fn default_compliance_threshold() -> f64 {
    80.0
}
fn default_batch_size() -> usize {
    100
}
fn default_max_breaker_retries() -> u32 {
    10
}
fn default_breaker_retry_interval_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}

/// Rule tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub max_line_length: usize,
    pub max_words_per_line: usize,
    pub min_identifier_length: usize,
    pub max_identifier_length: usize,
    /// A line may repeat this many times before it counts as redundant
    pub max_duplicate_lines: usize,
    /// Entries allowed in a JSON section before it counts as overloaded
    pub max_section_keys: usize,
    /// Cap on issues any single rule reports for one file
    pub max_issues_per_rule: usize,
    /// Abbreviation → preferred spelling
    pub abbreviations: BTreeMap<String, String>,
    pub penalties: PenaltyConfig,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            max_line_length: 120,
            max_words_per_line: 15,
            min_identifier_length: 5,
            max_identifier_length: 30,
            max_duplicate_lines: 10,
            max_section_keys: 9,
            max_issues_per_rule: 20,
            abbreviations: default_abbreviations(),
            penalties: PenaltyConfig::default(),
        }
    }
}

fn default_abbreviations() -> BTreeMap<String, String> {
    [
        ("btn", "button"),
        ("img", "image"),
        ("txt", "text"),
        ("num", "number"),
        ("str", "string"),
        ("arr", "array"),
        ("obj", "object"),
        ("elem", "element"),
        ("attr", "attribute"),
        ("param", "parameter"),
        ("val", "value"),
        ("var", "variable"),
        ("tmp", "temporary"),
        ("temp", "temporary"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Score penalty per triggered issue, by rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    pub structure: f64,
    pub line_length: f64,
    pub long_sentence: f64,
    pub missing_header: f64,
    pub identifier_length: f64,
    pub abbreviation: f64,
    pub duplicate_line: f64,
    pub section_size: f64,
    pub unresolved_reference: f64,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            structure: 10.0,
            line_length: 1.0,
            long_sentence: 0.5,
            missing_header: 5.0,
            identifier_length: 1.0,
            abbreviation: 0.5,
            duplicate_line: 2.0,
            section_size: 3.0,
            unresolved_reference: 1.0,
        }
    }
}

/// Which sampler the monitor uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    /// Seeded random readings (never reads the OS)
    #[default]
    Simulated,
    /// Readings from `/proc` (Linux)
    Real,
}

/// Resource monitor limits and timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sampler: SamplerKind,
    pub sample_interval_ms: u64,
    pub memory_limit_bytes: u64,
    pub cpu_limit_percent: f64,
    pub network_limit_percent: f64,
    /// Link capacity used by the real sampler to express traffic as a percentage
    pub link_capacity_bytes_per_sec: u64,
    /// Fraction of a limit that counts as "hot"
    pub trip_ratio: f64,
    /// Fraction of a limit a sample must stay under during cool-down
    pub clear_ratio: f64,
    /// Consecutive hot samples needed to trip the breaker
    pub trip_after_samples: u32,
    pub cooldown_ms: u64,
    /// Samples kept for the report
    pub history_size: usize,
    /// Seed for the simulated sampler; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Band of each limit the simulated sampler draws from
    pub simulated_low_ratio: f64,
    pub simulated_high_ratio: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerKind::Simulated,
            sample_interval_ms: 10_000,
            memory_limit_bytes: 1024 * 1024 * 1024,
            cpu_limit_percent: 10.0,
            network_limit_percent: 5.0,
            link_capacity_bytes_per_sec: 125_000_000,
            trip_ratio: 0.85,
            clear_ratio: 0.70,
            trip_after_samples: 2,
            cooldown_ms: 60_000,
            history_size: 64,
            seed: None,
            simulated_low_ratio: 0.10,
            simulated_high_ratio: 0.60,
        }
    }
}

impl ValidatorConfig {
    /// Effective include patterns
    pub fn include_patterns(&self) -> Vec<String> {
        if self.include.is_empty() {
            DEFAULT_INCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect()
        } else {
            self.include.clone()
        }
    }

    /// Effective exclusion patterns (defaults + user patterns)
    pub fn exclude_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();

        if !self.skip_default_excludes {
            patterns.extend(DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()));
        }

        for p in &self.exclude {
            if !patterns.contains(p) {
                patterns.push(p.clone());
            }
        }

        patterns
    }

    /// Where the report goes for a given root
    pub fn report_path_for(&self, root: &Path) -> PathBuf {
        match &self.report_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join(DEFAULT_REPORT_FILE),
        }
    }

    /// Number of scoring workers, never more than the logical CPU count
    pub fn effective_workers(&self) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.workers.unwrap_or(cpus).clamp(1, cpus)
    }

    /// Pull out-of-range values back to something usable
    pub fn sanitize(&mut self) {
        if !(0.0..=100.0).contains(&self.compliance_threshold) {
            warn!(
                "compliance_threshold {} out of range, clamping to [0, 100]",
                self.compliance_threshold
            );
            self.compliance_threshold = if self.compliance_threshold.is_nan() {
                default_compliance_threshold()
            } else {
                self.compliance_threshold.clamp(0.0, 100.0)
            };
        }
        if self.batch_size == 0 {
            warn!("batch_size 0 is not usable, using 1");
            self.batch_size = 1;
        }
        if self.monitor.trip_after_samples == 0 {
            self.monitor.trip_after_samples = 1;
        }
        if self.monitor.history_size == 0 {
            self.monitor.history_size = 1;
        }
        if self.monitor.sample_interval_ms == 0 {
            self.monitor.sample_interval_ms = 1;
        }
        if self.monitor.simulated_low_ratio > self.monitor.simulated_high_ratio {
            std::mem::swap(
                &mut self.monitor.simulated_low_ratio,
                &mut self.monitor.simulated_high_ratio,
            );
        }
    }
}

/// Load the validator configuration.
///
/// Looks for `explicit` when given (from `--config` or `VALIDATOR_CONFIG`),
/// otherwise for `master.json` in the root.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> ValidatorResult<ValidatorConfig> {
    let (path, required) = match explicit {
        Some(p) if p.is_absolute() => (p.to_path_buf(), true),
        Some(p) if p.exists() => (p.to_path_buf(), true),
        Some(p) => (root.join(p), true),
        None => (root.join(DEFAULT_CONFIG_FILE), false),
    };

    if !path.exists() {
        if required {
            return Err(ValidatorError::Configuration(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        debug!("No config at {}, using defaults", path.display());
        return Ok(ValidatorConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        ValidatorError::Configuration(format!("cannot read config {}: {}", path.display(), e))
    })?;

    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    let parsed = if is_toml {
        parse_toml_config(&content)
    } else {
        parse_json_config(&content)
    };

    let mut config = match parsed {
        Ok(config) => {
            debug!("Loaded validator config from {}", path.display());
            config
        }
        Err(e) => {
            warn!(
                "Ignoring malformed config {}: {}; using defaults",
                path.display(),
                e
            );
            ValidatorConfig::default()
        }
    };
    config.sanitize();
    Ok(config)
}

/// Parse JSON config, preferring a `"validator"` section over the top level
fn parse_json_config(content: &str) -> anyhow::Result<ValidatorConfig> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let section = match value.get("validator") {
        Some(v) if v.is_object() => v.clone(),
        _ => value,
    };
    if !section.is_object() {
        anyhow::bail!("expected a JSON object");
    }
    Ok(serde_json::from_value(section)?)
}

/// Parse TOML config, preferring a `[validator]` table over the top level
fn parse_toml_config(content: &str) -> anyhow::Result<ValidatorConfig> {
    let mut table: toml::Table = toml::from_str(content)?;
    let section = match table.remove("validator") {
        Some(toml::Value::Table(t)) => t,
        Some(other) => {
            table.insert("validator".to_string(), other);
            table
        }
        None => table,
    };
    Ok(toml::Value::Table(section).try_into()?)
}

#[cfg(test)]
mod tests;
