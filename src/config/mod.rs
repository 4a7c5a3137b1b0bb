//! Configuration module for scrutiny
//!
//! This module handles:
//! - The `master.json`-style validator config (thresholds, limits, batch size)
//! - Rule tuning (line/word limits, identifier bounds, penalties)
//! - Resource monitor limits and breaker timings

mod validator_config;

pub use validator_config::{
    load_config,
    MonitorConfig,
    PenaltyConfig,
    RuleConfig,
    SamplerKind,
    ValidatorConfig,
    CONFIG_ENV_VAR,
    DEFAULT_CONFIG_FILE,
    DEFAULT_EXCLUDE_PATTERNS,
    DEFAULT_INCLUDE_PATTERNS,
    DEFAULT_REPORT_FILE,
};
