//! Per-file compliance scoring
//!
//! Every file starts at 100 points and loses each triggered issue's penalty.
//!
//! # Scoring Formula
//!
//! ```text
//! score = clamp(100 - Σ penalty, 0, 100)
//! passed = score >= compliance_threshold
//! ```
//!
//! # Default Penalties
//!
//! - Unbalanced structure: 10 per imbalanced pair
//! - JSON that does not parse: 100 (the file scores 0)
//! - Missing header: 5
//! - Oversized JSON section: 3
//! - Repeated line: 2
//! - Over-long line, identifier outside 5..=30 chars, unresolved `@ref:`: 1
//! - Long sentence, abbreviation: 0.5
//!
//! Each rule contributes at most `max_issues_per_rule` issues, so a single
//! noisy rule cannot drive every file to 0 on its own.

mod rule_scorer;

pub use rule_scorer::RuleScorer;
