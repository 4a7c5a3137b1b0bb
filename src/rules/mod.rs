//! Heuristic rule battery
//!
//! Every rule looks at one file at a time and returns the issues it finds.
//! Rules are plain text heuristics: nothing here parses program source into
//! a syntax tree. JSON is the only format that gets a real parser, because
//! "does it parse" is itself one of the checks.
//!
//! The scorer runs the rules in the order `default_rules` returns them, so
//! the issue order of a `ScoreResult` is stable for a given input.

mod documentation;
mod json_shape;
mod length;
mod naming;
mod redundancy;
mod structure;

pub use documentation::{LongSentenceRule, MissingHeaderRule};
pub(crate) use documentation::{has_header, is_preamble};
pub use json_shape::{SectionSizeRule, UnresolvedReferenceRule};
pub use length::LineLengthRule;
pub use naming::{declared_identifiers, AbbreviationRule, IdentifierLengthRule};
pub use redundancy::DuplicateLineRule;
pub use structure::{Imbalance, KeywordBalanceChecker, StructuralBalanceRule, StructuralChecker};

use crate::config::RuleConfig;
use crate::models::{FileRecord, FileType, Issue, IssueCategory};

/// Everything a rule may look at for one file
pub struct FileContext<'a> {
    pub record: &'a FileRecord,
    pub content: &'a str,
    pub lines: Vec<&'a str>,
    /// Parsed document, only for JSON files
    pub json: Option<Result<serde_json::Value, serde_json::Error>>,
}

impl<'a> FileContext<'a> {
    pub fn new(record: &'a FileRecord, content: &'a str) -> Self {
        let json = (record.detected_type == FileType::Json)
            .then(|| serde_json::from_str::<serde_json::Value>(content));
        Self {
            record,
            content,
            lines: content.lines().collect(),
            json,
        }
    }

    pub fn file_type(&self) -> FileType {
        self.record.detected_type
    }

    /// The parsed JSON document, if this is a JSON file that parses
    pub fn json_value(&self) -> Option<&serde_json::Value> {
        self.json.as_ref().and_then(|r| r.as_ref().ok())
    }
}

/// Trait for all scoring rules
pub trait Rule: Send + Sync {
    /// Unique identifier, recorded on every issue the rule raises
    fn name(&self) -> &'static str;

    /// Human-readable description of what the rule checks
    fn description(&self) -> &'static str;

    fn category(&self) -> IssueCategory;

    /// Whether the rule runs for this file type (default: all types)
    fn applies_to(&self, _file_type: FileType) -> bool {
        true
    }

    /// Run the rule over one file
    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue>;
}

/// The rule battery, in the order it runs
pub fn default_rules(config: &RuleConfig) -> Vec<Box<dyn Rule>> {
    default_rules_with_checker(config, Box::new(KeywordBalanceChecker))
}

/// The rule battery with a custom structural checker plugged in
pub fn default_rules_with_checker(
    config: &RuleConfig,
    checker: Box<dyn StructuralChecker>,
) -> Vec<Box<dyn Rule>> {
    let p = &config.penalties;
    vec![
        Box::new(StructuralBalanceRule::new(checker, p.structure)),
        Box::new(LineLengthRule::new(config.max_line_length, p.line_length)),
        Box::new(LongSentenceRule::new(config.max_words_per_line, p.long_sentence)),
        Box::new(MissingHeaderRule::new(p.missing_header)),
        Box::new(IdentifierLengthRule::new(
            config.min_identifier_length,
            config.max_identifier_length,
            p.identifier_length,
        )),
        Box::new(AbbreviationRule::new(config.abbreviations.clone(), p.abbreviation)),
        Box::new(DuplicateLineRule::new(config.max_duplicate_lines, p.duplicate_line)),
        Box::new(SectionSizeRule::new(config.max_section_keys, p.section_size)),
        Box::new(UnresolvedReferenceRule::new(p.unresolved_reference)),
    ]
}

/// Whether a trimmed line is a comment in the given file type
pub(crate) fn is_comment_line(file_type: FileType, trimmed: &str) -> bool {
    match file_type {
        FileType::Ruby | FileType::Shell => trimmed.starts_with('#') && !trimmed.starts_with("#!"),
        FileType::Javascript => {
            trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
        }
        FileType::Css => trimmed.starts_with("/*") || trimmed.starts_with('*'),
        FileType::Html | FileType::Markdown => {
            trimmed.starts_with("<!--") || trimmed.starts_with("<%#")
        }
        FileType::Json | FileType::Unknown => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Run one rule over inline content
    pub(crate) fn run_rule(rule: &dyn Rule, path: &str, content: &str) -> Vec<Issue> {
        let record = FileRecord::new(path, content.len() as u64);
        let ctx = FileContext::new(&record, content);
        if rule.applies_to(ctx.file_type()) {
            rule.check(&ctx)
        } else {
            vec![]
        }
    }

    #[test]
    fn test_default_rule_order_is_fixed() {
        let names: Vec<&str> = default_rules(&RuleConfig::default())
            .iter()
            .map(|r| r.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "structural-balance",
                "line-length",
                "long-sentence",
                "missing-header",
                "identifier-length",
                "abbreviation",
                "duplicate-line",
                "section-size",
                "unresolved-reference",
            ]
        );
    }

    #[test]
    fn test_comment_detection() {
        assert!(is_comment_line(FileType::Ruby, "# note"));
        assert!(!is_comment_line(FileType::Shell, "#!/bin/sh"));
        assert!(is_comment_line(FileType::Javascript, "// note"));
        assert!(is_comment_line(FileType::Html, "<%# erb note %>"));
        assert!(!is_comment_line(FileType::Json, "// nope"));
    }
}
