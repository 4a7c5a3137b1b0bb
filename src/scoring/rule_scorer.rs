//! Rule-battery scorer

use std::path::Path;
use tracing::{debug, trace};

use crate::config::ValidatorConfig;
use crate::error::{ErrorKind, ValidatorError};
use crate::models::{FileRecord, Issue, IssueCategory, ScoreResult};
use crate::rules::{
    default_rules_with_checker, FileContext, KeywordBalanceChecker, Rule, StructuralChecker,
};

/// Runs the rule battery over one file at a time.
///
/// The scorer holds no per-file state, so one instance is shared by every
/// worker in a batch.
pub struct RuleScorer {
    rules: Vec<Box<dyn Rule>>,
    threshold: f64,
    max_issues_per_rule: usize,
}

impl RuleScorer {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self::with_checker(config, Box::new(KeywordBalanceChecker))
    }

    /// Build a scorer with a custom structural checker
    pub fn with_checker(config: &ValidatorConfig, checker: Box<dyn StructuralChecker>) -> Self {
        Self {
            rules: default_rules_with_checker(&config.rules, checker),
            threshold: config.compliance_threshold,
            max_issues_per_rule: config.rules.max_issues_per_rule,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    /// Score decoded file content
    pub fn score(&self, record: &FileRecord, content: &str) -> ScoreResult {
        if content.trim().is_empty() {
            return ScoreResult::from_issues(record.clone(), vec![], self.threshold);
        }

        let ctx = FileContext::new(record, content);
        let mut issues = Vec::new();
        for rule in &self.rules {
            if !rule.applies_to(ctx.file_type()) {
                continue;
            }
            let mut found = rule.check(&ctx);
            if found.len() > self.max_issues_per_rule {
                trace!(
                    "{}: {} issues from {}, keeping {}",
                    record.display_path(),
                    found.len(),
                    rule.name(),
                    self.max_issues_per_rule
                );
                found.truncate(self.max_issues_per_rule);
            }
            issues.extend(found);
        }

        let result = ScoreResult::from_issues(record.clone(), issues, self.threshold);
        debug!(
            "Scored {}: {:.1} ({} issues)",
            record.display_path(),
            result.score,
            result.issues.len()
        );
        result
    }

    /// Score raw bytes; content that is not UTF-8 counts as unreadable
    pub fn score_bytes(&self, record: &FileRecord, bytes: Vec<u8>) -> ScoreResult {
        match String::from_utf8(bytes) {
            Ok(content) => self.score(record, &content),
            Err(e) => self.unreadable(record, format!("content is not valid UTF-8: {}", e)),
        }
    }

    /// Read a file under `root` and score it. Never fails: read errors
    /// become a failed result.
    pub fn score_file(&self, root: &Path, record: &FileRecord) -> ScoreResult {
        let path = root.join(&record.path);
        match std::fs::read(&path) {
            Ok(bytes) => self.score_bytes(record, bytes),
            Err(e) => self.score_unreadable(record, &ValidatorError::file_access(path, e)),
        }
    }

    /// Failed result for a file that could not be read at all
    pub fn score_unreadable(&self, record: &FileRecord, err: &ValidatorError) -> ScoreResult {
        self.unreadable(record, err.to_string())
    }

    fn unreadable(&self, record: &FileRecord, message: String) -> ScoreResult {
        debug!("Cannot score {}: {}", record.display_path(), message);
        let issue = Issue::new("file-access", IssueCategory::Structure, message, 100.0)
            .tagged(ErrorKind::FileAccessError);
        ScoreResult::failed(record.clone(), issue, self.threshold)
    }
}
