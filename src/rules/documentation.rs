//! Documentation rules: long sentences and missing file headers

use super::{is_comment_line, FileContext, Rule};
use crate::models::{FileType, Issue, IssueCategory};

/// Flags prose lines with more words than the configured limit.
///
/// For Markdown every non-code line is prose; for source files only comment
/// lines are. JSON and unknown files have no prose.
pub struct LongSentenceRule {
    max_words: usize,
    penalty: f64,
}

impl LongSentenceRule {
    pub fn new(max_words: usize, penalty: f64) -> Self {
        Self { max_words, penalty }
    }
}

impl Rule for LongSentenceRule {
    fn name(&self) -> &'static str {
        "long-sentence"
    }

    fn description(&self) -> &'static str {
        "Detects prose lines with too many words"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Documentation
    }

    fn applies_to(&self, file_type: FileType) -> bool {
        !matches!(file_type, FileType::Json | FileType::Unknown)
    }

    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue> {
        let file_type = ctx.file_type();
        let mut in_fence = false;
        let mut issues = Vec::new();

        for (i, line) in ctx.lines.iter().enumerate() {
            let trimmed = line.trim();
            if file_type == FileType::Markdown {
                if trimmed.starts_with("```") {
                    in_fence = !in_fence;
                    continue;
                }
                if in_fence {
                    continue;
                }
            } else if !is_comment_line(file_type, trimmed) {
                continue;
            }

            let words = trimmed
                .split_whitespace()
                .filter(|w| w.chars().any(char::is_alphanumeric))
                .count();
            if words > self.max_words {
                issues.push(
                    Issue::new(
                        self.name(),
                        self.category(),
                        format!("line has {} words (limit {})", words, self.max_words),
                        self.penalty,
                    )
                    .at_line(i + 1),
                );
            }
        }
        issues
    }
}

/// Flags source files without a single comment and markdown documents
/// without a heading.
pub struct MissingHeaderRule {
    penalty: f64,
}

impl MissingHeaderRule {
    pub fn new(penalty: f64) -> Self {
        Self { penalty }
    }
}

/// Lines that must stay first in a file: shebangs, doctypes and pragmas
pub(crate) fn is_preamble(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("#!")
        || line.to_ascii_lowercase().starts_with("<!doctype")
        || line.starts_with("# frozen_string_literal")
        || line.starts_with("\"use strict\"")
        || line.starts_with("'use strict'")
}

/// Whether `content` carries a header for its type: any comment line in
/// source, any `#` heading in markdown
pub(crate) fn has_header(file_type: FileType, content: &str) -> bool {
    let mut in_fence = false;
    content.lines().map(str::trim).any(|line| {
        if file_type == FileType::Markdown {
            if line.starts_with("```") {
                in_fence = !in_fence;
                return false;
            }
            !in_fence && (line.starts_with('#') || line.starts_with("<!--"))
        } else {
            is_comment_line(file_type, line)
        }
    })
}

impl Rule for MissingHeaderRule {
    fn name(&self) -> &'static str {
        "missing-header"
    }

    fn description(&self) -> &'static str {
        "Detects source files without comments and documents without a heading"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Documentation
    }

    fn applies_to(&self, file_type: FileType) -> bool {
        file_type.is_source() || file_type == FileType::Markdown
    }

    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue> {
        if ctx.content.trim().is_empty() || has_header(ctx.file_type(), ctx.content) {
            return vec![];
        }
        let message = match ctx.file_type() {
            FileType::Markdown => "document has no title heading",
            _ => "file has no header comment",
        };
        vec![Issue::new(self.name(), self.category(), message, self.penalty).at_line(1)]
    }
}
