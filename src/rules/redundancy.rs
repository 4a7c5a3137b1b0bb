//! Repeated-line detection

use std::collections::HashMap;

use super::{FileContext, Rule};
use crate::models::{Issue, IssueCategory};

/// Lines shorter than this (after trimming) are too generic to count
const MIN_DUPLICATE_LEN: usize = 12;

/// Flags non-trivial lines repeated more often than the configured limit
pub struct DuplicateLineRule {
    max_repeats: usize,
    penalty: f64,
}

impl DuplicateLineRule {
    pub fn new(max_repeats: usize, penalty: f64) -> Self {
        Self {
            max_repeats,
            penalty,
        }
    }
}

impl Rule for DuplicateLineRule {
    fn name(&self) -> &'static str {
        "duplicate-line"
    }

    fn description(&self) -> &'static str {
        "Detects the same line repeated many times in one file"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Redundancy
    }

    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue> {
        // line text -> (first line number, occurrences)
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (i, line) in ctx.lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.chars().count() < MIN_DUPLICATE_LEN {
                continue;
            }
            counts.entry(trimmed).or_insert((i + 1, 0)).1 += 1;
        }

        let mut repeated: Vec<(&str, usize, usize)> = counts
            .into_iter()
            .filter(|(_, (_, n))| *n > self.max_repeats)
            .map(|(text, (first, n))| (text, first, n))
            .collect();
        repeated.sort_by_key(|(_, first, _)| *first);

        repeated
            .into_iter()
            .map(|(text, first, n)| {
                let preview: String = text.chars().take(40).collect();
                Issue::new(
                    self.name(),
                    self.category(),
                    format!("line '{}' repeated {} times", preview, n),
                    self.penalty,
                )
                .at_line(first)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tests::run_rule;

    #[test]
    fn test_repeats_over_limit() {
        let rule = DuplicateLineRule::new(10, 2.0);
        let mut src = String::from("# Header\n");
        for _ in 0..11 {
            src.push_str("  logger.info(\"step\")\n");
        }
        for _ in 0..10 {
            src.push_str("puts 'ten times only'\n");
        }
        let issues = run_rule(&rule, "a.rb", &src);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(2));
        assert!(issues[0].message.contains("repeated 11 times"));
    }

    #[test]
    fn test_short_lines_ignored() {
        let rule = DuplicateLineRule::new(2, 2.0);
        let src = "end\nend\nend\nend\n}\n}\n}\n}\n";
        assert!(run_rule(&rule, "a.rb", src).is_empty());
    }
}
