//! Line length

use super::{FileContext, Rule};
use crate::models::{Issue, IssueCategory};

/// Flags every line longer than the configured limit (in characters)
pub struct LineLengthRule {
    max_length: usize,
    penalty: f64,
}

impl LineLengthRule {
    pub fn new(max_length: usize, penalty: f64) -> Self {
        Self {
            max_length,
            penalty,
        }
    }
}

impl Rule for LineLengthRule {
    fn name(&self) -> &'static str {
        "line-length"
    }

    fn description(&self) -> &'static str {
        "Detects lines longer than the configured limit"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Length
    }

    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue> {
        ctx.lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| {
                let len = line.chars().count();
                (len > self.max_length).then(|| {
                    Issue::new(
                        self.name(),
                        self.category(),
                        format!("line is {} characters (limit {})", len, self.max_length),
                        self.penalty,
                    )
                    .at_line(i + 1)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tests::run_rule;

    #[test]
    fn test_flags_only_lines_over_limit() {
        let rule = LineLengthRule::new(120, 1.0);
        let exact = "a".repeat(120);
        let over = "b".repeat(121);
        let content = format!("{}\n{}\nshort\n", exact, over);

        let issues = run_rule(&rule, "notes.md", &content);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(2));
        assert_eq!(issues[0].category, IssueCategory::Length);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let rule = LineLengthRule::new(10, 1.0);
        // 10 characters, 20 bytes
        let issues = run_rule(&rule, "a.md", "éééééééééé\n");
        assert!(issues.is_empty());
    }
}
