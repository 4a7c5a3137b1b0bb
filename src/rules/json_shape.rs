//! JSON document shape: oversized sections and unresolved references

use serde_json::Value;

use super::{FileContext, Rule};
use crate::models::{FileType, Issue, IssueCategory};

/// Marker for a reference that should have been consolidated away
const REFERENCE_MARKER: &str = "@ref:";

fn entry_count(value: &Value) -> Option<usize> {
    match value {
        Value::Object(map) => Some(map.len()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Flags the root object and its direct children when they hold more
/// entries than the configured limit
pub struct SectionSizeRule {
    max_entries: usize,
    penalty: f64,
}

impl SectionSizeRule {
    pub fn new(max_entries: usize, penalty: f64) -> Self {
        Self {
            max_entries,
            penalty,
        }
    }

    fn oversized(&self, label: &str, value: &Value) -> Option<Issue> {
        let count = entry_count(value)?;
        (count > self.max_entries).then(|| {
            Issue::new(
                self.name(),
                self.category(),
                format!(
                    "section '{}' has {} entries (limit {})",
                    label, count, self.max_entries
                ),
                self.penalty,
            )
        })
    }
}

impl Rule for SectionSizeRule {
    fn name(&self) -> &'static str {
        "section-size"
    }

    fn description(&self) -> &'static str {
        "Detects JSON sections with too many entries"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Complexity
    }

    fn applies_to(&self, file_type: FileType) -> bool {
        file_type == FileType::Json
    }

    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue> {
        let Some(root) = ctx.json_value() else {
            return vec![];
        };

        let mut issues: Vec<Issue> = self.oversized("$", root).into_iter().collect();
        match root {
            Value::Object(map) => {
                for (key, child) in map {
                    issues.extend(self.oversized(key, child));
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    issues.extend(self.oversized(&format!("[{}]", i), child));
                }
            }
            _ => {}
        }
        issues
    }
}

/// Flags lines of a JSON document that still carry `@ref:` markers
pub struct UnresolvedReferenceRule {
    penalty: f64,
}

impl UnresolvedReferenceRule {
    pub fn new(penalty: f64) -> Self {
        Self { penalty }
    }
}

impl Rule for UnresolvedReferenceRule {
    fn name(&self) -> &'static str {
        "unresolved-reference"
    }

    fn description(&self) -> &'static str {
        "Detects unresolved @ref: markers in JSON documents"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Structure
    }

    fn applies_to(&self, file_type: FileType) -> bool {
        file_type == FileType::Json
    }

    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue> {
        if ctx.json_value().is_none() {
            return vec![];
        }
        ctx.lines
            .iter()
            .enumerate()
            .flat_map(|(i, line)| {
                line.match_indices(REFERENCE_MARKER).map(move |(at, _)| {
                    let target: String = line[at + REFERENCE_MARKER.len()..]
                        .chars()
                        .take_while(|c| !matches!(c, '"' | ',' | '}' | ']') && !c.is_whitespace())
                        .collect();
                    (i + 1, target)
                })
            })
            .map(|(line, target)| {
                Issue::new(
                    self.name(),
                    self.category(),
                    format!("unresolved reference '{}{}'", REFERENCE_MARKER, target),
                    self.penalty,
                )
                .at_line(line)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tests::run_rule;

    fn object_with(n: usize) -> String {
        let entries: Vec<String> = (0..n).map(|i| format!("\"k{}\": {}", i, i)).collect();
        format!("{{{}}}", entries.join(", "))
    }

    #[test]
    fn test_root_and_child_sections() {
        let rule = SectionSizeRule::new(9, 3.0);
        assert!(run_rule(&rule, "a.json", &object_with(9)).is_empty());

        let root = run_rule(&rule, "a.json", &object_with(10));
        assert_eq!(root.len(), 1);
        assert!(root[0].message.contains("'$' has 10 entries"));

        let nested = format!("{{\"rules\": {}, \"list\": [1,2,3]}}", object_with(12));
        let issues = run_rule(&rule, "a.json", &nested);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("'rules'"));
        assert_eq!(issues[0].category, IssueCategory::Complexity);
    }

    #[test]
    fn test_grandchildren_are_not_checked() {
        let rule = SectionSizeRule::new(9, 3.0);
        let deep = format!("{{\"a\": {{\"b\": {}}}}}", object_with(20));
        assert!(run_rule(&rule, "a.json", &deep).is_empty());
    }

    #[test]
    fn test_unresolved_references() {
        let rule = UnresolvedReferenceRule::new(1.0);
        let doc = "{\n  \"theme\": \"@ref:colors.primary\",\n  \"size\": 3\n}\n";
        let issues = run_rule(&rule, "a.json", doc);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, Some(2));
        assert!(issues[0].message.contains("@ref:colors.primary"));
    }

    #[test]
    fn test_json_rules_skip_other_types_and_bad_json() {
        let rule = UnresolvedReferenceRule::new(1.0);
        assert!(run_rule(&rule, "notes.md", "@ref:x\n").is_empty());
        assert!(run_rule(&rule, "bad.json", "{\"a\": \"@ref:x\"").is_empty());
    }
}
