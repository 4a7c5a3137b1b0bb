//! Naming rules over declared identifiers
//!
//! Declarations are found with per-language regexes, not a parser, so the
//! rules only see names introduced by `def`, `class`, `function`, plain
//! assignments and the like. Each name is reported once, at its first
//! declaration.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use super::{is_comment_line, FileContext, Rule};
use crate::models::{FileType, Issue, IssueCategory};

static RUBY_DECL: OnceLock<Regex> = OnceLock::new();
static JS_DECL: OnceLock<Regex> = OnceLock::new();
static SHELL_DECL: OnceLock<Regex> = OnceLock::new();
static CSS_SELECTOR: OnceLock<Regex> = OnceLock::new();

fn ruby_decl() -> &'static Regex {
    RUBY_DECL.get_or_init(|| {
        Regex::new(
            r"^\s*(?:def\s+(?:self\.)?([A-Za-z_]\w*)|(?:class|module)\s+([A-Z]\w*)|@{0,2}([A-Za-z_]\w*)\s*(?:\|\||\+|-|\*)?=[^=~>])",
        )
        .expect("valid regex")
    })
}

fn js_decl() -> &'static Regex {
    JS_DECL.get_or_init(|| {
        Regex::new(r"\b(?:function\*?|class|const|let|var)\s+([A-Za-z_$][\w$]*)")
            .expect("valid regex")
    })
}

fn shell_decl() -> &'static Regex {
    SHELL_DECL.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?:export|local|readonly|declare)\s+)?([A-Za-z_]\w*)=|^\s*(?:function\s+)?([A-Za-z_][\w-]*)\s*\(\)",
        )
        .expect("valid regex")
    })
}

fn css_selector() -> &'static Regex {
    CSS_SELECTOR.get_or_init(|| Regex::new(r"[.#]([A-Za-z_][\w-]*)").expect("valid regex"))
}

/// Identifiers declared in a file, with the 1-based line of their first
/// declaration, in order of appearance
pub fn declared_identifiers(file_type: FileType, lines: &[&str]) -> Vec<(String, usize)> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment_line(file_type, trimmed) {
            continue;
        }

        let names: Vec<&str> = match file_type {
            FileType::Ruby => ruby_decl()
                .captures(line)
                .and_then(|c| c.iter().skip(1).flatten().next())
                .map(|m| m.as_str())
                .into_iter()
                .collect(),
            FileType::Javascript => js_decl()
                .captures_iter(line)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str())
                .collect(),
            FileType::Shell => shell_decl()
                .captures(line)
                .and_then(|c| c.iter().skip(1).flatten().next())
                .map(|m| m.as_str())
                .into_iter()
                .collect(),
            // Selectors only: property lines hold colours like `#fff`
            FileType::Css => match trimmed.find('{') {
                Some(brace) => css_selector()
                    .captures_iter(&trimmed[..brace])
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str())
                    .collect(),
                None if trimmed.ends_with(',') => css_selector()
                    .captures_iter(trimmed)
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str())
                    .collect(),
                None => vec![],
            },
            FileType::Html | FileType::Markdown | FileType::Json | FileType::Unknown => vec![],
        };

        for name in names {
            if seen.insert(name.to_string()) {
                found.push((name.to_string(), i + 1));
            }
        }
    }
    found
}

/// Split an identifier into lowercase word tokens on `_`, `-`, `$` and
/// camelCase boundaries
fn identifier_tokens(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if c == '_' || c == '-' || c == '$' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Flags declared identifiers outside the configured length band
pub struct IdentifierLengthRule {
    min_length: usize,
    max_length: usize,
    penalty: f64,
}

impl IdentifierLengthRule {
    pub fn new(min_length: usize, max_length: usize, penalty: f64) -> Self {
        Self {
            min_length,
            max_length,
            penalty,
        }
    }
}

impl Rule for IdentifierLengthRule {
    fn name(&self) -> &'static str {
        "identifier-length"
    }

    fn description(&self) -> &'static str {
        "Detects identifiers that are too short or too long"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Naming
    }

    fn applies_to(&self, file_type: FileType) -> bool {
        file_type.is_source()
    }

    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue> {
        declared_identifiers(ctx.file_type(), &ctx.lines)
            .into_iter()
            .filter_map(|(name, line)| {
                let len = name.chars().count();
                let problem = if len < self.min_length {
                    format!("identifier '{}' is shorter than {} characters", name, self.min_length)
                } else if len > self.max_length {
                    format!("identifier '{}' is longer than {} characters", name, self.max_length)
                } else {
                    return None;
                };
                Some(Issue::new(self.name(), self.category(), problem, self.penalty).at_line(line))
            })
            .collect()
    }
}

/// Flags identifiers built from abbreviations in the substitution table
pub struct AbbreviationRule {
    abbreviations: BTreeMap<String, String>,
    penalty: f64,
}

impl AbbreviationRule {
    pub fn new(abbreviations: BTreeMap<String, String>, penalty: f64) -> Self {
        let abbreviations = abbreviations
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self {
            abbreviations,
            penalty,
        }
    }
}

impl Rule for AbbreviationRule {
    fn name(&self) -> &'static str {
        "abbreviation"
    }

    fn description(&self) -> &'static str {
        "Detects abbreviated identifier words that have a spelled-out form"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Naming
    }

    fn applies_to(&self, file_type: FileType) -> bool {
        file_type.is_source()
    }

    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue> {
        if self.abbreviations.is_empty() {
            return vec![];
        }
        let mut issues = Vec::new();
        for (name, line) in declared_identifiers(ctx.file_type(), &ctx.lines) {
            let mut reported = HashSet::new();
            for token in identifier_tokens(&name) {
                let Some(full) = self.abbreviations.get(&token) else {
                    continue;
                };
                if reported.insert(token.clone()) {
                    issues.push(
                        Issue::new(
                            self.name(),
                            self.category(),
                            format!("identifier '{}' abbreviates '{}' as '{}'", name, full, token),
                            self.penalty,
                        )
                        .at_line(line),
                    );
                }
            }
        }
        issues
    }
}
