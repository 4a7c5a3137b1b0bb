//! Structural balance
//!
//! Approximates "is this file structurally complete" by counting opening and
//! closing constructs per file type. The counting is deliberately naive and
//! lives behind `StructuralChecker` so a parser-backed checker can replace it
//! without touching the rest of the scorer.
//!
//! JSON is checked by actually parsing it: a structured file that does not
//! parse cannot be trusted at all, so it costs the whole score.

use regex::Regex;
use std::sync::OnceLock;

use super::{is_comment_line, FileContext, Rule};
use crate::error::ErrorKind;
use crate::models::{FileType, Issue, IssueCategory, MAX_SCORE};

/// An opening construct whose count does not match its closer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Imbalance {
    /// What was counted, e.g. "block (if/def/do ... end)"
    pub construct: String,
    pub opened: usize,
    pub closed: usize,
    /// Line of the last opener, when known
    pub line: Option<usize>,
}

/// Pluggable structure checker
pub trait StructuralChecker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Report every imbalanced construct pair, in a stable order
    fn check(&self, file_type: FileType, lines: &[&str]) -> Vec<Imbalance>;
}

/// Keyword and delimiter counting
pub struct KeywordBalanceChecker;

const RUBY_OPENERS: &[&str] = &[
    "if", "unless", "while", "until", "case", "begin", "def", "class", "module", "for",
];

static RUBY_OPENER: OnceLock<Regex> = OnceLock::new();
static RUBY_ASSIGNED_OPENER: OnceLock<Regex> = OnceLock::new();
static RUBY_TRAILING_DO: OnceLock<Regex> = OnceLock::new();
static RUBY_LOOP_HEADER: OnceLock<Regex> = OnceLock::new();
static HTML_OPEN: OnceLock<Regex> = OnceLock::new();
static HTML_CLOSE: OnceLock<Regex> = OnceLock::new();

fn ruby_opener() -> &'static Regex {
    RUBY_OPENER.get_or_init(|| {
        Regex::new(&format!(r"^(?:{})\b", RUBY_OPENERS.join("|"))).expect("valid regex")
    })
}

fn ruby_assigned_opener() -> &'static Regex {
    RUBY_ASSIGNED_OPENER
        .get_or_init(|| Regex::new(r"=\s*(?:if|unless|case|begin)\b").expect("valid regex"))
}

fn ruby_trailing_do() -> &'static Regex {
    RUBY_TRAILING_DO
        .get_or_init(|| Regex::new(r"\bdo\s*(?:\|[^|]*\|)?\s*$").expect("valid regex"))
}

fn ruby_loop_header() -> &'static Regex {
    RUBY_LOOP_HEADER.get_or_init(|| Regex::new(r"^(?:while|until|for)\b").expect("valid regex"))
}

const HTML_BLOCK_TAGS: &[&str] = &["div", "section", "ul", "ol", "table", "form", "nav", "main"];

fn html_open() -> &'static Regex {
    HTML_OPEN.get_or_init(|| {
        Regex::new(&format!(r"(?i)<({})\b", HTML_BLOCK_TAGS.join("|"))).expect("valid regex")
    })
}

fn html_close() -> &'static Regex {
    HTML_CLOSE.get_or_init(|| {
        Regex::new(&format!(r"(?i)</({})\s*>", HTML_BLOCK_TAGS.join("|"))).expect("valid regex")
    })
}

/// Strip a trailing `# comment` from a Ruby or shell line (outside quotes)
fn strip_hash_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev = ' ';
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q && prev != '\\' => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '#' && (i == 0 || prev.is_whitespace()) => return &line[..i],
            None => {}
        }
        prev = c;
    }
    line
}

fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ';')
        .filter(|t| !t.is_empty())
}

fn is_ruby_end(token: &str) -> bool {
    token == "end"
        || token
            .strip_prefix("end")
            .is_some_and(|rest| rest.starts_with(['.', ')', ',', ']', '}']))
}

impl KeywordBalanceChecker {
    fn check_ruby(lines: &[&str]) -> Vec<Imbalance> {
        let mut opened = 0;
        let mut closed = 0;
        let mut last_open = None;
        let mut in_doc = false;

        for (i, raw) in lines.iter().enumerate() {
            let trimmed = raw.trim();
            if trimmed.starts_with("=begin") {
                in_doc = true;
                continue;
            }
            if in_doc {
                if trimmed.starts_with("=end") {
                    in_doc = false;
                }
                continue;
            }
            if trimmed.is_empty() || is_comment_line(FileType::Ruby, trimmed) {
                continue;
            }
            let code = strip_hash_comment(trimmed);

            let mut line_opens = 0;
            if ruby_opener().is_match(code) {
                line_opens += 1;
            } else if ruby_assigned_opener().is_match(code) {
                line_opens += 1;
            }
            // `while x do` is one block, not two
            if !ruby_loop_header().is_match(code) && ruby_trailing_do().is_match(code) {
                line_opens += 1;
            }

            if line_opens > 0 {
                opened += line_opens;
                last_open = Some(i + 1);
            }
            closed += tokens(code).filter(|t| is_ruby_end(t)).count();
        }

        if opened == closed {
            return vec![];
        }
        vec![Imbalance {
            construct: "block (if/def/do ... end)".to_string(),
            opened,
            closed,
            line: last_open,
        }]
    }

    fn check_shell(lines: &[&str]) -> Vec<Imbalance> {
        const PAIRS: [(&str, &str); 3] = [("if", "fi"), ("case", "esac"), ("do", "done")];
        let mut counts = [(0usize, 0usize, None::<usize>); 3];

        for (i, raw) in lines.iter().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            for token in tokens(strip_hash_comment(trimmed)) {
                for (slot, (open, close)) in PAIRS.iter().enumerate() {
                    if token == *open {
                        counts[slot].0 += 1;
                        counts[slot].2 = Some(i + 1);
                    } else if token == *close {
                        counts[slot].1 += 1;
                    }
                }
            }
        }

        PAIRS
            .iter()
            .zip(counts)
            .filter(|(_, (o, c, _))| o != c)
            .map(|((open, close), (opened, closed, line))| Imbalance {
                construct: format!("{}/{}", open, close),
                opened,
                closed,
                line,
            })
            .collect()
    }

    /// Count delimiters outside strings and comments
    fn check_delimiters(lines: &[&str], pairs: &[(char, char)]) -> Vec<Imbalance> {
        let mut opened = vec![0usize; pairs.len()];
        let mut closed = vec![0usize; pairs.len()];
        let mut last_open: Vec<Option<usize>> = vec![None; pairs.len()];
        let mut in_block_comment = false;

        for (i, line) in lines.iter().enumerate() {
            let chars: Vec<char> = line.chars().collect();
            let mut quote: Option<char> = None;
            let mut j = 0;
            while j < chars.len() {
                let c = chars[j];
                let next = chars.get(j + 1).copied();
                if in_block_comment {
                    if c == '*' && next == Some('/') {
                        in_block_comment = false;
                        j += 1;
                    }
                } else if let Some(q) = quote {
                    if c == '\\' {
                        j += 1;
                    } else if c == q {
                        quote = None;
                    }
                } else if c == '/' && next == Some('*') {
                    in_block_comment = true;
                    j += 1;
                } else if c == '/' && next == Some('/') {
                    break;
                } else if c == '"' || c == '\'' || c == '`' {
                    quote = Some(c);
                } else {
                    for (slot, (open, close)) in pairs.iter().enumerate() {
                        if c == *open {
                            opened[slot] += 1;
                            last_open[slot] = Some(i + 1);
                        } else if c == *close {
                            closed[slot] += 1;
                        }
                    }
                }
                j += 1;
            }
        }

        pairs
            .iter()
            .enumerate()
            .filter(|(slot, _)| opened[*slot] != closed[*slot])
            .map(|(slot, (open, close))| Imbalance {
                construct: format!("{}{}", open, close),
                opened: opened[slot],
                closed: closed[slot],
                line: last_open[slot],
            })
            .collect()
    }

    fn check_html(lines: &[&str]) -> Vec<Imbalance> {
        let mut imbalances = Vec::new();
        for tag in HTML_BLOCK_TAGS {
            let mut opened = 0;
            let mut closed = 0;
            let mut line = None;
            for (i, l) in lines.iter().enumerate() {
                let opens = html_open()
                    .captures_iter(l)
                    .filter(|c| c[1].eq_ignore_ascii_case(tag))
                    .count();
                if opens > 0 {
                    opened += opens;
                    line = Some(i + 1);
                }
                closed += html_close()
                    .captures_iter(l)
                    .filter(|c| c[1].eq_ignore_ascii_case(tag))
                    .count();
            }
            if opened != closed {
                imbalances.push(Imbalance {
                    construct: format!("<{}>", tag),
                    opened,
                    closed,
                    line,
                });
            }
        }
        imbalances
    }

    fn check_markdown(lines: &[&str]) -> Vec<Imbalance> {
        let fences: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.trim_start().starts_with("```"))
            .map(|(i, _)| i + 1)
            .collect();
        if fences.len() % 2 == 0 {
            return vec![];
        }
        vec![Imbalance {
            construct: "code fence".to_string(),
            opened: fences.len() / 2 + 1,
            closed: fences.len() / 2,
            line: fences.last().copied(),
        }]
    }
}

impl StructuralChecker for KeywordBalanceChecker {
    fn name(&self) -> &'static str {
        "keyword-balance"
    }

    fn check(&self, file_type: FileType, lines: &[&str]) -> Vec<Imbalance> {
        match file_type {
            FileType::Ruby => Self::check_ruby(lines),
            FileType::Shell => Self::check_shell(lines),
            FileType::Javascript => {
                Self::check_delimiters(lines, &[('{', '}'), ('(', ')'), ('[', ']')])
            }
            FileType::Css => Self::check_delimiters(lines, &[('{', '}')]),
            FileType::Html => Self::check_html(lines),
            FileType::Markdown => Self::check_markdown(lines),
            FileType::Json | FileType::Unknown => vec![],
        }
    }
}

/// Rule wrapper around a `StructuralChecker`, plus the JSON parse check
pub struct StructuralBalanceRule {
    checker: Box<dyn StructuralChecker>,
    penalty: f64,
}

impl StructuralBalanceRule {
    pub fn new(checker: Box<dyn StructuralChecker>, penalty: f64) -> Self {
        Self { checker, penalty }
    }
}

impl Rule for StructuralBalanceRule {
    fn name(&self) -> &'static str {
        "structural-balance"
    }

    fn description(&self) -> &'static str {
        "Detects unbalanced blocks, delimiters and unparseable structured files"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Structure
    }

    fn check(&self, ctx: &FileContext<'_>) -> Vec<Issue> {
        if let Some(Err(e)) = &ctx.json {
            return vec![Issue::new(
                self.name(),
                self.category(),
                format!("JSON does not parse: {}", e),
                MAX_SCORE,
            )
            .at_line(e.line())
            .tagged(ErrorKind::ParseError)];
        }

        self.checker
            .check(ctx.file_type(), &ctx.lines)
            .into_iter()
            .map(|imb| {
                let issue = Issue::new(
                    self.name(),
                    self.category(),
                    format!(
                        "unbalanced {}: {} opening vs {} closing",
                        imb.construct, imb.opened, imb.closed
                    ),
                    self.penalty,
                );
                match imb.line {
                    Some(line) => issue.at_line(line),
                    None => issue,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tests::run_rule;

    fn rule() -> StructuralBalanceRule {
        StructuralBalanceRule::new(Box::new(KeywordBalanceChecker), 10.0)
    }

    #[test]
    fn test_ruby_unbalanced_if_end() {
        let src = "if ready\n  go\nif done\n  stop\nif late\n  hurry\nend\n";
        let issues = run_rule(&rule(), "flow.rb", src);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::Structure);
        assert!(issues[0].message.contains("3 opening vs 1 closing"));
        assert_eq!(issues[0].score_penalty, 10.0);
    }

    #[test]
    fn test_ruby_balanced_blocks() {
        let src = r#"
# Order helpers
class OrderHelper
  def total(items)
    items.each do |item|
      puts item unless item.nil?
    end
    return 0 if items.empty?
    value = if items.size > 2 then 1 else 2 end
    value
  end

  def name; "x"; end
end
"#;
        assert!(run_rule(&rule(), "helper.rb", src).is_empty());
    }

    #[test]
    fn test_ruby_do_after_loop_like_receiver() {
        let forms = "# Renders forms\nforms.each do |form|\n  render form\nend\n";
        assert!(run_rule(&rule(), "forms.rb", forms).is_empty());
        let respond = "format.json do\n  render json: x\nend\nuntil_done do\n  step\nend\n";
        assert!(run_rule(&rule(), "respond.rb", respond).is_empty());
        let loops = "while busy do\n  wait\nend\nfor i in items do\n  p i\nend\n";
        assert!(run_rule(&rule(), "loops.rb", loops).is_empty());
    }

    #[test]
    fn test_ruby_ignores_comments_and_doc_blocks() {
        let src = "=begin\nif this were code\n=end\n# if commented\ndef run\n  true # end\nend\n";
        assert!(run_rule(&rule(), "doc.rb", src).is_empty());
    }

    #[test]
    fn test_shell_pairs() {
        let src = "#!/bin/sh\nif [ -f x ]; then\n  for f in *; do\n    echo $f\n  done\n";
        let issues = run_rule(&rule(), "install.sh", src);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("if/fi"));
        assert_eq!(issues[0].line, Some(2));
    }

    #[test]
    fn test_javascript_delimiters_skip_strings_and_comments() {
        let ok = "// {\nconst label = \"{[(\";\nfunction go() { return [1, 2]; }\n/* } */\n";
        assert!(run_rule(&rule(), "app.js", ok).is_empty());

        let bad = "function go() {\n  if (x) {\n    run();\n}\n";
        let issues = run_rule(&rule(), "app.js", bad);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("{}: 2 opening vs 1 closing"));
    }

    #[test]
    fn test_html_tags() {
        let src = "<div class=\"card\">\n  <section>\n  </section>\n";
        let issues = run_rule(&rule(), "index.html", src);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("<div>"));
    }

    #[test]
    fn test_markdown_fence() {
        let issues = run_rule(&rule(), "README.md", "# Title\n```ruby\nputs 1\n");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("code fence"));
    }

    #[test]
    fn test_invalid_json_costs_whole_score() {
        let issues = run_rule(&rule(), "broken.json", r#"{"a":}"#);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].error, Some(ErrorKind::ParseError));
        assert_eq!(issues[0].score_penalty, MAX_SCORE);
    }

    #[test]
    fn test_valid_json_is_fine() {
        assert!(run_rule(&rule(), "ok.json", r#"{"a": [1, 2]}"#).is_empty());
    }
}
