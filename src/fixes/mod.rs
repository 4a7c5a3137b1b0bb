//! Rule-based rewrites
//!
//! Deterministic transforms for the issues that have a mechanical fix.
//! Every transform checks the content it is about to change, so running the
//! rewriter on its own output changes nothing.
//!
//! Transforms run in a fixed order:
//!
//! 1. JSON documents are re-serialized with two-space indentation, key order
//!    preserved and a trailing newline.
//! 2. A `TODO` marker comment goes above every line over the length limit.
//! 3. Source files without a comment get a header comment naming the file,
//!    placed after any shebang or doctype line.
//! 4. Markdown documents without a heading get a `# Title` built from the
//!    file name.

use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;
use tempfile::NamedTempFile;

use crate::config::RuleConfig;
use crate::error::{ValidatorError, ValidatorResult};
use crate::models::{FileRecord, FileType, Issue};
use crate::rules::{has_header, is_preamble};

const TODO_MARKER: &str = "TODO: shorten line";

/// Result of rewriting one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Unchanged,
    Changed(String),
}

pub struct Rewriter {
    max_line_length: usize,
}

/// Content split into lines, remembering the newline style
struct Lines {
    lines: Vec<String>,
    newline: &'static str,
    trailing_newline: bool,
}

impl Lines {
    fn split(content: &str) -> Self {
        Self {
            lines: content.lines().map(str::to_string).collect(),
            newline: if content.contains("\r\n") { "\r\n" } else { "\n" },
            trailing_newline: content.ends_with('\n'),
        }
    }

    fn join(&self) -> String {
        let mut out = self.lines.join(self.newline);
        if self.trailing_newline {
            out.push_str(self.newline);
        }
        out
    }
}

fn has_rule(issues: &[Issue], rule: &str) -> bool {
    issues.iter().any(|i| i.rule == rule)
}

/// "getting_started" -> "Getting Started"
fn title_from_stem(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("Document");
    let words: Vec<String> = stem
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        "Document".to_string()
    } else {
        words.join(" ")
    }
}

impl Rewriter {
    pub fn new(config: &RuleConfig) -> Self {
        Self {
            max_line_length: config.max_line_length,
        }
    }

    /// Compute the rewritten content for one file.
    ///
    /// `issues` are the issues the scorer raised for `content`; a transform
    /// only runs when its rule fired. JSON that does not parse is an error and
    /// the file must be left alone.
    pub fn rewrite(
        &self,
        record: &FileRecord,
        content: &str,
        issues: &[Issue],
    ) -> ValidatorResult<RewriteOutcome> {
        if content.trim().is_empty() {
            return Ok(RewriteOutcome::Unchanged);
        }

        let file_type = record.detected_type;
        let mut updated = if file_type == FileType::Json {
            self.pretty_json(record, content)?
        } else {
            content.to_string()
        };

        // Decided on the incoming content so a TODO comment added below does
        // not count as a header
        let needs_header = has_rule(issues, "missing-header") && !has_header(file_type, content);

        if has_rule(issues, "line-length") {
            updated = self.mark_long_lines(file_type, &updated);
        }
        if needs_header {
            updated = match file_type {
                FileType::Markdown => insert_title(record, &updated),
                _ => insert_header(record, &updated),
            };
        }

        if updated == content {
            Ok(RewriteOutcome::Unchanged)
        } else {
            Ok(RewriteOutcome::Changed(updated))
        }
    }

    fn pretty_json(&self, record: &FileRecord, content: &str) -> ValidatorResult<String> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| ValidatorError::Parse {
                path: record.path.clone(),
                message: e.to_string(),
            })?;
        let mut pretty = serde_json::to_string_pretty(&value).map_err(|e| ValidatorError::Parse {
            path: record.path.clone(),
            message: e.to_string(),
        })?;
        pretty.push('\n');
        Ok(pretty)
    }

    fn mark_long_lines(&self, file_type: FileType, content: &str) -> String {
        let Some((prefix, suffix)) = file_type.comment_syntax() else {
            return content.to_string();
        };
        let source = Lines::split(content);
        let mut verbatim = Verbatim::default();
        let mut out = Vec::with_capacity(source.lines.len());

        for line in &source.lines {
            let protected = verbatim.protects(file_type, line);
            let too_long = line.chars().count() > self.max_line_length;
            // A marker may itself be over the limit; it never gets a marker
            let marked = line.contains(TODO_MARKER)
                || out
                    .last()
                    .is_some_and(|prev: &String| prev.contains(TODO_MARKER));
            if too_long && !marked && !protected {
                let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
                out.push(format!(
                    "{}{}{} ({} characters){}",
                    indent, prefix, TODO_MARKER, self.max_line_length, suffix
                ));
            }
            out.push(line.clone());
        }

        Lines {
            lines: out,
            ..source
        }
        .join()
    }
}

static RUBY_HEREDOC: OnceLock<Regex> = OnceLock::new();
static SHELL_HEREDOC: OnceLock<Regex> = OnceLock::new();
static HTML_RAW_OPEN: OnceLock<Regex> = OnceLock::new();

fn ruby_heredoc() -> &'static Regex {
    RUBY_HEREDOC.get_or_init(|| {
        Regex::new(r#"<<[~-]?['"`]?([A-Z_][A-Z0-9_]*)['"`]?"#).expect("valid regex")
    })
}

fn shell_heredoc() -> &'static Regex {
    SHELL_HEREDOC.get_or_init(|| {
        Regex::new(r#"(?:^|[^<])<<-?\s*['"]?([A-Za-z_]\w*)['"]?"#).expect("valid regex")
    })
}

fn html_raw_open() -> &'static Regex {
    HTML_RAW_OPEN
        .get_or_init(|| Regex::new(r"(?i)<(pre|textarea|script|style)\b").expect("valid regex"))
}

/// Tracks regions whose lines are content rather than code: heredoc
/// bodies, template literals, fenced blocks, block comments and raw HTML
/// elements. A comment inserted there would change what the file produces.
#[derive(Default)]
struct Verbatim {
    heredoc: Option<String>,
    fence: Option<&'static str>,
    template: bool,
    block_comment: bool,
    raw_tag: Option<String>,
}

impl Verbatim {
    /// Whether `line` starts inside a protected region. Call once per line,
    /// in order.
    fn protects(&mut self, file_type: FileType, line: &str) -> bool {
        match file_type {
            FileType::Ruby | FileType::Shell => self.heredoc_line(file_type, line),
            FileType::Javascript => {
                let inside = self.template || self.block_comment;
                self.scan_javascript(line);
                inside
            }
            FileType::Css => {
                let inside = self.block_comment;
                toggle_between(&mut self.block_comment, line, "/*", "*/");
                inside
            }
            FileType::Html => {
                let inside = self.block_comment || self.raw_tag.is_some();
                toggle_between(&mut self.block_comment, line, "<!--", "-->");
                self.scan_raw_tag(line);
                inside
            }
            FileType::Markdown => {
                let trimmed = line.trim_start();
                if let Some(fence) = self.fence {
                    if trimmed.starts_with(fence) {
                        self.fence = None;
                    }
                    return true;
                }
                if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                    self.fence = Some(if trimmed.starts_with('`') { "```" } else { "~~~" });
                    return false;
                }
                let inside = self.block_comment;
                toggle_between(&mut self.block_comment, line, "<!--", "-->");
                inside
            }
            FileType::Json | FileType::Unknown => false,
        }
    }

    fn heredoc_line(&mut self, file_type: FileType, line: &str) -> bool {
        if let Some(terminator) = &self.heredoc {
            if line.trim() == terminator.as_str() {
                self.heredoc = None;
            }
            return true;
        }
        if line.trim_start().starts_with('#') {
            return false;
        }
        let opener = match file_type {
            FileType::Ruby => ruby_heredoc(),
            _ => shell_heredoc(),
        };
        if let Some(caps) = opener.captures(line) {
            self.heredoc = Some(caps[1].to_string());
        }
        false
    }

    fn scan_javascript(&mut self, line: &str) {
        let mut chars = line.chars().peekable();
        let mut quote: Option<char> = None;
        while let Some(c) = chars.next() {
            if self.block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.block_comment = false;
                }
                continue;
            }
            if self.template || quote.is_some() {
                let close = if self.template { '`' } else { quote.unwrap_or('`') };
                if c == '\\' {
                    chars.next();
                } else if c == close {
                    self.template = false;
                    quote = None;
                }
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '`' => self.template = true,
                '/' if chars.peek() == Some(&'/') => return,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    self.block_comment = true;
                }
                _ => {}
            }
        }
    }

    fn scan_raw_tag(&mut self, line: &str) {
        let lower = line.to_ascii_lowercase();
        let mut from = 0;
        loop {
            match &self.raw_tag {
                Some(tag) => match lower[from..].find(&format!("</{}", tag)) {
                    Some(at) => {
                        from += at + tag.len() + 2;
                        self.raw_tag = None;
                    }
                    None => return,
                },
                None => match html_raw_open().captures(&lower[from..]) {
                    Some(caps) => {
                        let whole = caps.get(0).map_or(0, |m| m.end());
                        self.raw_tag = Some(caps[1].to_string());
                        from += whole;
                    }
                    None => return,
                },
            }
        }
    }
}

/// Flip `inside` at every `open` (when outside) and `close` (when inside)
fn toggle_between(inside: &mut bool, line: &str, open: &str, close: &str) {
    let mut rest = line;
    loop {
        let token = if *inside { close } else { open };
        match rest.find(token) {
            Some(at) => {
                *inside = !*inside;
                rest = &rest[at + token.len()..];
            }
            None => return,
        }
    }
}

fn insert_header(record: &FileRecord, content: &str) -> String {
    let Some((prefix, suffix)) = record.detected_type.comment_syntax() else {
        return content.to_string();
    };
    let name = record
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| record.display_path());
    let header = format!("{}{}{}", prefix, name, suffix);

    let mut doc = Lines::split(content);
    let at = match doc.lines.first() {
        Some(first) if is_preamble(first) => 1,
        _ => 0,
    };
    doc.lines.insert(at, header);
    doc.join()
}

fn insert_title(record: &FileRecord, content: &str) -> String {
    let mut doc = Lines::split(content);
    let title = format!("# {}", title_from_stem(&record.path));
    doc.lines.insert(0, String::new());
    doc.lines.insert(0, title);
    doc.join()
}

/// Replace `path` with `content` through a temp file in the same directory,
/// keeping the original file's permissions
pub fn write_atomically(path: &Path, content: &str) -> ValidatorResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let to_err = |e: std::io::Error| ValidatorError::file_access(path, e);

    let mut tmp = NamedTempFile::new_in(dir).map_err(to_err)?;
    tmp.write_all(content.as_bytes()).map_err(to_err)?;
    tmp.as_file().sync_all().map_err(to_err)?;
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(to_err)?;
    }
    tmp.persist(path).map_err(|e| to_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::scoring::RuleScorer;

    fn rewriter() -> Rewriter {
        Rewriter::new(&RuleConfig::default())
    }

    /// Score then rewrite, the way fix mode does
    fn fix(path: &str, content: &str) -> RewriteOutcome {
        let record = FileRecord::new(path, content.len() as u64);
        let result = RuleScorer::new(&ValidatorConfig::default()).score(&record, content);
        rewriter().rewrite(&record, content, &result.issues).unwrap()
    }

    /// Score then rewrite under a custom line limit
    fn fix_with_limit(max_line_length: usize, path: &str, content: &str) -> RewriteOutcome {
        let mut config = ValidatorConfig::default();
        config.rules.max_line_length = max_line_length;
        let record = FileRecord::new(path, content.len() as u64);
        let result = RuleScorer::new(&config).score(&record, content);
        Rewriter::new(&config.rules)
            .rewrite(&record, content, &result.issues)
            .unwrap()
    }

    fn changed(outcome: RewriteOutcome) -> String {
        match outcome {
            RewriteOutcome::Changed(s) => s,
            RewriteOutcome::Unchanged => panic!("expected a change"),
        }
    }

    #[test]
    fn test_json_pretty_printed_in_key_order() {
        let out = changed(fix("config.json", r#"{"zeta":1,"alpha":{"b":[1,2]}}"#));
        assert_eq!(
            out,
            "{\n  \"zeta\": 1,\n  \"alpha\": {\n    \"b\": [\n      1,\n      2\n    ]\n  }\n}\n"
        );
        assert_eq!(fix("config.json", &out), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let record = FileRecord::new("bad.json", 6);
        let err = rewriter().rewrite(&record, r#"{"a":}"#, &[]).unwrap_err();
        assert!(matches!(err, ValidatorError::Parse { .. }));
    }

    #[test]
    fn test_todo_marker_above_long_lines() {
        let long = format!("    call({})", "x".repeat(130));
        let src = format!("# Runner\n{}\nputs 1\n", long);
        let out = changed(fix("run.rb", &src));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "    # TODO: shorten line (120 characters)");
        assert_eq!(lines[2], long);
        assert_eq!(fix("run.rb", &out), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_marker_longer_than_limit_is_not_marked_again() {
        let src = format!("# Runner\n{}\n", "x".repeat(40));
        let out = changed(fix_with_limit(30, "run.rb", &src));
        assert_eq!(out.matches(TODO_MARKER).count(), 1);
        assert_eq!(fix_with_limit(30, "run.rb", &out), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_deeply_indented_long_line_marked_once() {
        let src = format!("# Runner\n{}{}\n", " ".repeat(90), "x".repeat(42));
        let out = changed(fix("run.rb", &src));
        assert_eq!(out.matches(TODO_MARKER).count(), 1);
        assert_eq!(fix("run.rb", &out), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_shell_heredoc_body_left_alone() {
        let body = format!("<div>{}</div>", "x".repeat(150));
        let tail = format!("echo {}", "y".repeat(130));
        let src = format!(
            "#!/bin/sh\n# Generates the index view\ncat > index.html.erb <<'EOF'\n{}\nEOF\n{}\n",
            body, tail
        );
        let out = changed(fix("gen.sh", &src));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[3], body);
        assert_eq!(lines[4], "EOF");
        assert_eq!(lines[5], "# TODO: shorten line (120 characters)");
        assert_eq!(lines[6], tail);
        assert_eq!(fix("gen.sh", &out), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_verbatim_regions_left_alone() {
        let long = "x".repeat(150);
        let cases = [
            ("query.rb", format!("# Query helper\nQUERY = <<~SQL\n  SELECT {}\nSQL\n", long)),
            ("card.js", format!("// Renders the card\nconst card = `\n  <p>{}</p>\n`;\n", long)),
            ("guide.md", format!("# Guide\n\n```\n{}\n```\n", long)),
            ("theme.css", format!("/* Theme */\n/*\n  {}\n*/\nbody {{ margin: 0; }}\n", long)),
            ("page.html", format!("<!-- Page -->\n<pre>\n{}\n</pre>\n", long)),
        ];
        for (path, src) in cases {
            assert_eq!(fix(path, &src), RewriteOutcome::Unchanged, "{}", path);
        }
    }

    #[test]
    fn test_code_after_template_literal_still_marked() {
        let src = format!("// Card\nconst a = `one\ntwo`;\nrun({});\n", "x".repeat(130));
        let out = changed(fix("card.js", &src));
        assert!(out.contains("`;\n// TODO: shorten line (120 characters)\nrun("));
    }

    #[test]
    fn test_header_goes_after_shebang() {
        let out = changed(fix("bin/deploy.sh", "#!/bin/bash\necho deploy\n"));
        assert_eq!(out, "#!/bin/bash\n# deploy.sh\necho deploy\n");
        assert_eq!(fix("bin/deploy.sh", &out), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_header_comment_syntax_per_type() {
        assert!(changed(fix("app.js", "run();\n")).starts_with("// app.js\n"));
        assert!(changed(fix("site.css", "body { margin: 0; }\n")).starts_with("/* site.css */\n"));
        let html = changed(fix("index.html", "<!DOCTYPE html>\n<p>hi</p>\n"));
        assert_eq!(html, "<!DOCTYPE html>\n<!-- index.html -->\n<p>hi</p>\n");
    }

    #[test]
    fn test_header_added_even_when_todo_inserted() {
        let src = format!("{}\n", "x".repeat(130));
        let out = changed(fix("long.js", &src));
        assert!(out.starts_with("// long.js\n// TODO: shorten line"));
        assert_eq!(fix("long.js", &out), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_markdown_title_from_stem() {
        let out = changed(fix("docs/getting_started.md", "Some intro text.\n"));
        assert_eq!(out, "# Getting Started\n\nSome intro text.\n");
        assert_eq!(fix("docs/getting_started.md", &out), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_crlf_preserved() {
        let out = changed(fix("a.rb", "puts 1\r\nputs 2\r\n"));
        assert_eq!(out, "# a.rb\r\nputs 1\r\nputs 2\r\n");
    }

    #[test]
    fn test_clean_file_unchanged() {
        assert_eq!(fix("a.rb", "# Helper\nputs 1\n"), RewriteOutcome::Unchanged);
        assert_eq!(fix("empty.json", ""), RewriteOutcome::Unchanged);
    }

    #[test]
    fn test_write_atomically_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rb");
        fs::write(&path, "old").unwrap();
        write_atomically(&path, "new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
