//! Text (terminal) reporter with colors and formatting

use crate::models::{RunReport, ScoreResult};
use anyhow::Result;

/// Reset ANSI color
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Files listed in the failing-files table
const MAX_LISTED: usize = 10;

fn score_color(score: f64, threshold: f64) -> &'static str {
    if score >= threshold {
        GREEN
    } else if score >= threshold - 20.0 {
        YELLOW
    } else {
        RED
    }
}

fn format_score(score: Option<f64>, threshold: f64) -> String {
    match score {
        Some(s) => format!("{}{:.1}{RESET}", score_color(s, threshold), s),
        None => format!("{DIM}n/a{RESET}"),
    }
}

/// Render report as formatted terminal output
pub fn render(report: &RunReport) -> Result<String> {
    let mut out = String::new();

    out.push_str(&format!("\n{BOLD}Compliance Validation{RESET} ({})\n", report.mode));
    out.push_str(&format!("{DIM}──────────────────────────────────────{RESET}\n"));
    out.push_str(&format!(
        "Score: {BOLD}{}{RESET}  Threshold: {:.1}  ",
        format_score(report.overall_score, report.compliance_threshold),
        report.compliance_threshold
    ));
    out.push_str(&format!(
        "Files: {}  Passed: {}  Failed: {}\n",
        report.files_scanned, report.files_passed, report.files_failed
    ));

    let status = if report.aborted {
        format!("{RED}{BOLD}ABORTED{RESET}")
    } else if report.is_compliant() {
        format!("{GREEN}{BOLD}COMPLIANT{RESET}")
    } else {
        format!("{RED}{BOLD}NOT COMPLIANT{RESET}")
    };
    out.push_str(&format!("Status: {}\n", status));
    if let Some(reason) = &report.abort_reason {
        out.push_str(&format!("  {DIM}{}: {}{RESET}\n", reason.kind, reason.message));
    }
    out.push('\n');

    let mut failing: Vec<&ScoreResult> = report
        .per_file_results
        .iter()
        .filter(|r| !r.passed)
        .collect();
    failing.sort_by(|a, b| a.score.total_cmp(&b.score));

    if !failing.is_empty() {
        out.push_str(&format!("{BOLD}FAILING FILES{RESET} ({} total)\n", failing.len()));
        out.push_str(&format!("{DIM}  SCORE   ISSUES  FILE{RESET}\n"));
        for result in failing.iter().take(MAX_LISTED) {
            out.push_str(&format!(
                "  {:>5}   {:>6}  {}\n",
                format_score(Some(result.score), report.compliance_threshold),
                result.issues.len(),
                result.file.display_path()
            ));
            if let Some(issue) = result.issues.first() {
                let location = issue.line.map(|l| format!(":{}", l)).unwrap_or_default();
                out.push_str(&format!(
                    "  {DIM}        {}{} {} ({}){RESET}\n",
                    issue.rule, location, issue.message, issue.category
                ));
            }
        }
        let remaining = failing.len().saturating_sub(MAX_LISTED);
        if remaining > 0 {
            out.push_str(&format!(
                "\n  {DIM}...and {} more (see the JSON report){RESET}\n",
                remaining
            ));
        }
        out.push('\n');
    }

    let rewrites = &report.rewrites;
    if !rewrites.modified.is_empty() || !rewrites.skipped.is_empty() {
        let verb = if report.dry_run { "Would rewrite" } else { "Rewrote" };
        out.push_str(&format!("{BOLD}REWRITES{RESET}\n"));
        out.push_str(&format!("  {} {} file(s)\n", verb, rewrites.modified.len()));
        for path in rewrites.modified.iter().take(MAX_LISTED) {
            out.push_str(&format!("  {GREEN}✓{RESET} {}\n", path));
        }
        for skipped in &rewrites.skipped {
            out.push_str(&format!(
                "  {YELLOW}!{RESET} {} {DIM}({}: {}){RESET}\n",
                crate::models::slash_path(&skipped.path),
                skipped.error,
                skipped.message
            ));
        }
        out.push('\n');
    }

    if report.circuit_breaker_activations > 0 {
        out.push_str(&format!(
            "{YELLOW}Circuit breaker tripped {} time(s){RESET}\n",
            report.circuit_breaker_activations
        ));
    }
    out.push_str(&format!("{DIM}Completed in {} ms{RESET}\n", report.duration_ms));

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_text_render_lists_failures() {
        let out = render(&test_report()).expect("render text");
        assert!(out.contains("Compliance Validation"));
        assert!(out.contains("NOT COMPLIANT"));
        assert!(out.contains("config/settings.json"));
        assert!(out.contains("structural-balance:1"));
        assert!(out.contains("Rewrote 1 file(s)"));
    }

    #[test]
    fn test_text_render_empty_run() {
        let report = RunReport::new(crate::models::RunMode::Validate, "/repo", true, 80.0);
        let out = render(&report).expect("render text");
        assert!(out.contains("n/a"));
        assert!(out.contains("COMPLIANT"));
        assert!(!out.contains("FAILING FILES"));
    }
}
