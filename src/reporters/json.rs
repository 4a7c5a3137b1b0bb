//! JSON reporter
//!
//! The run report is written as pretty-printed JSON. It is the durable
//! output of every run, including aborted ones.

use std::path::Path;

use crate::error::{ValidatorError, ValidatorResult};
use crate::fixes::write_atomically;
use crate::models::RunReport;
use anyhow::Result;

/// Render report as JSON
pub fn render(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write the report to `path`, creating parent directories as needed
pub fn write_report(report: &RunReport, path: &Path) -> ValidatorResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ValidatorError::file_access(parent, e))?;
    }
    let mut json = serde_json::to_string_pretty(report).map_err(|e| {
        ValidatorError::file_access(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    json.push('\n');
    write_atomically(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_json_render_valid() {
        let report = test_report();
        let json_str = render(&report).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json_str).expect("parse JSON");
        assert_eq!(parsed["mode"], "fix");
        assert_eq!(parsed["files_scanned"], 2);
        assert_eq!(parsed["overall_score"], 50.0);
        assert_eq!(parsed["aborted"], false);
        assert!(parsed["abort_reason"].is_null());
        assert_eq!(parsed["per_file_results"][1]["file"]["path"], "config/settings.json");
        assert_eq!(parsed["per_file_results"][1]["issues"][0]["error"], "ParseError");
        assert_eq!(parsed["rewrites"]["skipped"][0]["error"], "ParseError");
    }

    #[test]
    fn test_empty_run_has_null_score() {
        let report = RunReport::new(crate::models::RunMode::Validate, "/repo", false, 80.0);
        let parsed: serde_json::Value =
            serde_json::from_str(&render(&report).expect("render JSON")).expect("parse JSON");
        assert!(parsed["overall_score"].is_null());
        assert_eq!(parsed["per_file_results"].as_array().expect("results").len(), 0);
    }

    #[test]
    fn test_write_report_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out/nested/run_report.json");
        write_report(&test_report(), &path).expect("write report");
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(parsed["files_failed"], 1);
    }
}
