//! File discovery
//!
//! Walks the working tree once per run and returns the candidate files as a
//! flat list of `FileRecord`s, ordered lexicographically by relative path so
//! repeated runs line up result-for-result.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ValidatorError, ValidatorResult};
use crate::models::{slash_path, FileRecord};

/// Compile shell-style globs: `*` stays inside one path segment, `**` spans segments.
pub fn compile_patterns(patterns: &[String]) -> ValidatorResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                ValidatorError::Configuration(format!("invalid glob '{}': {}", pattern, e))
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ValidatorError::Configuration(format!("failed to build globset: {}", e)))
}

/// Walk `root` and return every file matching an include pattern and no
/// exclude pattern. Exclusion wins when both match.
pub fn discover(
    root: &Path,
    include: &[String],
    exclude: &[String],
    respect_gitignore: bool,
) -> ValidatorResult<Vec<FileRecord>> {
    if !root.is_dir() {
        return Err(ValidatorError::Configuration(format!(
            "root {} does not exist or is not a directory",
            root.display()
        )));
    }

    let include_set = compile_patterns(include)?;
    let exclude_set = compile_patterns(exclude)?;

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(respect_gitignore)
        .git_global(false)
        .git_exclude(respect_gitignore)
        .require_git(false)
        .ignore(false)
        .parents(false);

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                skipped += 1;
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let rel_str = slash_path(relative);

        if !include_set.is_match(&rel_str) || exclude_set.is_match(&rel_str) {
            continue;
        }

        let byte_size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                0
            }
        };

        records.push(FileRecord::new(relative, byte_size));
    }

    records.sort_by(|a, b| a.display_path().cmp(&b.display_path()));

    debug!(
        "Discovered {} files under {} ({} entries skipped)",
        records.len(),
        root.display(),
        skipped
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_EXCLUDE_PATTERNS, DEFAULT_INCLUDE_PATTERNS};
    use crate::models::FileType;
    use std::fs;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_root_is_configuration_error() {
        let err =
            discover(Path::new("/no/such/root"), &patterns(&["**/*"]), &[], true).unwrap_err();
        assert!(matches!(err, ValidatorError::Configuration(_)));
    }

    #[test]
    fn test_lexicographic_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "zeta.rb", "x");
        write(dir.path(), "app/models/user.rb", "x");
        write(dir.path(), "alpha.md", "x");
        write(dir.path(), "app/b.js", "x");

        let files = discover(dir.path(), &patterns(&["**/*"]), &[], true).unwrap();
        let paths: Vec<String> = files.iter().map(|f| f.display_path()).collect();
        assert_eq!(paths, vec!["alpha.md", "app/b.js", "app/models/user.rb", "zeta.rb"]);
        assert_eq!(files[2].detected_type, FileType::Ruby);
        assert_eq!(files[2].byte_size, 1);
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.js", "x");
        write(dir.path(), "src/generated/bundle.js", "x");

        let files = discover(
            dir.path(),
            &patterns(&["**/*.js"]),
            &patterns(&["**/generated/**"]),
            true,
        )
        .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].display_path(), "src/app.js");
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "top.sh", "x");
        write(dir.path(), "scripts/deep.sh", "x");

        let files = discover(dir.path(), &patterns(&["*.sh"]), &[], true).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].display_path(), "top.sh");
    }

    #[test]
    fn test_default_patterns_skip_report_and_vendor() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "run_report.json", "{}");
        write(dir.path(), "vendor/lib.rb", "x");
        write(dir.path(), "config.json", "{}");
        write(dir.path(), "notes.txt", "x");

        let include: Vec<String> = DEFAULT_INCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect();
        let files = discover(dir.path(), &include, &exclude, true).unwrap();
        let paths: Vec<String> = files.iter().map(|f| f.display_path()).collect();
        assert_eq!(paths, vec!["config.json"]);
    }

    #[test]
    fn test_invalid_glob_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(dir.path(), &patterns(&["a[b"]), &[], true).unwrap_err();
        assert!(matches!(err, ValidatorError::Configuration(_)));
    }
}
