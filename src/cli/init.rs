//! Init command - write a default config into the root

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use crate::config::{ValidatorConfig, DEFAULT_CONFIG_FILE};
use crate::error::ValidatorError;

/// Default config document, with every key spelled out under `"validator"`
fn default_document() -> Result<String> {
    let document = serde_json::json!({ "validator": ValidatorConfig::default() });
    let mut out = serde_json::to_string_pretty(&document)?;
    out.push('\n');
    Ok(out)
}

/// Run the init command
pub fn run(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(ValidatorError::Configuration(format!(
            "root {} is not a directory",
            path.display()
        ))
        .into());
    }

    let config_path = path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!(
            "{} already exists; remove it first to regenerate the defaults",
            config_path.display()
        );
    }

    std::fs::write(&config_path, default_document()?)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );

    println!("\nNext steps:");
    println!("  {} Score the tree", style("validator validate").cyan());
    println!("  {} Preview rewrites", style("validator fix --dry-run").cyan());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path()).unwrap();

        let config = load_config(dir.path(), None).unwrap();
        let defaults = ValidatorConfig::default();
        assert_eq!(config.compliance_threshold, defaults.compliance_threshold);
        assert_eq!(config.batch_size, defaults.batch_size);
        assert_eq!(config.rules.max_line_length, defaults.rules.max_line_length);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "{\"compliance_threshold\": 50}").unwrap();

        assert!(run(dir.path()).is_err());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"compliance_threshold\": 50}"
        );
    }

    #[test]
    fn test_init_missing_root_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidatorError>(),
            Some(ValidatorError::Configuration(_))
        ));
    }
}
