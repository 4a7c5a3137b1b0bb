//! CLI command definitions and handlers

mod init;
mod monitor;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{load_config, ValidatorConfig, CONFIG_ENV_VAR};
use crate::error::ValidatorError;
use crate::models::RunMode;
use crate::pipeline::CancelFlag;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse a compliance threshold (0-100)
fn parse_threshold(s: &str) -> Result<f64, String> {
    let t: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if (0.0..=100.0).contains(&t) {
        Ok(t)
    } else {
        Err("threshold must be between 0 and 100".to_string())
    }
}

fn parse_batch_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid number", s)),
    }
}

/// Validator - heuristic compliance checks for a working tree
#[derive(Parser, Debug)]
#[command(name = "validator")]
#[command(
    version,
    about = "Score a working tree against compliance rules, rewrite what can be fixed, and write a run report",
    after_help = "\
Examples:
  validator validate                       Score the current directory
  validator validate --root app --threshold 90
  validator fix --dry-run                  Show which files would be rewritten
  validator fix --batch-size 50 --workers 4
  validator monitor                        Watch resource usage until Ctrl-C
  validator init                           Write a default master.json

Exit codes: 0 compliant, 1 below threshold or aborted, 2 configuration error"
)]
pub struct Cli {
    /// Root of the tree to validate
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Minimum score (0-100) for a file and for the run to pass
    #[arg(long, global = true, value_parser = parse_threshold)]
    pub threshold: Option<f64>,

    /// Files per batch
    #[arg(long, global = true, value_parser = parse_batch_size)]
    pub batch_size: Option<usize>,

    /// Record rewrites without writing files
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Config file (default: <root>/master.json)
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Report path (default: <root>/run_report.json)
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Number of scoring workers (1-64, capped at the CPU count)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        default_value = "warn",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score every candidate file and write the run report
    #[command(after_help = "\
Examples:
  validator validate                       Score the current directory
  validator validate --format json         Print the full report as JSON
  validator validate --report out/run.json Write the report elsewhere")]
    Validate {
        /// Summary format on stdout: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Score, then rewrite files whose issues have a mechanical fix
    #[command(after_help = "\
Examples:
  validator fix                            Rewrite fixable files in place
  validator fix --dry-run                  Only list the files that would change")]
    Fix {
        /// Summary format on stdout: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Run the resource monitor alone and print every sample
    Monitor {
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Write a default master.json into the root
    Init,
}

/// Run the parsed command and return the process exit code
pub fn run(cli: Cli) -> Result<u8> {
    match &cli.command {
        Commands::Init => {
            init::run(&cli.root)?;
            Ok(0)
        }
        Commands::Validate { format, no_progress } => {
            let config = resolve_config(&cli)?;
            run::run(&cli.root, config, RunMode::Validate, cli.dry_run, format, !no_progress)
        }
        Commands::Fix { format, no_progress } => {
            let config = resolve_config(&cli)?;
            run::run(&cli.root, config, RunMode::Fix, cli.dry_run, format, !no_progress)
        }
        Commands::Monitor { duration } => {
            let config = resolve_config(&cli)?;
            monitor::run(&config, *duration)?;
            Ok(0)
        }
    }
}

/// Exit code for an error that escaped `run`
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ValidatorError>())
        .map(ValidatorError::exit_code)
        .unwrap_or(1)
}

/// Load the config file, then apply command-line overrides
fn resolve_config(cli: &Cli) -> Result<ValidatorConfig> {
    let mut config = load_config(&cli.root, cli.config.as_deref())?;
    apply_overrides(&mut config, cli);
    config.sanitize();
    Ok(config)
}

fn apply_overrides(config: &mut ValidatorConfig, cli: &Cli) {
    if let Some(threshold) = cli.threshold {
        config.compliance_threshold = threshold;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(workers) = cli.workers {
        config.workers = Some(workers);
    }
    if let Some(report) = &cli.report {
        config.report_path = Some(absolute_from_cwd(report));
    }
}

/// `--report` is relative to where the command runs, not to the root
fn absolute_from_cwd(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Set the returned flag on Ctrl-C. A second Ctrl-C exits immediately.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);

    let spawned = std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("Ctrl-C handling unavailable: {}", e);
                    return;
                }
            };
            rt.block_on(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                eprintln!("\nInterrupted, stopping after the current batch (Ctrl-C again to quit)");
                flag.store(true, Ordering::SeqCst);
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });
        });
    if let Err(e) = spawned {
        warn!("Ctrl-C handling unavailable: {}", e);
    } else {
        debug!("Ctrl-C handler installed");
    }

    cancel
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&[
            "validator", "validate", "--root", "app", "--threshold", "90", "--workers", "2",
        ]);
        assert_eq!(cli.root, PathBuf::from("app"));
        assert_eq!(cli.threshold, Some(90.0));
        assert_eq!(cli.workers, Some(2));
        assert!(matches!(cli.command, Commands::Validate { .. }));
    }

    #[test]
    fn test_invalid_flags_rejected() {
        assert!(Cli::try_parse_from(["validator", "validate", "--threshold", "101"]).is_err());
        assert!(Cli::try_parse_from(["validator", "validate", "--batch-size", "0"]).is_err());
        assert!(Cli::try_parse_from(["validator", "fix", "--workers", "0"]).is_err());
        assert!(Cli::try_parse_from(["validator", "validate", "--format", "xml"]).is_err());
        assert!(Cli::try_parse_from(["validator"]).is_err());
    }

    #[test]
    fn test_overrides_win_over_config() {
        let cli = parse(&[
            "validator", "fix", "--threshold", "55", "--batch-size", "7", "--report", "/tmp/r.json",
        ]);
        let mut config = ValidatorConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.compliance_threshold, 55.0);
        assert_eq!(config.batch_size, 7);
        assert_eq!(config.report_path, Some(PathBuf::from("/tmp/r.json")));
        assert_eq!(config.workers, None);
    }

    #[test]
    fn test_exit_code_from_wrapped_error() {
        let err = anyhow::Error::new(ValidatorError::Configuration("bad".into()))
            .context("loading config");
        assert_eq!(exit_code_for(&err), 2);
        assert_eq!(exit_code_for(&anyhow::anyhow!("other")), 1);
        let interrupted = anyhow::Error::new(ValidatorError::Interrupted { next_batch: 1 });
        assert_eq!(exit_code_for(&interrupted), 1);
    }
}
