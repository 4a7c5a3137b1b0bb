//! validate / fix commands

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use super::cancel_on_ctrl_c;
use crate::config::ValidatorConfig;
use crate::models::{RunMode, ScoreResult};
use crate::monitor::ResourceMonitor;
use crate::pipeline::{Orchestrator, RunObserver, RunState};
use crate::reporters::{report_with_format, OutputFormat};

/// Create bar progress style
fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap()
        .progress_chars("█▓▒░  ")
}

/// Drives a progress bar from orchestrator events
struct ProgressObserver {
    bar: ProgressBar,
    batches: usize,
}

impl RunObserver for ProgressObserver {
    fn on_state(&mut self, state: RunState) {
        match state {
            RunState::Scoring { batch } | RunState::Rewriting { batch } => {
                let verb = if matches!(state, RunState::Scoring { .. }) {
                    "Scoring"
                } else {
                    "Rewriting"
                };
                self.bar
                    .set_message(format!("{} batch {}/{}", verb, batch + 1, self.batches));
            }
            RunState::Discovering => self.bar.set_message("Discovering files..."),
            RunState::Reporting => self.bar.set_message("Writing report..."),
            _ => {}
        }
    }

    fn on_discovered(&mut self, files: usize, batches: usize) {
        self.batches = batches;
        self.bar.set_length(files as u64);
    }

    fn on_batch_complete(&mut self, _batch: usize, results: &[ScoreResult]) {
        self.bar.inc(results.len() as u64);
    }
}

pub(super) fn run(
    root: &Path,
    config: ValidatorConfig,
    mode: RunMode,
    dry_run: bool,
    format: &str,
    show_progress: bool,
) -> Result<u8> {
    let format = OutputFormat::from_str(format)?;
    let monitor = ResourceMonitor::from_config(&config.monitor);

    let bar = if show_progress && format == OutputFormat::Text {
        let bar = ProgressBar::new(0);
        bar.set_style(create_bar_style());
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut orchestrator = Orchestrator::new(root, config, mode, dry_run)
        .with_monitor(monitor)
        .with_cancel(cancel_on_ctrl_c())
        .with_observer(Box::new(ProgressObserver {
            bar: bar.clone(),
            batches: 0,
        }));

    let outcome = orchestrator.run();
    bar.finish_and_clear();
    let outcome = outcome.with_context(|| format!("{} run failed for {}", mode, root.display()))?;

    let rendered = report_with_format(&outcome.report, format)?;
    print!("{}", rendered);
    if format == OutputFormat::Text {
        println!(
            "{} Report written to {}",
            style("✓").green(),
            style(outcome.report_path.display()).cyan()
        );
    }

    let code = outcome.exit_code();
    info!("{} finished with exit code {}", mode, code);
    Ok(code)
}
