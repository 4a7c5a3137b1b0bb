//! Run orchestration
//!
//! Drives one run end to end:
//! 1. Discover candidate files
//! 2. Split them into batches
//! 3. Before each batch, honour cancellation and wait out the circuit breaker
//! 4. Score the batch on a bounded worker pool
//! 5. In fix mode, rewrite the batch's files
//! 6. Write the run report (always, also for aborted runs)
//!
//! ```text
//! Idle ─► Discovering ─► Scoring(0) ─► [Rewriting(0)] ─► Scoring(1) ─► … ─► Reporting ─► Idle
//!                                                                              │
//!                                                                   on error   └─► Aborted
//! ```

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ValidatorConfig;
use crate::discovery::discover;
use crate::error::{ValidatorError, ValidatorResult};
use crate::fixes::{write_atomically, RewriteOutcome, Rewriter};
use crate::models::{
    slash_path, AbortReason, FileRecord, RewriteSummary, RunMode, RunReport, ScoreResult,
    SkippedRewrite,
};
use crate::monitor::ResourceMonitor;
use crate::reporters::write_report;
use crate::scoring::RuleScorer;

/// Shared cancellation flag (set by Ctrl-C or by an observer)
pub type CancelFlag = Arc<AtomicBool>;

/// How often a breaker wait re-checks the cancellation flag
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Discovering,
    Scoring { batch: usize },
    Rewriting { batch: usize },
    Reporting,
    Aborted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Discovering => write!(f, "discovering"),
            RunState::Scoring { batch } => write!(f, "scoring batch {}", batch + 1),
            RunState::Rewriting { batch } => write!(f, "rewriting batch {}", batch + 1),
            RunState::Reporting => write!(f, "reporting"),
            RunState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Hook for progress display and tests. All methods default to no-ops.
pub trait RunObserver {
    fn on_state(&mut self, _state: RunState) {}

    /// Discovery finished
    fn on_discovered(&mut self, _files: usize, _batches: usize) {}

    /// A batch was scored (and rewritten, in fix mode)
    fn on_batch_complete(&mut self, _batch: usize, _results: &[ScoreResult]) {}
}

/// What a finished run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub report_path: PathBuf,
    /// The error that aborted the run, if any
    pub error: Option<ValidatorError>,
}

impl RunOutcome {
    /// 0 when compliant, 2 for configuration errors, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        match &self.error {
            Some(err) => err.exit_code(),
            None if self.report.is_compliant() => 0,
            None => 1,
        }
    }
}

/// A scored file, with its content kept when it may be rewritten
type Scored = (ScoreResult, Option<String>);

pub struct Orchestrator {
    root: PathBuf,
    config: ValidatorConfig,
    mode: RunMode,
    dry_run: bool,
    monitor: Option<ResourceMonitor>,
    cancel: CancelFlag,
    observer: Option<Box<dyn RunObserver>>,
    state: RunState,
}

impl Orchestrator {
    pub fn new(
        root: impl Into<PathBuf>,
        config: ValidatorConfig,
        mode: RunMode,
        dry_run: bool,
    ) -> Self {
        let mut config = config;
        config.sanitize();
        Self {
            root: root.into(),
            config,
            mode,
            dry_run,
            monitor: None,
            cancel: Arc::new(AtomicBool::new(false)),
            observer: None,
            state: RunState::Idle,
        }
    }

    /// Gate batches on this monitor's circuit breaker. The monitor is started
    /// if it is not running and stopped when the run ends.
    pub fn with_monitor(mut self, monitor: ResourceMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn report_path(&self) -> PathBuf {
        self.config.report_path_for(&self.root)
    }

    fn transition(&mut self, state: RunState) {
        debug!("State: {} -> {}", self.state, state);
        self.state = state;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_state(state);
        }
    }

    /// Run to completion (or abort) and write the report.
    ///
    /// Batch-level failures are returned inside the outcome. `Err` means the
    /// report itself could not be written (including a root that does not
    /// exist).
    pub fn run(&mut self) -> ValidatorResult<RunOutcome> {
        let started = Instant::now();
        let report_path = self.report_path();
        let mut report = RunReport::new(
            self.mode,
            &self.root,
            self.dry_run,
            self.config.compliance_threshold,
        );

        if let Some(monitor) = self.monitor.as_mut() {
            monitor.start();
        }

        let error = self.execute(&mut report).err();

        if let Some(monitor) = self.monitor.as_mut() {
            let summary = monitor.stop();
            report.circuit_breaker_activations = summary.circuit_breaker_activations;
            report.resource_samples = summary.recent_samples;
        }

        if let Some(err) = &error {
            warn!("Run aborted: {}", err);
            report.aborted = true;
            report.abort_reason = Some(AbortReason {
                kind: err.kind(),
                message: err.to_string(),
            });
        }

        report.duration_ms = started.elapsed().as_millis() as u64;

        self.transition(RunState::Reporting);
        if !self.root.is_dir() {
            // Nowhere to put the report
            self.transition(RunState::Aborted);
            return Err(error.unwrap_or_else(|| {
                ValidatorError::Configuration(format!(
                    "root {} is not a directory",
                    self.root.display()
                ))
            }));
        }
        if let Err(write_err) = write_report(&report, &report_path) {
            // A configuration error explains a missing root better than the
            // failed write does
            self.transition(RunState::Aborted);
            return Err(match error {
                Some(err @ ValidatorError::Configuration(_)) => err,
                _ => write_err,
            });
        }
        info!("Report written to {}", report_path.display());

        self.transition(if error.is_some() { RunState::Aborted } else { RunState::Idle });

        Ok(RunOutcome {
            report,
            report_path,
            error,
        })
    }

    fn execute(&mut self, report: &mut RunReport) -> ValidatorResult<()> {
        self.transition(RunState::Discovering);

        let mut exclude = self.config.exclude_patterns();
        if let Ok(relative) = self.report_path().strip_prefix(&self.root) {
            exclude.push(slash_path(relative));
        }
        let files = discover(
            &self.root,
            &self.config.include_patterns(),
            &exclude,
            self.config.respect_gitignore,
        )?;

        let batches: Vec<&[FileRecord]> = files.chunks(self.config.batch_size).collect();
        info!(
            "Discovered {} files in {} batches under {}",
            files.len(),
            batches.len(),
            self.root.display()
        );
        if let Some(observer) = self.observer.as_mut() {
            observer.on_discovered(files.len(), batches.len());
        }

        let workers = self.config.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| {
                ValidatorError::Configuration(format!("cannot start worker pool: {}", e))
            })?;
        debug!("Scoring with {} workers", workers);

        let scorer = RuleScorer::new(&self.config);
        let rewriter = Rewriter::new(&self.config.rules);
        let keep_content = self.mode == RunMode::Fix;

        for (i, batch) in batches.iter().enumerate() {
            self.check_cancelled(i)?;
            self.wait_for_breaker(i)?;

            self.transition(RunState::Scoring { batch: i });
            let root = self.root.as_path();
            let mut scored: Vec<Scored> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|record| score_one(&scorer, root, record, keep_content))
                    .collect()
            });

            if keep_content {
                self.transition(RunState::Rewriting { batch: i });
                for (result, content) in scored.iter_mut() {
                    let Some(content) = content else {
                        continue;
                    };
                    let unwritable =
                        self.rewrite_one(&rewriter, result, content, &mut report.rewrites);
                    if let Some(err) = unwritable {
                        *result = scorer.score_unreadable(&result.file, &err);
                    }
                }
            }

            let results: Vec<ScoreResult> = scored.into_iter().map(|(result, _)| result).collect();
            debug!(
                "Batch {}/{}: {} files, {} failed",
                i + 1,
                batches.len(),
                results.len(),
                results.iter().filter(|r| !r.passed).count()
            );
            if let Some(observer) = self.observer.as_mut() {
                observer.on_batch_complete(i, &results);
            }
            report.append(results);
        }

        Ok(())
    }

    fn check_cancelled(&self, next_batch: usize) -> ValidatorResult<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(ValidatorError::Interrupted { next_batch });
        }
        Ok(())
    }

    /// Block while the breaker is open, up to `max_breaker_retries` waits
    fn wait_for_breaker(&self, next_batch: usize) -> ValidatorResult<()> {
        let Some(monitor) = self.monitor.as_ref() else {
            return Ok(());
        };
        let interval = Duration::from_millis(self.config.breaker_retry_interval_ms);
        let max_retries = self.config.max_breaker_retries;
        let mut retries = 0;

        while monitor.circuit_breaker_active() {
            if retries >= max_retries {
                return Err(ValidatorError::ResourceExhausted { retries });
            }
            retries += 1;
            warn!(
                "Circuit breaker active before batch {}; waiting {:?} (retry {}/{})",
                next_batch + 1,
                interval,
                retries,
                max_retries
            );

            let deadline = Instant::now() + interval;
            while Instant::now() < deadline {
                self.check_cancelled(next_batch)?;
                let remaining = deadline.saturating_duration_since(Instant::now());
                std::thread::sleep(CANCEL_POLL.min(remaining));
            }
            self.check_cancelled(next_batch)?;
        }
        if retries > 0 {
            info!("Circuit breaker cleared after {} retries", retries);
        }
        Ok(())
    }

    /// Rewrite one scored file. Returns the error when the file could not be
    /// written back; the caller records the file as failed.
    fn rewrite_one(
        &self,
        rewriter: &Rewriter,
        result: &ScoreResult,
        content: &str,
        summary: &mut RewriteSummary,
    ) -> Option<ValidatorError> {
        let record = &result.file;
        let skip = |summary: &mut RewriteSummary, err: &ValidatorError| {
            warn!("Not rewriting {}: {}", record.display_path(), err);
            summary.skipped.push(SkippedRewrite {
                path: record.path.clone(),
                error: err.kind(),
                message: err.to_string(),
            });
        };

        match rewriter.rewrite(record, content, &result.issues) {
            Ok(RewriteOutcome::Unchanged) => None,
            Ok(RewriteOutcome::Changed(updated)) => {
                if self.dry_run {
                    debug!("Would rewrite {}", record.display_path());
                    summary.modified.push(record.display_path());
                    return None;
                }
                match write_atomically(&self.root.join(&record.path), &updated) {
                    Ok(()) => {
                        debug!("Rewrote {}", record.display_path());
                        summary.modified.push(record.display_path());
                        None
                    }
                    Err(err) => {
                        skip(summary, &err);
                        Some(err)
                    }
                }
            }
            Err(err) => {
                skip(summary, &err);
                None
            }
        }
    }
}

fn score_one(scorer: &RuleScorer, root: &Path, record: &FileRecord, keep_content: bool) -> Scored {
    let path = root.join(&record.path);
    match std::fs::read(&path) {
        Err(e) => (
            scorer.score_unreadable(record, &ValidatorError::file_access(path, e)),
            None,
        ),
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(content) => {
                let result = scorer.score(record, &content);
                (result, keep_content.then_some(content))
            }
            Err(e) => (scorer.score_bytes(record, e.into_bytes()), None),
        },
    }
}
