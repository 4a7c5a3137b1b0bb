//! Resource monitor and circuit breaker
//!
//! The monitor samples memory, CPU and network usage on its own thread and
//! feeds every reading to a [`CircuitBreaker`]. The breaker is advisory: the
//! orchestrator checks it between batches and never interrupts a batch that
//! is already running.
//!
//! ```text
//! start() ──► sample now ──► thread: tick ─► sample ─► breaker.observe
//!                                    ▲                        │
//!                                    └────────────────────────┘
//! stop()  ──► stop channel ──► join ──► MonitorSummary
//! ```

mod breaker;
mod sampler;

pub use breaker::{BreakerTransition, CircuitBreaker};
pub use sampler::{sampler_for, RealSampler, Sampler, ScriptedSampler, SimulatedSampler};

use crossbeam_channel::{bounded, select, tick, Sender};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::models::ResourceSample;

/// Coarse monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Inactive,
    Active,
    CircuitBreakerActive,
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorState::Inactive => write!(f, "inactive"),
            MonitorState::Active => write!(f, "active"),
            MonitorState::CircuitBreakerActive => write!(f, "circuit_breaker_active"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub last_sample: Option<ResourceSample>,
}

/// What the monitor saw between `start` and `stop`
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorSummary {
    pub samples_taken: u64,
    pub circuit_breaker_activations: u64,
    /// Most recent samples, oldest first
    pub recent_samples: Vec<ResourceSample>,
}

struct Shared {
    breaker: CircuitBreaker,
    history: VecDeque<ResourceSample>,
    history_size: usize,
    samples_taken: u64,
    running: bool,
}

impl Shared {
    fn record(&mut self, sample: ResourceSample) {
        self.breaker.observe(&sample, Instant::now());
        self.samples_taken += 1;
        if self.history.len() == self.history_size {
            self.history.pop_front();
        }
        self.history.push_back(sample);
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<Box<dyn Sampler>>,
}

pub struct ResourceMonitor {
    interval: Duration,
    shared: Arc<Mutex<Shared>>,
    /// Present while stopped; moved into the worker thread while running
    sampler: Option<Box<dyn Sampler>>,
    worker: Option<Worker>,
}

impl ResourceMonitor {
    pub fn new(config: &MonitorConfig, sampler: Box<dyn Sampler>) -> Self {
        let history_size = config.history_size.max(1);
        Self {
            interval: Duration::from_millis(config.sample_interval_ms.max(1)),
            shared: Arc::new(Mutex::new(Shared {
                breaker: CircuitBreaker::new(config),
                history: VecDeque::with_capacity(history_size),
                history_size,
                samples_taken: 0,
                running: false,
            })),
            sampler: Some(sampler),
            worker: None,
        }
    }

    /// Monitor with the sampler selected in the config
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config, sampler_for(config))
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    /// Take one sample immediately, then keep sampling on a background
    /// thread. Calling `start` on a running monitor does nothing.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let Some(mut sampler) = self.sampler.take() else {
            return;
        };

        take_sample(&self.shared, sampler.as_mut());
        self.shared().running = true;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let ticker = tick(self.interval);
        debug!(
            "Resource monitor started ({} sampler, every {:?})",
            sampler.name(),
            self.interval
        );

        let handle = thread::spawn(move || {
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => take_sample(&shared, sampler.as_mut()),
                }
            }
            sampler
        });

        self.worker = Some(Worker { stop_tx, handle });
    }

    /// Stop sampling and summarize. Safe to call on a stopped monitor.
    pub fn stop(&mut self) -> MonitorSummary {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            match worker.handle.join() {
                Ok(sampler) => self.sampler = Some(sampler),
                Err(_) => warn!("Resource monitor thread panicked"),
            }
            debug!("Resource monitor stopped");
        }

        let mut shared = self.shared();
        shared.running = false;
        MonitorSummary {
            samples_taken: shared.samples_taken,
            circuit_breaker_activations: shared.breaker.activations(),
            recent_samples: shared.history.iter().cloned().collect(),
        }
    }

    pub fn current_status(&self) -> MonitorStatus {
        let shared = self.shared();
        let state = if !shared.running {
            MonitorState::Inactive
        } else if shared.breaker.is_open() {
            MonitorState::CircuitBreakerActive
        } else {
            MonitorState::Active
        };
        MonitorStatus {
            state,
            last_sample: shared.history.back().cloned(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn circuit_breaker_active(&self) -> bool {
        self.current_status().state == MonitorState::CircuitBreakerActive
    }

    pub fn activations(&self) -> u64 {
        self.shared().breaker.activations()
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn take_sample(shared: &Mutex<Shared>, sampler: &mut dyn Sampler) {
    match sampler.sample() {
        Ok(sample) => lock(shared).record(sample),
        Err(e) => warn!("Resource sample failed ({}): {:#}", sampler.name(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            sample_interval_ms: 5,
            cooldown_ms: 200,
            history_size: 4,
            ..Default::default()
        }
    }

    fn wait_for(monitor: &ResourceMonitor, state: MonitorState) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if monitor.current_status().state == state {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_inactive_until_started() {
        let config = fast_config();
        let sampler = ScriptedSampler::new(vec![(0, 1.0, 0.0)]);
        let monitor = ResourceMonitor::new(&config, Box::new(sampler));
        let status = monitor.current_status();
        assert_eq!(status.state, MonitorState::Inactive);
        assert!(status.last_sample.is_none());
    }

    #[test]
    fn test_start_samples_immediately() {
        let config = MonitorConfig {
            sample_interval_ms: 60_000,
            ..Default::default()
        };
        let mut monitor =
            ResourceMonitor::new(&config, Box::new(ScriptedSampler::new(vec![(0, 1.0, 0.0)])));
        monitor.start();
        let status = monitor.current_status();
        assert_eq!(status.state, MonitorState::Active);
        assert_eq!(status.last_sample.map(|s| s.cpu_percent), Some(1.0));

        let summary = monitor.stop();
        assert_eq!(summary.samples_taken, 1);
        assert_eq!(monitor.current_status().state, MonitorState::Inactive);
    }

    #[test]
    fn test_start_is_idempotent() {
        let config = MonitorConfig {
            sample_interval_ms: 60_000,
            ..Default::default()
        };
        let mut monitor =
            ResourceMonitor::new(&config, Box::new(ScriptedSampler::new(vec![(0, 1.0, 0.0)])));
        monitor.start();
        monitor.start();
        assert_eq!(monitor.stop().samples_taken, 1);
    }

    #[test]
    fn test_breaker_trips_and_clears() {
        let config = fast_config();
        let readings = vec![(0, 9.0, 0.0), (0, 9.0, 0.0), (0, 9.0, 0.0), (0, 1.0, 0.0)];
        let mut monitor = ResourceMonitor::new(&config, Box::new(ScriptedSampler::new(readings)));
        monitor.start();

        assert!(wait_for(&monitor, MonitorState::CircuitBreakerActive));
        assert!(wait_for(&monitor, MonitorState::Active));

        let summary = monitor.stop();
        assert_eq!(summary.circuit_breaker_activations, 1);
        assert!(summary.samples_taken >= 4);
        assert!(summary.recent_samples.len() <= 4);
    }

    #[test]
    fn test_failed_samples_are_skipped() {
        let config = MonitorConfig {
            sample_interval_ms: 60_000,
            ..Default::default()
        };
        let mut monitor = ResourceMonitor::new(&config, Box::new(ScriptedSampler::new(vec![])));
        monitor.start();
        assert_eq!(monitor.current_status().state, MonitorState::Active);
        assert_eq!(monitor.stop().samples_taken, 0);
    }
}
