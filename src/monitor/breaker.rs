//! Circuit breaker state machine
//!
//! Pure: it only sees samples and the instant they were taken, so the
//! trip/clear logic is tested without any sleeping.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::models::ResourceSample;

/// What an observed sample did to the breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    Unchanged,
    Tripped,
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed { consecutive_hot: u32 },
    /// Open since a trip; `calm_since` is the start of the current cool-down
    Open { calm_since: Instant },
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    memory_limit_bytes: u64,
    cpu_limit_percent: f64,
    network_limit_percent: f64,
    trip_ratio: f64,
    clear_ratio: f64,
    trip_after_samples: u32,
    cooldown: Duration,
    state: BreakerState,
    activations: u64,
}

impl CircuitBreaker {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            memory_limit_bytes: config.memory_limit_bytes,
            cpu_limit_percent: config.cpu_limit_percent,
            network_limit_percent: config.network_limit_percent,
            trip_ratio: config.trip_ratio,
            clear_ratio: config.clear_ratio,
            trip_after_samples: config.trip_after_samples.max(1),
            cooldown: Duration::from_millis(config.cooldown_ms),
            state: BreakerState::Closed { consecutive_hot: 0 },
            activations: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, BreakerState::Open { .. })
    }

    /// Number of times the breaker has tripped
    pub fn activations(&self) -> u64 {
        self.activations
    }

    /// Highest usage-to-limit ratio across the three resources.
    /// A zero limit disables that resource.
    pub fn peak_ratio(&self, sample: &ResourceSample) -> f64 {
        let ratio = |value: f64, limit: f64| if limit > 0.0 { value / limit } else { 0.0 };
        ratio(sample.memory_bytes as f64, self.memory_limit_bytes as f64)
            .max(ratio(sample.cpu_percent, self.cpu_limit_percent))
            .max(ratio(sample.network_percent, self.network_limit_percent))
    }

    /// Feed one sample taken at `now`
    pub fn observe(&mut self, sample: &ResourceSample, now: Instant) -> BreakerTransition {
        let peak = self.peak_ratio(sample);

        match self.state {
            BreakerState::Closed { consecutive_hot } => {
                let consecutive_hot = if peak > self.trip_ratio {
                    consecutive_hot + 1
                } else {
                    0
                };
                if consecutive_hot >= self.trip_after_samples {
                    self.state = BreakerState::Open { calm_since: now };
                    self.activations += 1;
                    warn!(
                        "Circuit breaker tripped: {:.0}% of limit for {} consecutive samples",
                        peak * 100.0,
                        consecutive_hot
                    );
                    BreakerTransition::Tripped
                } else {
                    self.state = BreakerState::Closed { consecutive_hot };
                    BreakerTransition::Unchanged
                }
            }
            BreakerState::Open { calm_since } => {
                if peak > self.clear_ratio {
                    // Still warm: the cool-down window starts over
                    self.state = BreakerState::Open { calm_since: now };
                    BreakerTransition::Unchanged
                } else if now.saturating_duration_since(calm_since) >= self.cooldown {
                    self.state = BreakerState::Closed { consecutive_hot: 0 };
                    info!("Circuit breaker cleared after {:?} cool-down", self.cooldown);
                    BreakerTransition::Cleared
                } else {
                    BreakerTransition::Unchanged
                }
            }
        }
    }
}
