//! Resource samplers

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

use crate::config::{MonitorConfig, SamplerKind};
use crate::models::ResourceSample;

/// Source of resource readings
pub trait Sampler: Send {
    fn name(&self) -> &'static str;

    /// Take one reading
    fn sample(&mut self) -> Result<ResourceSample>;
}

/// Build the sampler selected in the config
pub fn sampler_for(config: &MonitorConfig) -> Box<dyn Sampler> {
    match config.sampler {
        SamplerKind::Simulated => Box::new(SimulatedSampler::new(config)),
        SamplerKind::Real => Box::new(RealSampler::new(config)),
    }
}

/// Seeded random readings inside a band of each limit.
///
/// With the default band (10-60%) the readings never reach the trip ratio.
pub struct SimulatedSampler {
    rng: ChaCha8Rng,
    memory: (f64, f64),
    cpu: (f64, f64),
    network: (f64, f64),
}

impl SimulatedSampler {
    pub fn new(config: &MonitorConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let (low, high) = (config.simulated_low_ratio, config.simulated_high_ratio);
        let band = |limit: f64| (limit * low, limit * high);
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            memory: band(config.memory_limit_bytes as f64),
            cpu: band(config.cpu_limit_percent),
            network: band(config.network_limit_percent),
        }
    }

    fn draw(&mut self, (low, high): (f64, f64)) -> f64 {
        if high > low {
            self.rng.random_range(low..high)
        } else {
            low
        }
    }
}

impl Sampler for SimulatedSampler {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn sample(&mut self) -> Result<ResourceSample> {
        let memory = self.draw(self.memory);
        let cpu = self.draw(self.cpu);
        let network = self.draw(self.network);
        Ok(ResourceSample::now(memory as u64, cpu, network))
    }
}

const PAGE_SIZE: u64 = 4096;

/// Readings from Linux `/proc`: resident memory of this process, one-minute
/// load average per CPU, and the byte rate across non-loopback interfaces
/// as a share of the configured link capacity.
pub struct RealSampler {
    cpus: f64,
    link_capacity: f64,
    last_net: Option<(u64, Instant)>,
}

impl RealSampler {
    pub fn new(config: &MonitorConfig) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1) as f64;
        Self {
            cpus,
            link_capacity: config.link_capacity_bytes_per_sec.max(1) as f64,
            last_net: None,
        }
    }

    fn resident_bytes() -> Result<u64> {
        let statm = std::fs::read_to_string("/proc/self/statm")
            .context("Failed to read /proc/self/statm")?;
        let pages: u64 = statm
            .split_whitespace()
            .nth(1)
            .context("Malformed /proc/self/statm")?
            .parse()
            .context("Malformed resident page count")?;
        Ok(pages * PAGE_SIZE)
    }

    fn load_percent(&self) -> Result<f64> {
        let loadavg =
            std::fs::read_to_string("/proc/loadavg").context("Failed to read /proc/loadavg")?;
        let one_minute: f64 = loadavg
            .split_whitespace()
            .next()
            .context("Malformed /proc/loadavg")?
            .parse()
            .context("Malformed load average")?;
        Ok(one_minute / self.cpus * 100.0)
    }

    fn network_bytes() -> Result<u64> {
        let dev = std::fs::read_to_string("/proc/net/dev").context("Failed to read /proc/net/dev")?;
        Ok(parse_net_dev(&dev))
    }

    fn network_percent(&mut self) -> Result<f64> {
        let total = Self::network_bytes()?;
        let now = Instant::now();
        let percent = match self.last_net {
            Some((prev, at)) => {
                let secs = now.duration_since(at).as_secs_f64();
                if secs > 0.0 {
                    total.saturating_sub(prev) as f64 / secs / self.link_capacity * 100.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last_net = Some((total, now));
        Ok(percent)
    }
}

/// Sum received and transmitted bytes over every interface except `lo`
fn parse_net_dev(dev: &str) -> u64 {
    dev.lines()
        .skip(2)
        .filter_map(|line| {
            let (iface, stats) = line.split_once(':')?;
            if iface.trim() == "lo" {
                return None;
            }
            let fields: Vec<u64> = stats
                .split_whitespace()
                .filter_map(|f| f.parse().ok())
                .collect();
            // rx bytes is field 0, tx bytes is field 8
            Some(fields.first().copied().unwrap_or(0) + fields.get(8).copied().unwrap_or(0))
        })
        .sum()
}

impl Sampler for RealSampler {
    fn name(&self) -> &'static str {
        "real"
    }

    fn sample(&mut self) -> Result<ResourceSample> {
        let memory = Self::resident_bytes()?;
        let cpu = self.load_percent()?;
        let network = self.network_percent()?;
        Ok(ResourceSample::now(memory, cpu, network))
    }
}

/// Replays a fixed list of readings, then repeats the last one forever.
/// Useful for driving the breaker deterministically.
pub struct ScriptedSampler {
    readings: Vec<(u64, f64, f64)>,
    next: usize,
}

impl ScriptedSampler {
    /// Each reading is `(memory_bytes, cpu_percent, network_percent)`
    pub fn new(readings: Vec<(u64, f64, f64)>) -> Self {
        Self { readings, next: 0 }
    }
}

impl Sampler for ScriptedSampler {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn sample(&mut self) -> Result<ResourceSample> {
        let last = self.readings.len().checked_sub(1).context("No scripted readings")?;
        let (memory, cpu, network) = self.readings[self.next.min(last)];
        self.next += 1;
        Ok(ResourceSample::now(memory, cpu, network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_is_seeded_and_in_band() {
        let config = MonitorConfig {
            seed: Some(42),
            ..Default::default()
        };
        let mut a = SimulatedSampler::new(&config);
        let mut b = SimulatedSampler::new(&config);
        for _ in 0..50 {
            let x = a.sample().unwrap();
            let y = b.sample().unwrap();
            assert_eq!(x.memory_bytes, y.memory_bytes);
            assert_eq!(x.cpu_percent, y.cpu_percent);
            assert!(x.cpu_percent >= 1.0 && x.cpu_percent < 6.0);
            assert!(x.network_percent >= 0.5 && x.network_percent < 3.0);
            assert!(x.memory_bytes < (1u64 << 30) * 6 / 10 + 1);
        }
    }

    #[test]
    fn test_parse_net_dev_skips_loopback() {
        let dev = "Inter-|   Receive                                                |  Transmit\n \
                   face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n    \
                   lo: 5000 10 0 0 0 0 0 0 5000 10 0 0 0 0 0 0\n  \
                   eth0: 1200 10 0 0 0 0 0 0 800 10 0 0 0 0 0 0\n";
        assert_eq!(parse_net_dev(dev), 2000);
    }

    #[test]
    fn test_scripted_repeats_last_reading() {
        let mut sampler = ScriptedSampler::new(vec![(0, 9.5, 0.0), (0, 1.0, 0.0)]);
        assert_eq!(sampler.sample().unwrap().cpu_percent, 9.5);
        assert_eq!(sampler.sample().unwrap().cpu_percent, 1.0);
        assert_eq!(sampler.sample().unwrap().cpu_percent, 1.0);
        assert!(ScriptedSampler::new(vec![]).sample().is_err());
    }
}
