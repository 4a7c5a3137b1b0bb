//! Monitor command - run the resource monitor on its own

use anyhow::Result;
use console::style;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::info;

use super::cancel_on_ctrl_c;
use crate::config::ValidatorConfig;
use crate::monitor::{MonitorState, MonitorStatus, ResourceMonitor};

const POLL: Duration = Duration::from_millis(50);

fn format_status(status: &MonitorStatus, memory_limit: u64) -> Option<String> {
    let sample = status.last_sample.as_ref()?;
    let state = match status.state {
        MonitorState::CircuitBreakerActive => style(status.state.to_string()).red().bold(),
        MonitorState::Active => style(status.state.to_string()).green(),
        MonitorState::Inactive => style(status.state.to_string()).dim(),
    };
    Some(format!(
        "{}  mem {:>6.1} MiB ({:>5.1}%)  cpu {:>5.1}%  net {:>5.1}%  {}",
        style(sample.timestamp.format("%H:%M:%S%.3f")).dim(),
        sample.memory_bytes as f64 / (1024.0 * 1024.0),
        sample.memory_bytes as f64 * 100.0 / memory_limit.max(1) as f64,
        sample.cpu_percent,
        sample.network_percent,
        state
    ))
}

/// Print every new sample until Ctrl-C (or until `duration_secs` elapse)
pub(super) fn run(config: &ValidatorConfig, duration_secs: Option<u64>) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    let deadline = duration_secs.map(|s| Instant::now() + Duration::from_secs(s));
    let mut monitor = ResourceMonitor::from_config(&config.monitor);

    println!(
        "\n{} Monitoring resources every {} ms {}\n",
        style("▶").green().bold(),
        config.monitor.sample_interval_ms,
        style("(Ctrl-C to stop)").dim()
    );
    monitor.start();

    let mut last_printed = None;
    while !cancel.load(Ordering::SeqCst) && deadline.is_none_or(|d| Instant::now() < d) {
        let status = monitor.current_status();
        let timestamp = status.last_sample.as_ref().map(|s| s.timestamp);
        if timestamp != last_printed {
            if let Some(line) = format_status(&status, config.monitor.memory_limit_bytes) {
                println!("{}", line);
                info!(state = %status.state, "resource sample");
            }
            last_printed = timestamp;
        }
        std::thread::sleep(POLL);
    }

    let summary = monitor.stop();
    println!(
        "\n{} {} samples, circuit breaker tripped {} time(s)",
        style("✓").green(),
        summary.samples_taken,
        summary.circuit_breaker_activations
    );
    Ok(())
}
