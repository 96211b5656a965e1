//! Timer-driven invocation of [`Checker::run_check`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::app::CourierError;
use crate::checker::Checker;

/// Parse interval string like "1h", "30m", "6h", "1d"
pub fn parse_interval(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();

    let secs = if let Some(hours) = s.strip_suffix('h') {
        hours
            .parse::<u64>()
            .map_err(|_| format!("Invalid hours: {}", hours))
            .and_then(|h| scale(h, 3600))
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .map_err(|_| format!("Invalid minutes: {}", minutes))
            .and_then(|m| scale(m, 60))
    } else if let Some(days) = s.strip_suffix('d') {
        days.parse::<u64>()
            .map_err(|_| format!("Invalid days: {}", days))
            .and_then(|d| scale(d, 86400))
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>()
            .map_err(|_| format!("Invalid seconds: {}", secs))
    } else {
        s.parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))
    }?;

    if secs == 0 {
        return Err("Interval must be greater than zero".to_string());
    }
    Ok(secs)
}

fn scale(value: u64, unit_secs: u64) -> Result<u64, String> {
    value
        .checked_mul(unit_secs)
        .ok_or_else(|| "Interval too large".to_string())
}

/// Format interval for display
pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

pub struct Scheduler {
    checker: Arc<Checker>,
    interval_secs: u64,
    run_on_start: bool,
}

impl Scheduler {
    pub fn new(checker: Arc<Checker>, interval_secs: u64, run_on_start: bool) -> Self {
        Self {
            checker,
            interval_secs,
            run_on_start,
        }
    }

    /// Run checks on the interval until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Scheduler started (interval: {})",
            format_interval(self.interval_secs)
        );

        let mut timer = interval(Duration::from_secs(self.interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.run_on_start {
            timer.tick().await; // Skip the first immediate tick
        }

        loop {
            tokio::select! {
                _ = timer.tick() => self.run_once().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }

    async fn run_once(&self) {
        tracing::info!("Running scheduled check...");
        // Failures are logged by the checker itself
        if let Err(CourierError::RunInProgress) = self.checker.run_check().await {
            tracing::info!("Skipping scheduled check: a check is already running");
        }
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C on Windows).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
            }
            _ => {
                tracing::warn!("Failed to set up signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
