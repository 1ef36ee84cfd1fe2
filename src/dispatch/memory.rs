//! System memory sampling and the pressure signal

use crate::TaskError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Source of memory measurements
pub trait MemoryProbe: Send + Sync {
    /// System-wide memory in use, as a percentage of total
    fn usage_percent(&self) -> f64;

    /// Resident memory of this process in MB
    fn process_mb(&self) -> f64 {
        0.0
    }
}

/// Reads `/proc/meminfo` and `/proc/self/status`
///
/// On platforms without procfs both figures read as 0, which never triggers
/// pressure.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMemoryProbe;

impl SystemMemoryProbe {
    #[cfg(target_os = "linux")]
    fn read_kb(path: &str, key: &str) -> Option<u64> {
        let contents = std::fs::read_to_string(path).ok()?;
        contents
            .lines()
            .find(|line| line.starts_with(key))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse().ok())
    }

    #[cfg(not(target_os = "linux"))]
    fn read_kb(_path: &str, _key: &str) -> Option<u64> {
        None
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn usage_percent(&self) -> f64 {
        let total = Self::read_kb("/proc/meminfo", "MemTotal:");
        let available = Self::read_kb("/proc/meminfo", "MemAvailable:");
        match (total, available) {
            (Some(total), Some(available)) if total > 0 => {
                (total.saturating_sub(available)) as f64 / total as f64 * 100.0
            }
            _ => 0.0,
        }
    }

    fn process_mb(&self) -> f64 {
        Self::read_kb("/proc/self/status", "VmRSS:")
            .map(|kb| kb as f64 / 1024.0)
            .unwrap_or(0.0)
    }
}

/// Current memory signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStatus {
    Normal,

    /// Usage above threshold since the given instant
    Pressure { since: Instant },
}

/// Receiving side of the memory signal
///
/// A controller task owns the sender and is its only writer. It samples the
/// probe every `check_interval` and exits once every receiver is gone.
#[derive(Debug, Clone)]
pub struct MemoryMonitor {
    rx: watch::Receiver<MemoryStatus>,
    wait_timeout: Duration,
}

impl MemoryMonitor {
    /// Samples the probe once and starts the controller task
    pub fn start(
        probe: Arc<dyn MemoryProbe>,
        threshold_percent: f64,
        check_interval: Duration,
        wait_timeout: Duration,
    ) -> Self {
        let initial = classify(
            probe.usage_percent(),
            threshold_percent,
            MemoryStatus::Normal,
        );
        let (tx, rx) = watch::channel(initial);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {
                        let usage = probe.usage_percent();
                        tx.send_if_modified(|status| {
                            let next = classify(usage, threshold_percent, *status);
                            if next == *status {
                                return false;
                            }
                            match next {
                                MemoryStatus::Pressure { .. } => tracing::warn!(
                                    "Memory usage {:.1}% above {:.1}%, pausing admissions",
                                    usage,
                                    threshold_percent
                                ),
                                MemoryStatus::Normal => tracing::info!(
                                    "Memory usage {:.1}% back under threshold, resuming admissions",
                                    usage
                                ),
                            }
                            *status = next;
                            true
                        });
                    }
                }
            }
            tracing::trace!("Memory controller stopped");
        });

        Self { rx, wait_timeout }
    }

    pub fn status(&self) -> MemoryStatus {
        *self.rx.borrow()
    }

    /// Waits until memory is under threshold
    ///
    /// Fails with [`TaskError::MemoryTimeoutExceeded`] once the current
    /// pressure episode has lasted `wait_timeout`.
    pub async fn wait_for_capacity(&mut self) -> Result<(), TaskError> {
        loop {
            let status = *self.rx.borrow_and_update();
            let since = match status {
                MemoryStatus::Normal => return Ok(()),
                MemoryStatus::Pressure { since } => since,
            };

            let deadline = since + self.wait_timeout;
            if Instant::now() >= deadline {
                return Err(TaskError::MemoryTimeoutExceeded {
                    waited: since.elapsed(),
                });
            }

            tokio::select! {
                changed = self.rx.changed() => {
                    // controller gone: nothing will ever lift the pause
                    if changed.is_err() {
                        return Err(TaskError::MemoryTimeoutExceeded {
                            waited: since.elapsed(),
                        });
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(TaskError::MemoryTimeoutExceeded {
                        waited: since.elapsed(),
                    });
                }
            }
        }
    }

    /// Resolves once a pressure episode has lasted `wait_timeout`
    ///
    /// Never resolves while memory stays normal, or after the controller is
    /// gone.
    pub async fn pressure_timeout(&mut self) -> TaskError {
        loop {
            let status = *self.rx.borrow_and_update();
            match status {
                MemoryStatus::Normal => {
                    if self.rx.changed().await.is_err() {
                        return std::future::pending().await;
                    }
                }
                MemoryStatus::Pressure { since } => {
                    let deadline = since + self.wait_timeout;
                    tokio::select! {
                        changed = self.rx.changed() => {
                            if changed.is_err() {
                                return std::future::pending().await;
                            }
                        }
                        _ = tokio::time::sleep_until(deadline) => {
                            return TaskError::MemoryTimeoutExceeded {
                                waited: since.elapsed(),
                            };
                        }
                    }
                }
            }
        }
    }
}

fn classify(usage: f64, threshold: f64, current: MemoryStatus) -> MemoryStatus {
    if usage > threshold {
        match current {
            MemoryStatus::Pressure { .. } => current,
            MemoryStatus::Normal => MemoryStatus::Pressure {
                since: Instant::now(),
            },
        }
    } else {
        MemoryStatus::Normal
    }
}
