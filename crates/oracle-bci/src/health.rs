//! # Inference Worker Health
//!
//! Lock-free watchdog over the submit → ready round trip. The dispatcher
//! marks the worker busy on every accepted window and idle when the result
//! is published; anyone may ask how long the current window has been in
//! flight. Past the stall timeout the worker is reported as
//! [`WorkerHealth::Stalled`] and new submissions are refused until it
//! recovers.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Observable state of the inference worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerHealth {
    /// Idle and accepting a window.
    Ready,

    /// Processing a window for `elapsed` so far.
    Busy { elapsed: Duration },

    /// Processing a window for longer than the stall timeout.
    Stalled { elapsed: Duration },

    /// The worker thread exited on its own (panic or model failure).
    Dead,

    /// The worker was shut down by the pipeline.
    Terminated,
}

impl WorkerHealth {
    /// Returns `true` if the worker will never accept another window.
    pub fn is_gone(&self) -> bool {
        matches!(self, WorkerHealth::Dead | WorkerHealth::Terminated)
    }
}

impl fmt::Display for WorkerHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerHealth::Ready => f.write_str("ready"),
            WorkerHealth::Busy { elapsed } => write!(f, "busy ({}ms)", elapsed.as_millis()),
            WorkerHealth::Stalled { elapsed } => {
                write!(f, "stalled ({:.1}s)", elapsed.as_secs_f64())
            }
            WorkerHealth::Dead => f.write_str("dead"),
            WorkerHealth::Terminated => f.write_str("terminated"),
        }
    }
}

/// Busy-since clock with a one-shot stall report.
#[derive(Debug)]
pub struct Watchdog {
    origin: Instant,
    /// Nanoseconds since `origin` plus one when busy, zero when idle.
    busy_since: AtomicU64,
    stalled: AtomicBool,
    timeout: Option<Duration>,
}

impl Watchdog {
    /// `None` disables stall detection.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            origin: Instant::now(),
            busy_since: AtomicU64::new(0),
            stalled: AtomicBool::new(false),
            timeout,
        }
    }

    /// Stall timeout in whole seconds; zero disables detection.
    pub fn from_secs(secs: u64) -> Self {
        Self::new((secs > 0).then(|| Duration::from_secs(secs)))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start the clock for a newly accepted window.
    pub fn mark_busy(&self) {
        self.busy_since.store(self.offset_now(), Ordering::Release);
    }

    /// Stop the clock; logs a recovery if the worker had been reported stalled.
    pub fn mark_idle(&self) {
        let started = self.busy_since.swap(0, Ordering::AcqRel);
        if self.stalled.swap(false, Ordering::AcqRel) && started != 0 {
            let elapsed = self.elapsed_since(started);
            tracing::info!(
                elapsed_ms = elapsed.as_millis(),
                "Inference worker recovered from stall"
            );
        }
    }

    /// How long the current window has been in flight, if any.
    pub fn busy_for(&self) -> Option<Duration> {
        match self.busy_since.load(Ordering::Acquire) {
            0 => None,
            started => Some(self.elapsed_since(started)),
        }
    }

    /// Returns the in-flight time if it exceeds the timeout. The first
    /// detection of each stall is logged.
    pub fn check(&self) -> Option<Duration> {
        let timeout = self.timeout?;
        let elapsed = self.busy_for()?;
        if elapsed <= timeout {
            return None;
        }
        if !self.stalled.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis(),
                timeout_secs = timeout.as_secs(),
                "Inference worker stalled; refusing new windows"
            );
        }
        Some(elapsed)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn offset_now(&self) -> u64 {
        (self.origin.elapsed().as_nanos() as u64).saturating_add(1)
    }

    fn elapsed_since(&self, started: u64) -> Duration {
        Duration::from_nanos(self.offset_now().saturating_sub(started))
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_watchdog() {
        let watchdog = Watchdog::new(Some(Duration::from_millis(1)));
        assert!(watchdog.busy_for().is_none());
        assert!(watchdog.check().is_none());
    }

    #[test]
    fn test_busy_then_idle() {
        let watchdog = Watchdog::default();
        watchdog.mark_busy();
        assert!(watchdog.busy_for().is_some());
        watchdog.mark_idle();
        assert!(watchdog.busy_for().is_none());
    }

    #[test]
    fn test_stall_detected_and_cleared() {
        let watchdog = Watchdog::new(Some(Duration::from_millis(1)));
        watchdog.mark_busy();
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = watchdog.check().expect("should be stalled");
        assert!(elapsed > Duration::from_millis(1));
        // Second check still reports the stall.
        assert!(watchdog.check().is_some());

        watchdog.mark_idle();
        assert!(watchdog.check().is_none());
    }

    #[test]
    fn test_disabled_never_stalls() {
        let watchdog = Watchdog::from_secs(0);
        assert!(watchdog.timeout().is_none());
        watchdog.mark_busy();
        std::thread::sleep(Duration::from_millis(5));
        assert!(watchdog.check().is_none());
    }

    #[test]
    fn test_health_display() {
        assert_eq!(WorkerHealth::Ready.to_string(), "ready");
        assert_eq!(
            WorkerHealth::Busy {
                elapsed: Duration::from_millis(250)
            }
            .to_string(),
            "busy (250ms)"
        );
        assert!(WorkerHealth::Dead.is_gone());
        assert!(!WorkerHealth::Stalled {
            elapsed: Duration::ZERO
        }
        .is_gone());
    }
}
