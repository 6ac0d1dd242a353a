//! # Event Debouncer
//!
//! Turns the raw blink / jaw-clench event stream into two one-shot signals:
//! **confirm** (an isolated trigger event) and **cancel** (two trigger events
//! closer together than the double gap τ).
//!
//! ## Rules
//!
//! For each trigger event at time `t` with a predecessor at `p`:
//!
//! - `t − p < τ` → cancel becomes pending and any pending confirm is dropped.
//! - `t − p ≥ τ` → confirm becomes pending, unless a cancel is already pending.
//!
//! The first trigger event of a session has no predecessor and sets nothing.
//! At most one of the two flags is pending at a time, and a cancel stays
//! pending until [`Debouncer::consume`] reads it.
//!
//! Events of the non-trigger kind are counted but never change the flags.

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::DebounceConfig;
use crate::error::PipelineError;

/// Kind of discrete nervous-system event reported by the headset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[default]
    Blink,
    JawClench,
}

impl EventKind {
    fn index(self) -> usize {
        match self {
            EventKind::Blink => 0,
            EventKind::JawClench => 1,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Blink => f.write_str("blink"),
            EventKind::JawClench => f.write_str("jaw_clench"),
        }
    }
}

impl FromStr for EventKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blink" => Ok(EventKind::Blink),
            "jaw_clench" | "jaw-clench" | "jaw" => Ok(EventKind::JawClench),
            other => Err(PipelineError::ConfigError {
                reason: format!("unknown event kind '{other}' (expected blink or jaw_clench)"),
            }),
        }
    }
}

/// A discrete event with its arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteEvent {
    pub kind: EventKind,
    pub at: Instant,
}

impl DiscreteEvent {
    /// An event stamped with the current time.
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            at: Instant::now(),
        }
    }
}

/// The debounced confirm/cancel flags as read by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmState {
    pub confirmed: bool,
    pub cancelled: bool,
}

impl ConfirmState {
    pub fn is_idle(&self) -> bool {
        !self.confirmed && !self.cancelled
    }
}

/// What a single [`Debouncer::record`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Not enough history, or the event kind does not drive the flags.
    Recorded,
    /// An isolated trigger event set confirm pending.
    Confirm,
    /// A confirm was not raised because a cancel is still pending.
    ConfirmSuppressed,
    /// Two trigger events within τ set cancel pending.
    Cancel,
}

#[derive(Debug, Default)]
struct DebounceState {
    /// Most recent trigger timestamp.
    last: Option<Instant>,
    /// The one before it.
    previous: Option<Instant>,
    confirm_pending: bool,
    cancel_pending: bool,
    counts: [u64; 2],
}

/// Thread-safe debouncer shared by the ingestion thread (writer) and the UI
/// thread (reader).
#[derive(Debug)]
pub struct Debouncer {
    state: Mutex<DebounceState>,
    double_gap: Duration,
    trigger: EventKind,
}

impl Debouncer {
    pub fn new(double_gap: Duration, trigger: EventKind) -> Self {
        Self {
            state: Mutex::new(DebounceState::default()),
            double_gap,
            trigger,
        }
    }

    pub fn from_config(config: &DebounceConfig) -> Self {
        Self::new(
            Duration::from_secs_f64(config.double_gap_secs),
            config.trigger,
        )
    }

    pub fn double_gap(&self) -> Duration {
        self.double_gap
    }

    pub fn trigger(&self) -> EventKind {
        self.trigger
    }

    /// Record one event and update the pending flags.
    pub fn record(&self, event: DiscreteEvent) -> DebounceOutcome {
        let mut state = self.lock();
        state.counts[event.kind.index()] += 1;

        if event.kind != self.trigger {
            return DebounceOutcome::Recorded;
        }

        let predecessor = state.last;
        state.previous = predecessor;
        state.last = Some(event.at);

        let Some(predecessor) = predecessor else {
            return DebounceOutcome::Recorded;
        };

        let gap = event.at.saturating_duration_since(predecessor);
        if gap < self.double_gap {
            state.cancel_pending = true;
            state.confirm_pending = false;
            tracing::debug!(kind = %event.kind, gap_ms = gap.as_millis(), "Double event: cancel pending");
            DebounceOutcome::Cancel
        } else if state.cancel_pending {
            DebounceOutcome::ConfirmSuppressed
        } else {
            state.confirm_pending = true;
            tracing::debug!(kind = %event.kind, gap_ms = gap.as_millis(), "Single event: confirm pending");
            DebounceOutcome::Confirm
        }
    }

    /// Read and clear both pending flags in one step.
    pub fn consume(&self) -> ConfirmState {
        let mut state = self.lock();
        let snapshot = ConfirmState {
            confirmed: state.confirm_pending,
            cancelled: state.cancel_pending,
        };
        state.confirm_pending = false;
        state.cancel_pending = false;
        snapshot
    }

    /// Number of events recorded for `kind` since startup.
    pub fn count(&self, kind: EventKind) -> u64 {
        self.lock().counts[kind.index()]
    }

    /// Timestamps of the two most recent trigger events, newest first.
    pub fn recent(&self) -> (Option<Instant>, Option<Instant>) {
        let state = self.lock();
        (state.last, state.previous)
    }

    /// Every update completes under the guard, so a poisoned state is still whole.
    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::from_config(&DebounceConfig::default())
    }
}
