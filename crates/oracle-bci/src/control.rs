//! # Control Fusion Facade
//!
//! The only surface the UI reads. Polled once per frame, it fuses the
//! classifier's latest prediction, the debounced confirm/cancel flags and
//! the motion override into one [`ControlSnapshot`]. Every call is a
//! non-blocking poll: an atomic load, an uncontended mutex, or a channel
//! `try_recv`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bands::{BandCell, BandPowers};
use crate::debounce::{ConfirmState, Debouncer};
use crate::error::PipelineError;
use crate::health::WorkerHealth;
use crate::inference::{Direction, PredictionReceiver, PredictionResult};
use crate::ingest::{IngestSnapshot, IngestStats, IngestTargets};
use crate::motion::{MotionCell, MotionState};

/// Which source drives the fused direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// EEG classifier predictions.
    #[default]
    Classifier,
    /// Accelerometer head tilt.
    Motion,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Classifier => f.write_str("classifier"),
            ControlMode::Motion => f.write_str("motion"),
        }
    }
}

impl FromStr for ControlMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classifier" => Ok(ControlMode::Classifier),
            "motion" => Ok(ControlMode::Motion),
            other => Err(PipelineError::ConfigError {
                reason: format!("unknown control mode '{other}', expected 'classifier' or 'motion'"),
            }),
        }
    }
}

/// Fused per-frame control state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlSnapshot {
    /// Direction from the active source. `None` when nothing new arrived
    /// (classifier mode) or the head is level (motion mode).
    pub direction: Option<Direction>,
    /// Classifier confidence; always `None` in motion mode.
    pub confidence: Option<f32>,
    /// The prediction consumed this frame, regardless of mode.
    pub prediction: Option<PredictionResult>,
    pub confirm_pending: bool,
    pub cancel_pending: bool,
    pub motion: MotionState,
}

/// Diagnostics for the whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineStats {
    pub ingest: IngestSnapshot,
    pub predictions_produced: u64,
    pub predictions_delivered: u64,
    pub worker: WorkerHealth,
}

/// UI-facing query handle. Owns no sensor state, only handles to derived state.
pub struct ControlFacade {
    mode: ControlMode,
    predictions: PredictionReceiver,
    debouncer: Arc<Debouncer>,
    motion: Arc<MotionCell>,
    bands: Arc<BandCell>,
    stats: Arc<IngestStats>,
}

impl ControlFacade {
    pub fn new(mode: ControlMode, predictions: PredictionReceiver, targets: IngestTargets) -> Self {
        Self {
            mode,
            predictions,
            debouncer: targets.debouncer,
            motion: targets.motion,
            bands: targets.bands,
            stats: targets.stats,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        if mode != self.mode {
            tracing::info!(from = %self.mode, to = %mode, "Control mode changed");
            self.mode = mode;
        }
    }

    /// Newest unconsumed prediction; each is returned at most once.
    pub fn latest_prediction(&mut self) -> Option<PredictionResult> {
        self.predictions.poll()
    }

    /// Read and clear the debounced confirm/cancel flags.
    pub fn latest_confirm_state(&self) -> ConfirmState {
        self.debouncer.consume()
    }

    pub fn latest_motion(&self) -> MotionState {
        self.motion.load()
    }

    pub fn latest_band_powers(&self) -> BandPowers {
        self.bands.snapshot()
    }

    /// One frame's worth of control input: consumes the pending prediction
    /// and both debounce flags.
    pub fn poll_frame(&mut self) -> ControlSnapshot {
        let prediction = self.latest_prediction();
        let confirm = self.latest_confirm_state();
        let motion = self.latest_motion();

        let (direction, confidence) = match self.mode {
            ControlMode::Classifier => (
                prediction.map(|p| p.direction),
                prediction.map(|p| p.confidence),
            ),
            ControlMode::Motion => (motion_direction(motion), None),
        };

        ControlSnapshot {
            direction,
            confidence,
            prediction,
            confirm_pending: confirm.confirmed,
            cancel_pending: confirm.cancelled,
            motion,
        }
    }

    pub fn worker_health(&self) -> WorkerHealth {
        self.predictions.health()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            ingest: self.stats.snapshot(),
            predictions_produced: self.predictions.produced(),
            predictions_delivered: self.predictions.delivered(),
            worker: self.worker_health(),
        }
    }
}

fn motion_direction(state: MotionState) -> Option<Direction> {
    match state {
        MotionState::Left => Some(Direction::Left),
        MotionState::Right => Some(Direction::Right),
        MotionState::Neutral => None,
    }
}
