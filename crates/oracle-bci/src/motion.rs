//! Accelerometer override: a stateless threshold map from one acceleration
//! axis to a ternary direction, with no smoothing.

use std::fmt;
use std::sync::atomic::{AtomicI8, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::MotionConfig;

/// Acceleration axis read by the override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    #[default]
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Ternary head-tilt state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MotionState {
    Left,
    #[default]
    Neutral,
    Right,
}

impl MotionState {
    /// Signed carousel step: left moves the selection back, right forward.
    pub fn step(self) -> i8 {
        match self {
            MotionState::Left => -1,
            MotionState::Neutral => 0,
            MotionState::Right => 1,
        }
    }

    fn from_step(step: i8) -> Self {
        match step.signum() {
            -1 => MotionState::Left,
            1 => MotionState::Right,
            _ => MotionState::Neutral,
        }
    }
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionState::Left => f.write_str("left"),
            MotionState::Neutral => f.write_str("neutral"),
            MotionState::Right => f.write_str("right"),
        }
    }
}

/// Threshold classifier for 3-axis acceleration samples.
///
/// For the selected axis value `v`: `Left` iff `v > threshold_up`,
/// `Right` iff `v < threshold_down`, otherwise `Neutral`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionOverride {
    pub axis: Axis,
    pub threshold_up: f32,
    pub threshold_down: f32,
}

impl MotionOverride {
    pub fn from_config(config: &MotionConfig) -> Self {
        Self {
            axis: config.axis,
            threshold_up: config.threshold_up,
            threshold_down: config.threshold_down,
        }
    }

    #[must_use]
    pub fn classify(&self, acceleration: [f32; 3]) -> MotionState {
        let value = acceleration[self.axis.index()];
        if value > self.threshold_up {
            MotionState::Left
        } else if value < self.threshold_down {
            MotionState::Right
        } else {
            MotionState::Neutral
        }
    }
}

impl Default for MotionOverride {
    fn default() -> Self {
        Self::from_config(&MotionConfig::default())
    }
}

/// Latest motion state, written by the ingestion thread and read by the UI.
#[derive(Debug, Default)]
pub struct MotionCell(AtomicI8);

impl MotionCell {
    pub fn store(&self, state: MotionState) {
        self.0.store(state.step(), Ordering::Release);
    }

    pub fn load(&self) -> MotionState {
        MotionState::from_step(self.0.load(Ordering::Acquire))
    }
}
