//! Sample and window types shared by the windower and the inference worker.

use std::sync::Arc;
use std::time::Instant;

use crate::config::SignalConfig;
use crate::error::{PipelineError, PipelineResult};

/// Number of EEG channels carried by every sample.
pub const CHANNEL_COUNT: usize = 4;

/// Electrode labels in channel order.
pub const CHANNEL_LABELS: [&str; CHANNEL_COUNT] = ["TP9", "AF7", "AF8", "TP10"];

/// One timestamped multi-channel EEG reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Arrival time at the ingestion front-end.
    pub timestamp: Instant,
    /// Channel values in microvolts, ordered as [`CHANNEL_LABELS`].
    pub channels: [f32; CHANNEL_COUNT],
}

impl Sample {
    /// A sample stamped with the current time.
    #[must_use]
    pub fn new(channels: [f32; CHANNEL_COUNT]) -> Self {
        Self::at(Instant::now(), channels)
    }

    #[must_use]
    pub fn at(timestamp: Instant, channels: [f32; CHANNEL_COUNT]) -> Self {
        Self {
            timestamp,
            channels,
        }
    }
}

/// A fixed-length, time-ordered batch of samples submitted as one inference unit.
///
/// Windows are immutable once built; cloning shares the sample storage.
#[derive(Debug, Clone)]
pub struct Window {
    sequence: u64,
    samples: Arc<[Sample]>,
}

impl Window {
    pub fn new(sequence: u64, samples: impl Into<Arc<[Sample]>>) -> Self {
        Self {
            sequence,
            samples: samples.into(),
        }
    }

    /// Monotonic index of this window within the session.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values of one channel across the window.
    pub fn channel(&self, index: usize) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().map(move |s| s.channels[index])
    }
}

/// Sample counts derived from [`SignalConfig`].
///
/// `window_len = window_duration × sample_rate` and
/// `keep = ⌊window_duration × (1 − overlap / 2) × sample_rate⌋`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    /// Samples per window.
    pub window_len: usize,
    /// Samples retained in the buffer after a window is extracted.
    pub keep: usize,
    /// Samples per classifier epoch.
    pub epoch_len: usize,
}

impl WindowGeometry {
    pub fn from_config(signal: &SignalConfig) -> PipelineResult<Self> {
        let rate = signal.sample_rate_hz;
        let duration = signal.window_duration_secs;
        let overlap = signal.window_overlap;
        if !(rate.is_finite() && rate > 0.0 && duration.is_finite() && duration > 0.0) {
            return Err(PipelineError::InvalidSignal {
                reason: format!("sample rate {rate} Hz and window {duration}s must be positive"),
            });
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(PipelineError::InvalidSignal {
                reason: format!("window overlap {overlap} must be in [0, 1)"),
            });
        }

        let window_len = seconds_to_samples((duration * rate).round());
        let keep = seconds_to_samples((duration * (1.0 - overlap * 0.5) * rate).floor());
        let epoch_len = seconds_to_samples((signal.epoch_duration() * rate).round());

        Self::new(window_len, keep, epoch_len)
    }

    /// Build a geometry from explicit sample counts.
    pub fn new(window_len: usize, keep: usize, epoch_len: usize) -> PipelineResult<Self> {
        if window_len == 0 {
            return Err(PipelineError::InvalidSignal {
                reason: "window must hold at least one sample".into(),
            });
        }
        if keep > window_len {
            return Err(PipelineError::InvalidSignal {
                reason: format!("cannot keep {keep} samples of a {window_len}-sample window"),
            });
        }
        if epoch_len == 0 || epoch_len > window_len {
            return Err(PipelineError::InvalidSignal {
                reason: format!("epoch of {epoch_len} samples does not fit a {window_len}-sample window"),
            });
        }
        Ok(Self {
            window_len,
            keep,
            epoch_len,
        })
    }

    /// New samples required between consecutive windows.
    ///
    /// `window_len − keep`, or a whole window when nothing overlaps, so two
    /// windows never cover the same range.
    pub fn stride(&self) -> usize {
        if self.keep < self.window_len {
            self.window_len - self.keep
        } else {
            self.window_len
        }
    }

    /// Buffer size at which a busy worker starts costing samples.
    pub fn capacity(&self) -> usize {
        self.keep + self.stride()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds_to_samples(count: f64) -> usize {
    if count <= 0.0 { 0 } else { count as usize }
}
