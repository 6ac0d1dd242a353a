//! Fixed preprocessing applied to every window before classification:
//! average re-referencing, then cutting into fixed-length epochs.

use crate::error::{PipelineError, PipelineResult};
use crate::signal::{CHANNEL_COUNT, Window};

/// One re-referenced, fixed-length slice of a window.
#[derive(Debug, Clone, PartialEq)]
pub struct Epoch {
    samples: Vec<[f32; CHANNEL_COUNT]>,
}

impl Epoch {
    pub fn new(samples: Vec<[f32; CHANNEL_COUNT]>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[[f32; CHANNEL_COUNT]] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Values of one channel across the epoch.
    pub fn channel(&self, index: usize) -> impl Iterator<Item = f32> + Clone + '_ {
        self.samples.iter().map(move |s| s[index])
    }
}

/// Re-referencing and epoching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocessor {
    epoch_len: usize,
}

impl Preprocessor {
    pub fn new(epoch_len: usize) -> Self {
        Self { epoch_len }
    }

    pub fn epoch_len(&self) -> usize {
        self.epoch_len
    }

    /// Re-reference every sample to the channel mean and split the window
    /// into consecutive epochs. An incomplete tail is dropped.
    pub fn prepare(&self, window: &Window) -> PipelineResult<Vec<Epoch>> {
        if self.epoch_len == 0 || window.len() < self.epoch_len {
            return Err(PipelineError::Inference {
                reason: format!(
                    "window {} holds {} samples, fewer than one {}-sample epoch",
                    window.sequence(),
                    window.len(),
                    self.epoch_len
                ),
            });
        }

        let referenced: Vec<[f32; CHANNEL_COUNT]> = window
            .samples()
            .iter()
            .map(|sample| average_reference(sample.channels))
            .collect();

        Ok(referenced
            .chunks_exact(self.epoch_len)
            .map(|chunk| Epoch::new(chunk.to_vec()))
            .collect())
    }
}

#[allow(clippy::cast_precision_loss)]
fn average_reference(channels: [f32; CHANNEL_COUNT]) -> [f32; CHANNEL_COUNT] {
    let mean = channels.iter().sum::<f32>() / CHANNEL_COUNT as f32;
    channels.map(|v| v - mean)
}
