//! JSON classifier artifact: a two-class linear model over per-channel
//! log-variance features, softmax-normalised.
//!
//! ```json
//! {
//!   "name": "lateralization",
//!   "weights": [[1.0, 1.0, -1.0, -1.0], [-1.0, -1.0, 1.0, 1.0]],
//!   "bias": [0.0, 0.0],
//!   "variance_floor": 1e-6
//! }
//! ```
//!
//! Row 0 of `weights` scores `left`, row 1 scores `right`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::inference::preprocess::Epoch;
use crate::inference::{ClassScores, Classifier};
use crate::signal::CHANNEL_COUNT;

fn default_variance_floor() -> f32 {
    1e-6
}

/// Linear log-variance classifier loaded from a JSON artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub name: String,

    /// Per-class weights over the channel features, `[left, right]`.
    pub weights: [[f32; CHANNEL_COUNT]; 2],

    /// Per-class bias, `[left, right]`.
    #[serde(default)]
    pub bias: [f32; 2],

    /// Added to each variance before the logarithm.
    #[serde(default = "default_variance_floor")]
    pub variance_floor: f32,
}

impl LinearModel {
    /// Load and validate a model artifact.
    ///
    /// # Errors
    /// [`PipelineError::ModelNotFound`] if the file does not exist,
    /// [`PipelineError::ModelLoad`] if it cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::ModelNotFound {
                path: path.display().to_string(),
            });
        }
        let load_error = |reason: String| PipelineError::ModelLoad {
            path: path.display().to_string(),
            reason,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let model: Self = serde_json::from_str(&contents).map_err(|e| load_error(e.to_string()))?;
        model.validate().map_err(load_error)?;

        tracing::info!(path = %path.display(), name = %model.name, "Model loaded");
        Ok(model)
    }

    /// Write the model as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> PipelineResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Built-in template contrasting left- and right-hemisphere power.
    ///
    /// Channels TP9/AF7 sit over the left hemisphere and AF8/TP10 over the
    /// right; relatively higher left power scores `left`.
    pub fn lateralization() -> Self {
        Self {
            name: "lateralization".into(),
            weights: [[1.0, 1.0, -1.0, -1.0], [-1.0, -1.0, 1.0, 1.0]],
            bias: [0.0, 0.0],
            variance_floor: default_variance_floor(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let finite = self
            .weights
            .iter()
            .flatten()
            .chain(self.bias.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err("weights and bias must be finite".into());
        }
        if !(self.variance_floor.is_finite() && self.variance_floor > 0.0) {
            return Err("variance_floor must be positive".into());
        }
        Ok(())
    }

    /// Natural log of each channel's variance.
    fn features(&self, epoch: &Epoch) -> [f32; CHANNEL_COUNT] {
        std::array::from_fn(|c| (variance(epoch.channel(c)) + self.variance_floor).ln())
    }
}

impl Classifier for LinearModel {
    fn classify(&mut self, epoch: &Epoch) -> PipelineResult<ClassScores> {
        if epoch.is_empty() {
            return Err(PipelineError::Inference {
                reason: "empty epoch".into(),
            });
        }
        let features = self.features(epoch);
        let logits: [f32; 2] = std::array::from_fn(|class| {
            self.weights[class]
                .iter()
                .zip(features)
                .map(|(w, f)| w * f)
                .sum::<f32>()
                + self.bias[class]
        });
        let scores = ClassScores::softmax(logits);
        if !(scores.left.is_finite() && scores.right.is_finite()) {
            return Err(PipelineError::Inference {
                reason: "non-finite class scores".into(),
            });
        }
        Ok(scores)
    }
}

#[allow(clippy::cast_precision_loss)]
fn variance(values: impl Iterator<Item = f32> + Clone) -> f32 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f32>() / n as f32;
    values.map(|v| (v - mean).powi(2)).sum::<f32>() / n as f32
}
