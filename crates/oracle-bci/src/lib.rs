//! # oracle-bci
//!
//! Real-time pipeline that turns streamed EEG and motion samples into a
//! small carousel control vocabulary: move left, move right, confirm, cancel.
//!
//! A sensor bridge (e.g. Mind Monitor for Muse headsets) publishes OSC over
//! UDP. The pipeline ingests it on a background thread, windows the EEG
//! stream, classifies each window on a dedicated worker thread, debounces
//! blinks into confirm/cancel, and exposes the fused result through a
//! non-blocking facade the UI polls once per frame.
//!
//! ## Quick Start
//!
//! ```ignore
//! use oracle_bci::{Pipeline, PipelineConfig};
//!
//! fn main() -> oracle_bci::PipelineResult<()> {
//!     // Load oracle.toml or defaults, plus ORACLE_* overrides
//!     let config = PipelineConfig::discover(None)?;
//!
//!     // Fails here if the model is missing or the port is taken
//!     let mut pipeline = Pipeline::start(&config)?;
//!
//!     while pipeline.is_listening() {
//!         let frame = pipeline.poll_frame();
//!         if let Some(direction) = frame.direction {
//!             println!("move {direction}");
//!         }
//!         if frame.confirm_pending {
//!             println!("confirm");
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(8));
//!     }
//!
//!     pipeline.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Data Flow
//!
//! | Stage | Module | Thread |
//! |-------|--------|--------|
//! | UDP receive, topic routing | [`listener`], [`protocol`], [`ingest`] | `oracle-listener` |
//! | Rolling buffer, window extraction | [`windower`] | `oracle-listener` |
//! | Blink/clench debouncing | [`debounce`] | `oracle-listener` (write), UI (read) |
//! | Accelerometer override | [`motion`] | `oracle-listener` (write), UI (read) |
//! | Preprocessing, classification | [`inference`] | `oracle-inference` |
//! | Per-frame fused state | [`control`] | UI |
//!
//! ## Configuration
//!
//! See [`PipelineConfig`] for the full reference. Environment overrides:
//!
//! ```bash
//! export ORACLE_PORT=5000
//! export ORACLE_MODEL_PATH=models/classifier.json
//! export ORACLE_CONTROL_MODE=motion
//! ```

pub mod bands;
pub mod config;
pub mod control;
pub mod debounce;
pub mod error;
pub mod health;
pub mod inference;
pub mod ingest;
pub mod listener;
pub mod motion;
pub mod pipeline;
pub mod protocol;
pub mod signal;
pub mod windower;

// ─── Public re-exports ──────────────────────────────────────────────────

pub use config::PipelineConfig;
pub use control::{ControlFacade, ControlMode, ControlSnapshot, PipelineStats};
pub use debounce::{ConfirmState, Debouncer, EventKind};
pub use error::{PipelineError, PipelineResult};
pub use health::WorkerHealth;
pub use inference::{
    ClassScores, Classifier, Direction, Epoch, InferenceDispatcher, LinearModel, PredictionResult,
};
pub use motion::{MotionOverride, MotionState};
pub use pipeline::Pipeline;
pub use signal::{Sample, Window, WindowGeometry};
