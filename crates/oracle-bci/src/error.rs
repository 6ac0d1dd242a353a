//! # Error Types
//!
//! Semantic error types for the signal-to-control pipeline. Every variant
//! carries enough context to diagnose the problem without digging through
//! logs.
//!
//! ## Startup vs. runtime
//!
//! Errors fall into two groups. Startup errors (bind failure, missing model,
//! invalid configuration) abort [`Pipeline::start`](crate::pipeline::Pipeline::start)
//! before any sample is accepted. Worker errors are reported while the
//! session runs and never stop ingestion.

use thiserror::Error;

/// Convenient Result alias for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// All errors that can occur while running the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    // ─── Network ────────────────────────────────────────────────────
    /// The UDP listener could not bind its address.
    #[error("Failed to bind sensor listener on {addr}: {reason}. Is another receiver using the port?")]
    BindFailed { addr: String, reason: String },

    // ─── Model ──────────────────────────────────────────────────────
    /// The classifier artifact does not exist.
    #[error("Model artifact not found at '{path}'. Place a trained model there or run `oracle-bci init-model`.")]
    ModelNotFound { path: String },

    /// The classifier artifact exists but could not be loaded.
    #[error("Failed to load model '{path}': {reason}")]
    ModelLoad { path: String, reason: String },

    // ─── Inference worker ───────────────────────────────────────────
    /// The inference worker could not be started.
    #[error("Inference worker failed to start: {reason}")]
    WorkerStartup { reason: String },

    /// A window was submitted while the worker was still processing the previous one.
    #[error("Inference worker is busy with the previous window")]
    WorkerBusy,

    /// The worker has exited (crashed or terminated) and accepts no more windows.
    #[error("Inference worker is no longer running")]
    WorkerUnavailable,

    /// The worker has not reported readiness within the stall timeout.
    #[error("Inference worker stalled: busy for more than {seconds}s")]
    WorkerStalled { seconds: u64 },

    /// Preprocessing or classification of a window failed.
    #[error("Inference failed: {reason}")]
    Inference { reason: String },

    // ─── Signal ─────────────────────────────────────────────────────
    /// Window geometry or sample data is inconsistent.
    #[error("Invalid signal parameters: {reason}")]
    InvalidSignal { reason: String },

    // ─── Config ─────────────────────────────────────────────────────
    /// Configuration file error (missing, malformed, or invalid values).
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    // ─── Wire ───────────────────────────────────────────────────────
    /// OSC encoding or decoding error.
    #[error("OSC error: {0}")]
    Osc(String),

    // ─── I/O ────────────────────────────────────────────────────────
    /// Socket, thread or filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Returns `true` if this error must abort startup before the listener
    /// accepts traffic.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            PipelineError::BindFailed { .. }
                | PipelineError::ModelNotFound { .. }
                | PipelineError::ModelLoad { .. }
                | PipelineError::WorkerStartup { .. }
                | PipelineError::ConfigError { .. }
                | PipelineError::InvalidSignal { .. }
        )
    }

    /// Returns `true` if this error comes from the inference worker's
    /// admission control or execution.
    pub fn is_worker_error(&self) -> bool {
        matches!(
            self,
            PipelineError::WorkerBusy
                | PipelineError::WorkerUnavailable
                | PipelineError::WorkerStalled { .. }
                | PipelineError::Inference { .. }
        )
    }
}

// ─── From impls for external error types ────────────────────────────────

impl From<rosc::OscError> for PipelineError {
    fn from(err: rosc::OscError) -> Self {
        PipelineError::Osc(format!("{err:?}"))
    }
}

#[cfg(feature = "config-toml")]
impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::ConfigError {
            reason: err.to_string(),
        }
    }
}
