//! # Configuration
//!
//! [`PipelineConfig`] holds everything needed to run a session: where to
//! listen, how to window the EEG stream, how to debounce blinks, the motion
//! thresholds, and where the classifier artifact lives.
//!
//! ## Loading Priority
//!
//! Configuration is loaded from the first source that provides it:
//!
//! 1. TOML config file at an explicit path
//! 2. `ORACLE_CONFIG` environment variable pointing at a file
//! 3. `./oracle.toml` in the current directory
//! 4. `~/.config/oracle-bci/oracle.toml`
//! 5. Built-in defaults
//!
//! Environment variables (`ORACLE_BIND_ADDRESS`, `ORACLE_PORT`,
//! `ORACLE_MODEL_PATH`, `ORACLE_CONTROL_MODE`) override whichever source won.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::control::ControlMode;
use crate::debounce::EventKind;
use crate::error::{PipelineError, PipelineResult};
use crate::motion::Axis;

/// Default bind address (all interfaces, like the headset bridge apps expect).
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default UDP port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default topic prefix for sensor streams.
pub const DEFAULT_SENSOR_PREFIX: &str = "/muse";

/// Default topic prefix for session markers.
pub const DEFAULT_MARKER_PREFIX: &str = "/Marker";

/// Default EEG sample rate in Hz.
const DEFAULT_SAMPLE_RATE_HZ: f64 = 256.0;

/// Default window length in seconds.
const DEFAULT_WINDOW_DURATION_SECS: f64 = 1.0;

/// Default window overlap fraction.
const DEFAULT_WINDOW_OVERLAP: f64 = 0.2;

/// Default double-blink gap in seconds.
const DEFAULT_DOUBLE_GAP_SECS: f64 = 0.7;

/// Default accelerometer threshold for "left".
const DEFAULT_THRESHOLD_UP: f32 = 0.4;

/// Default accelerometer threshold for "right".
const DEFAULT_THRESHOLD_DOWN: f32 = -0.3;

/// Default classifier artifact path.
const DEFAULT_MODEL_PATH: &str = "models/classifier.json";

/// Default stall timeout in seconds (0 = watchdog disabled).
const DEFAULT_STALL_TIMEOUT_SECS: u64 = 10;

/// Default UI frame rate cap.
const DEFAULT_FRAME_RATE_HZ: u32 = 120;

/// Configuration for one pipeline session.
///
/// # Examples
///
/// ```
/// use oracle_bci::config::PipelineConfig;
///
/// let mut config = PipelineConfig::default();
/// config.listener.port = 0;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Network listener settings.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// EEG sampling and windowing.
    #[serde(default)]
    pub signal: SignalConfig,

    /// Blink/jaw-clench debouncing.
    #[serde(default)]
    pub debounce: DebounceConfig,

    /// Accelerometer override thresholds.
    #[serde(default)]
    pub motion: MotionConfig,

    /// Classifier artifact and worker watchdog.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Which source drives direction, and the UI poll rate.
    #[serde(default)]
    pub control: ControlConfig,
}

/// Where the ingestion front-end listens and which topics it routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub address: String,

    /// UDP port. `0` binds an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Topic prefix of the sensor streams (`<sensor>/eeg`, `<sensor>/acc`, ...).
    #[serde(default = "default_sensor_prefix")]
    pub sensor_prefix: String,

    /// Topic prefix of the session markers (`<marker>/1`, `<marker>/2`).
    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,
}

/// Sampling and windowing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Nominal EEG sample rate, in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,

    /// Length of one inference window, in seconds.
    #[serde(default = "default_window_duration")]
    pub window_duration_secs: f64,

    /// Fraction of a window carried across the window boundary.
    #[serde(default = "default_window_overlap")]
    pub window_overlap: f64,

    /// Length of one classifier epoch, in seconds. Defaults to the window length.
    #[serde(default)]
    pub epoch_duration_secs: Option<f64>,
}

/// Discrete-event debouncing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Two trigger events closer than this (seconds) form a double (cancel).
    #[serde(default = "default_double_gap")]
    pub double_gap_secs: f64,

    /// Event kind that drives confirm/cancel.
    #[serde(default)]
    pub trigger: EventKind,
}

/// Accelerometer override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Axis read from each 3-axis sample.
    #[serde(default)]
    pub axis: Axis,

    /// Values strictly above this map to "left".
    #[serde(default = "default_threshold_up")]
    pub threshold_up: f32,

    /// Values strictly below this map to "right".
    #[serde(default = "default_threshold_down")]
    pub threshold_down: f32,
}

/// Classifier artifact and worker supervision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Path to the classifier artifact, loaded once at worker startup.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Seconds the worker may stay busy before it is reported stalled. 0 disables.
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,
}

/// Control fusion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Source of the fused direction.
    #[serde(default)]
    pub mode: ControlMode,

    /// Frame rate at which the UI polls the facade.
    #[serde(default = "default_frame_rate")]
    pub frame_rate_hz: u32,
}

// ─── Defaults ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_sensor_prefix() -> String {
    DEFAULT_SENSOR_PREFIX.to_string()
}

fn default_marker_prefix() -> String {
    DEFAULT_MARKER_PREFIX.to_string()
}

fn default_sample_rate() -> f64 {
    DEFAULT_SAMPLE_RATE_HZ
}

fn default_window_duration() -> f64 {
    DEFAULT_WINDOW_DURATION_SECS
}

fn default_window_overlap() -> f64 {
    DEFAULT_WINDOW_OVERLAP
}

fn default_double_gap() -> f64 {
    DEFAULT_DOUBLE_GAP_SECS
}

fn default_threshold_up() -> f32 {
    DEFAULT_THRESHOLD_UP
}

fn default_threshold_down() -> f32 {
    DEFAULT_THRESHOLD_DOWN
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

fn default_stall_timeout() -> u64 {
    DEFAULT_STALL_TIMEOUT_SECS
}

fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE_HZ
}

// ─── Default impls ──────────────────────────────────────────────────────

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: default_bind_address(),
            port: DEFAULT_PORT,
            sensor_prefix: default_sensor_prefix(),
            marker_prefix: default_marker_prefix(),
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            window_duration_secs: DEFAULT_WINDOW_DURATION_SECS,
            window_overlap: DEFAULT_WINDOW_OVERLAP,
            epoch_duration_secs: None,
        }
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            double_gap_secs: DEFAULT_DOUBLE_GAP_SECS,
            trigger: EventKind::default(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            axis: Axis::default(),
            threshold_up: DEFAULT_THRESHOLD_UP,
            threshold_down: DEFAULT_THRESHOLD_DOWN,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            stall_timeout_secs: DEFAULT_STALL_TIMEOUT_SECS,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            mode: ControlMode::default(),
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
        }
    }
}

impl ListenerConfig {
    /// `address:port` string used for binding and error messages.
    pub fn bind_addr(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl SignalConfig {
    /// Epoch length in seconds, falling back to the window length.
    pub fn epoch_duration(&self) -> f64 {
        self.epoch_duration_secs
            .unwrap_or(self.window_duration_secs)
    }
}

// ─── PipelineConfig impl ────────────────────────────────────────────────

impl PipelineConfig {
    /// Load config from a TOML file, then apply environment overrides.
    #[cfg(feature = "config-toml")]
    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| PipelineError::ConfigError {
                reason: format!("Failed to read config file '{}': {}", path.display(), e),
            })?;
        let mut config: Self = toml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Built-in defaults with environment overrides applied.
    pub fn from_env() -> PipelineResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Discover and load config from the standard search path:
    ///
    /// 1. Explicit path (if `Some`)
    /// 2. `ORACLE_CONFIG` environment variable
    /// 3. `./oracle.toml`
    /// 4. `~/.config/oracle-bci/oracle.toml`
    ///
    /// Falls back to defaults plus environment overrides if no file is found.
    #[cfg(feature = "config-toml")]
    pub fn discover(explicit_path: Option<&Path>) -> PipelineResult<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var("ORACLE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        let local_path = PathBuf::from("oracle.toml");
        if local_path.exists() {
            return Self::from_file(&local_path);
        }

        if let Some(config_path) = dirs_config_path() {
            if config_path.exists() {
                return Self::from_file(&config_path);
            }
        }

        Self::from_env()
    }

    /// Apply `ORACLE_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> PipelineResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (environment, CLI flags, tests).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> PipelineResult<()> {
        if let Some(address) = lookup("ORACLE_BIND_ADDRESS") {
            self.listener.address = address;
        }
        if let Some(port) = lookup("ORACLE_PORT") {
            self.listener.port = port.parse().map_err(|_| PipelineError::ConfigError {
                reason: format!("ORACLE_PORT must be a port number, got '{port}'"),
            })?;
        }
        if let Some(path) = lookup("ORACLE_MODEL_PATH") {
            self.inference.model_path = PathBuf::from(path);
        }
        if let Some(mode) = lookup("ORACLE_CONTROL_MODE") {
            self.control.mode = mode.parse()?;
        }
        Ok(())
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> PipelineResult<()> {
        let signal = &self.signal;
        if !(signal.sample_rate_hz.is_finite() && signal.sample_rate_hz > 0.0) {
            return Err(invalid("signal.sample_rate_hz must be greater than zero"));
        }
        if !(signal.window_duration_secs.is_finite() && signal.window_duration_secs > 0.0) {
            return Err(invalid("signal.window_duration_secs must be greater than zero"));
        }
        if !(0.0..1.0).contains(&signal.window_overlap) {
            return Err(invalid("signal.window_overlap must be in [0, 1)"));
        }
        let epoch = signal.epoch_duration();
        if !(epoch.is_finite() && epoch > 0.0) || epoch > signal.window_duration_secs {
            return Err(invalid(
                "signal.epoch_duration_secs must be positive and no longer than the window",
            ));
        }
        if !(self.debounce.double_gap_secs.is_finite() && self.debounce.double_gap_secs > 0.0) {
            return Err(invalid("debounce.double_gap_secs must be greater than zero"));
        }
        if self.motion.threshold_down >= self.motion.threshold_up {
            return Err(invalid(
                "motion.threshold_down must be lower than motion.threshold_up",
            ));
        }
        if self.control.frame_rate_hz == 0 {
            return Err(invalid("control.frame_rate_hz must be greater than zero"));
        }
        Ok(())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn invalid(reason: &str) -> PipelineError {
    PipelineError::ConfigError {
        reason: reason.to_string(),
    }
}

/// Platform-appropriate config file path.
fn dirs_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|dir| PathBuf::from(dir).join("oracle-bci").join("oracle.toml"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok().map(|dir| {
            PathBuf::from(dir)
                .join(".config")
                .join("oracle-bci")
                .join("oracle.toml")
        })
    }
}
