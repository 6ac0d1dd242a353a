//! Topic constants and address routing.

use crate::bands::Band;
use crate::config::ListenerConfig;

/// Known topic suffixes, appended to the sensor or marker prefix.
pub struct Suffixes;

impl Suffixes {
    // ─── Sensor ─────────────────────────────────────────────────────

    /// Raw EEG samples (4 channels, optional AUX columns).
    pub const EEG: &'static str = "/eeg";

    /// 3-axis accelerometer.
    pub const ACC: &'static str = "/acc";

    /// Blink detections.
    pub const BLINK: &'static str = "/elements/blink";

    /// Jaw clench detections.
    pub const JAW_CLENCH: &'static str = "/elements/jaw_clench";

    /// Prefix of the absolute band-power topics, e.g. `/elements/alpha_absolute`.
    pub const BAND_PREFIX: &'static str = "/elements/";

    /// Suffix of the absolute band-power topics.
    pub const BAND_SUFFIX: &'static str = "_absolute";

    // ─── Markers ────────────────────────────────────────────────────

    /// Session start marker.
    pub const MARKER_START: &'static str = "/1";

    /// Session stop marker.
    pub const MARKER_STOP: &'static str = "/2";
}

/// Where an incoming address should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Eeg,
    Accelerometer,
    Blink,
    JawClench,
    BandPower(Band),
    SessionStart,
    SessionStop,
    Unknown,
}

/// Address table built from the configured prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    sensor_prefix: String,
    marker_prefix: String,
}

impl Topics {
    pub fn new(sensor_prefix: impl Into<String>, marker_prefix: impl Into<String>) -> Self {
        Self {
            sensor_prefix: normalize_prefix(sensor_prefix.into()),
            marker_prefix: normalize_prefix(marker_prefix.into()),
        }
    }

    pub fn from_config(config: &ListenerConfig) -> Self {
        Self::new(config.sensor_prefix.clone(), config.marker_prefix.clone())
    }

    /// Full address of a sensor topic, e.g. `topics.sensor(Suffixes::EEG)`.
    pub fn sensor(&self, suffix: &str) -> String {
        format!("{}{}", self.sensor_prefix, suffix)
    }

    /// Full address of a marker topic.
    pub fn marker(&self, suffix: &str) -> String {
        format!("{}{}", self.marker_prefix, suffix)
    }

    /// Full address of a band-power topic.
    pub fn band(&self, band: Band) -> String {
        format!(
            "{}{}{}{}",
            self.sensor_prefix,
            Suffixes::BAND_PREFIX,
            band.name(),
            Suffixes::BAND_SUFFIX
        )
    }

    /// Resolve an OSC address to its route.
    pub fn route(&self, addr: &str) -> Route {
        if let Some(suffix) = addr.strip_prefix(self.sensor_prefix.as_str()) {
            return match suffix {
                Suffixes::EEG => Route::Eeg,
                Suffixes::ACC => Route::Accelerometer,
                Suffixes::BLINK => Route::Blink,
                Suffixes::JAW_CLENCH => Route::JawClench,
                other => other
                    .strip_prefix(Suffixes::BAND_PREFIX)
                    .and_then(|rest| rest.strip_suffix(Suffixes::BAND_SUFFIX))
                    .and_then(Band::from_name)
                    .map_or(Route::Unknown, Route::BandPower),
            };
        }
        if let Some(suffix) = addr.strip_prefix(self.marker_prefix.as_str()) {
            return match suffix {
                Suffixes::MARKER_START => Route::SessionStart,
                Suffixes::MARKER_STOP => Route::SessionStop,
                _ => Route::Unknown,
            };
        }
        Route::Unknown
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::from_config(&ListenerConfig::default())
    }
}

/// Ensure a single leading slash and no trailing slash.
fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
