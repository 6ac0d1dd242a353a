//! Absolute band-power telemetry (`<sensor>/elements/<band>_absolute`).
//!
//! Kept as the latest value per band for display; it never feeds the
//! classifier.

use std::fmt;
use std::sync::Mutex;

use crate::signal::CHANNEL_COUNT;

/// EEG frequency band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    /// Lower-case name used in topic suffixes.
    pub fn name(self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Band::ALL.into_iter().find(|band| band.name() == name)
    }

    fn index(self) -> usize {
        match self {
            Band::Delta => 0,
            Band::Theta => 1,
            Band::Alpha => 2,
            Band::Beta => 3,
            Band::Gamma => 4,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Latest per-channel absolute power for every band. `None` until the band
/// has been received once.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandPowers {
    values: [Option<[f32; CHANNEL_COUNT]>; 5],
}

impl BandPowers {
    pub fn get(&self, band: Band) -> Option<[f32; CHANNEL_COUNT]> {
        self.values[band.index()]
    }

    pub fn set(&mut self, band: Band, powers: [f32; CHANNEL_COUNT]) {
        self.values[band.index()] = Some(powers);
    }

    /// Channel-averaged power of one band.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self, band: Band) -> Option<f32> {
        self.get(band)
            .map(|powers| powers.iter().sum::<f32>() / CHANNEL_COUNT as f32)
    }

    /// Share of `band` in the summed channel-averaged power of all received
    /// bands, in `[0, 1]`.
    pub fn relative(&self, band: Band) -> Option<f32> {
        let own = self.mean(band)?;
        let total: f32 = Band::ALL
            .into_iter()
            .filter_map(|b| self.mean(b))
            .map(f32::abs)
            .sum();
        if total <= f32::EPSILON {
            return None;
        }
        Some((own.abs() / total).clamp(0.0, 1.0))
    }
}

/// Shared latest-value cell written by ingestion and read by the facade.
#[derive(Debug, Default)]
pub struct BandCell(Mutex<BandPowers>);

impl BandCell {
    pub fn update(&self, band: Band, powers: [f32; CHANNEL_COUNT]) {
        if let Ok(mut guard) = self.0.lock() {
            guard.set(band, powers);
        }
    }

    pub fn snapshot(&self) -> BandPowers {
        self.0.lock().map(|guard| *guard).unwrap_or_default()
    }
}
