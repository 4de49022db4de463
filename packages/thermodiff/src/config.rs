//! Acquisition configuration.
//!
//! Everything here is fixed for the lifetime of a controller except the
//! measurement duration, which can be changed between sessions through
//! [`crate::SessionController::set_duration`].

use crate::error::{AcquisitionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 21-tap Hamming-windowed sinc low-pass kernel (cutoff 0.05 cycles/sample),
/// normalised so the taps sum to 1.
pub const DEFAULT_COEFFICIENTS: [f64; 21] = [
    0.00000000000000000,
    0.00132722289691133,
    0.00465025225065795,
    0.01174980260814237,
    0.02377922195610704,
    0.04072345118987478,
    0.06115692611623452,
    0.08240367418835903,
    0.10108221115667201,
    0.11389737880049781,
    0.11845971767308623,
    0.11389737880049781,
    0.10108221115667201,
    0.08240367418835903,
    0.06115692611623452,
    0.04072345118987478,
    0.02377922195610704,
    0.01174980260814237,
    0.00465025225065795,
    0.00132722289691133,
    0.00000000000000000,
];

pub const DEFAULT_DURATION_SECS: u64 = 100;

/// How channel values are turned into the reported difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Two channels; difference = filtered[0] - filtered[1]
    #[default]
    Differential,
    /// One channel; difference = filtered value minus the previous filtered value
    PreviousDelta,
}

impl ChannelMode {
    pub fn channel_count(self) -> usize {
        match self {
            ChannelMode::Differential => 2,
            ChannelMode::PreviousDelta => 1,
        }
    }

    fn default_columns(self) -> Vec<usize> {
        (0..self.channel_count()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Session length announced in `"pong <duration>"`
    pub duration_secs: u64,

    /// FIR kernel, one weight per tap
    pub coefficients: Vec<f64>,

    /// Readings discarded at the start of each session before buffering
    pub warmup_samples: usize,

    pub mode: ChannelMode,

    /// 0-based data-line fields feeding each channel (None = leading fields)
    pub columns: Option<Vec<usize>>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_DURATION_SECS,
            coefficients: DEFAULT_COEFFICIENTS.to_vec(),
            warmup_samples: 0,
            mode: ChannelMode::default(),
            columns: None,
        }
    }
}

impl AcquisitionConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Field indices feeding each channel, in channel order.
    pub fn resolved_columns(&self) -> Vec<usize> {
        self.columns
            .clone()
            .unwrap_or_else(|| self.mode.default_columns())
    }

    /// Minimum number of fields a data line must carry.
    pub fn required_fields(&self) -> usize {
        self.resolved_columns()
            .iter()
            .max()
            .map(|&c| c + 1)
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.coefficients.is_empty() {
            return Err(AcquisitionError::InvalidConfig(
                "coefficient vector must not be empty".to_string(),
            ));
        }

        if let Some(i) = self.coefficients.iter().position(|c| !c.is_finite()) {
            return Err(AcquisitionError::InvalidConfig(format!(
                "coefficient {} is not finite",
                i
            )));
        }

        validate_duration(self.duration_secs)?;

        let columns = self.resolved_columns();
        if columns.len() != self.mode.channel_count() {
            return Err(AcquisitionError::InvalidConfig(format!(
                "{:?} mode needs {} column(s), got {}",
                self.mode,
                self.mode.channel_count(),
                columns.len()
            )));
        }

        Ok(())
    }
}

pub(crate) fn validate_duration(duration_secs: u64) -> Result<()> {
    if duration_secs == 0 {
        return Err(AcquisitionError::InvalidConfig(
            "measurement duration must be positive".to_string(),
        ));
    }
    Ok(())
}
