use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default calibration window, in seconds.
pub const DEFAULT_CALIBRATION_DURATION: f64 = 2.0;
/// Default multiple of the heatmap standard deviation above which a pixel is hot.
pub const DEFAULT_SIGMA_THRESHOLD: f64 = 8.0;
/// Default side length of the square density blur kernel.
pub const DEFAULT_BLUR_KERNEL_SIZE: usize = 5;
/// Default cut on the blurred per-batch density.
///
/// Tuned for the 5x5 binomial kernel (centre weight 0.140625); a different
/// kernel size changes the suppression behaviour and needs a retuned value.
pub const DEFAULT_DENSITY_THRESHOLD: f32 = 0.6;

/// Tuning parameters of the noise filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub calibration_duration: f64,
    pub sigma_threshold: f64,
    pub blur_kernel_size: usize,
    pub density_threshold: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            calibration_duration: DEFAULT_CALIBRATION_DURATION,
            sigma_threshold: DEFAULT_SIGMA_THRESHOLD,
            blur_kernel_size: DEFAULT_BLUR_KERNEL_SIZE,
            density_threshold: DEFAULT_DENSITY_THRESHOLD,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.calibration_duration.is_finite() && self.calibration_duration > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "calibration_duration must be positive, got {}",
                self.calibration_duration
            )));
        }
        if !(self.sigma_threshold.is_finite() && self.sigma_threshold >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sigma_threshold must be non-negative, got {}",
                self.sigma_threshold
            )));
        }
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(Error::InvalidConfig(format!(
                "blur_kernel_size must be odd, got {}",
                self.blur_kernel_size
            )));
        }
        if !self.density_threshold.is_finite() {
            return Err(Error::InvalidConfig(
                "density_threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings of the background polling worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Sleep after a poll that delivered no batch, in microseconds.
    pub poll_backoff_us: u64,
    /// Outputs buffered for the consumer before new ones are dropped.
    pub output_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_backoff_us: 500,
            output_capacity: 64,
        }
    }
}

impl WorkerConfig {
    pub fn poll_backoff(&self) -> Duration {
        Duration::from_micros(self.poll_backoff_us)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_capacity == 0 {
            return Err(Error::InvalidConfig(
                "output_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full configuration, as loaded from a JSON file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub filter: FilterConfig,
    pub worker: WorkerConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        self.worker.validate()
    }
}
