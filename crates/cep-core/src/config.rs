//! Analyser configuration.
//!
//! A configuration is immutable for the lifetime of one processing epoch.
//! Changing any field that shapes the buffers forces a full teardown; the
//! remaining fields are hot-applied.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CepstrumError, Result};
use crate::time::SECOND;

pub const MAX_TRANSFORM_SIZE: usize = 4096;
pub const MAX_WINDOW_SIZE: usize = 4096;
pub const MAX_HOP_SIZE: usize = 4096;
pub const MAX_NUM_COEFFS: usize = 512;
pub const MAX_SAMPLE_RATE: u32 = 92_000;

/// Parameters of the MFCC analysis and of its reporting schedule.
///
/// # Example
/// ```
/// use cep_core::config::CepstrumConfig;
/// let cfg = CepstrumConfig::default();
/// assert_eq!(cfg.frame_length(), 1022);
/// assert_eq!(cfg.num_filters(), 26);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CepstrumConfig {
    /// Emit one event per completed interval.
    pub post_results: bool,
    /// Report one coefficient vector per input channel instead of a downmix.
    pub multi_channel: bool,
    /// Reporting interval in nanoseconds.
    pub interval_ns: u64,
    /// Number of cepstral coefficients per vector.
    pub num_coeffs: usize,
    /// Sample rate the Mel filterbank is laid out for.
    pub sample_rate: u32,
    /// Half-spectrum size. The analysis frame is `2 * transform_size - 2` long.
    pub transform_size: usize,
    /// Number of recent samples submitted to each transform.
    pub window_size: usize,
    /// Carried for compatibility, not consumed by the scheduler.
    pub hop_size: usize,
    pub use_preemphasis: bool,
    pub preemphasis_coeff: f32,
    /// Carried for compatibility, not consumed by the scheduler.
    pub energy_threshold: i32,
}

impl Default for CepstrumConfig {
    fn default() -> Self {
        Self {
            post_results: true,
            multi_channel: false,
            interval_ns: SECOND / 10,
            num_coeffs: 13,
            sample_rate: 16_000,
            transform_size: 512,
            window_size: 512,
            hop_size: 256,
            use_preemphasis: true,
            preemphasis_coeff: 0.97,
            energy_threshold: 0,
        }
    }
}

impl CepstrumConfig {
    /// Length of the circular frame buffer and of the real transform input.
    #[inline]
    #[must_use]
    pub fn frame_length(&self) -> usize {
        (2 * self.transform_size).saturating_sub(2)
    }

    /// Number of Mel filters, always twice the coefficient count.
    #[inline]
    #[must_use]
    pub fn num_filters(&self) -> usize {
        2 * self.num_coeffs
    }

    /// Check every field against its accepted range.
    ///
    /// # Errors
    /// Returns [`CepstrumError::InvalidParameter`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ns == 0 {
            return Err(CepstrumError::invalid("interval_ns", 0, ">= 1"));
        }
        if !(1..=MAX_NUM_COEFFS).contains(&self.num_coeffs) {
            return Err(CepstrumError::invalid(
                "num_coeffs",
                self.num_coeffs,
                "1..=512",
            ));
        }
        if !(1..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(CepstrumError::invalid(
                "sample_rate",
                self.sample_rate,
                "1..=92000",
            ));
        }
        if !(1..=MAX_TRANSFORM_SIZE).contains(&self.transform_size) {
            return Err(CepstrumError::invalid(
                "transform_size",
                self.transform_size,
                "1..=4096",
            ));
        }
        if self.frame_length() == 0 {
            return Err(CepstrumError::invalid(
                "frame_length",
                0,
                "> 0 (transform_size >= 2)",
            ));
        }
        if !(1..=MAX_WINDOW_SIZE).contains(&self.window_size) {
            return Err(CepstrumError::invalid(
                "window_size",
                self.window_size,
                "1..=4096",
            ));
        }
        if self.window_size > self.frame_length() {
            return Err(CepstrumError::invalid(
                "window_size",
                self.window_size,
                "<= 2 * transform_size - 2",
            ));
        }
        if !(1..=MAX_HOP_SIZE).contains(&self.hop_size) {
            return Err(CepstrumError::invalid(
                "hop_size",
                self.hop_size,
                "1..=4096",
            ));
        }
        if !self.preemphasis_coeff.is_finite() || !(0.0..=1.0).contains(&self.preemphasis_coeff) {
            return Err(CepstrumError::invalid(
                "preemphasis_coeff",
                self.preemphasis_coeff,
                "0.0..=1.0",
            ));
        }
        Ok(())
    }

    /// True when switching from `self` to `other` invalidates allocated
    /// buffers, filterbank or schedule.
    ///
    /// # Example
    /// ```
    /// use cep_core::config::CepstrumConfig;
    /// let cfg = CepstrumConfig::default();
    /// let hot = CepstrumConfig { preemphasis_coeff: 0.9, ..cfg.clone() };
    /// let cold = CepstrumConfig { num_coeffs: 20, ..cfg.clone() };
    /// assert!(!cfg.requires_rebuild(&hot));
    /// assert!(cfg.requires_rebuild(&cold));
    /// ```
    #[must_use]
    pub fn requires_rebuild(&self, other: &Self) -> bool {
        self.transform_size != other.transform_size
            || self.window_size != other.window_size
            || self.hop_size != other.hop_size
            || self.sample_rate != other.sample_rate
            || self.num_coeffs != other.num_coeffs
            || self.multi_channel != other.multi_channel
            || self.interval_ns != other.interval_ns
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns an error if the document is malformed or a value is out of range.
    ///
    /// # Example
    /// ```
    /// use cep_core::config::CepstrumConfig;
    /// let cfg = CepstrumConfig::from_toml_str("num_coeffs = 20\nmulti_channel = true").unwrap();
    /// assert_eq!(cfg.num_filters(), 40);
    /// assert!(cfg.multi_channel);
    /// assert_eq!(cfg.transform_size, 512);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(source)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a TOML configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let cfg = Self::from_toml_str(&source)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(cfg)
    }
}
