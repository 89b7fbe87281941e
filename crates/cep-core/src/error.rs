//! Error taxonomy for the cepstrum analyser.

use thiserror::Error;

/// Result alias used across the analyser crates.
pub type Result<T> = std::result::Result<T, CepstrumError>;

/// Errors raised by configuration, format setup or chunk processing.
///
/// Recoverable conditions (discontinuities, hot parameter changes) are handled
/// by resetting state and never show up here.
#[derive(Error, Debug)]
pub enum CepstrumError {
    /// A parameter is outside its accepted range. Rejected before allocation.
    #[error("invalid parameter `{name}` = {value} (expected {expected})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    /// The sample encoding is not one the normalizer can read.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Input arrived before a stream format was negotiated.
    #[error("no stream format configured, call setup() first")]
    NotNegotiated,

    /// The chunk does not hold a whole number of interleaved frames.
    #[error("chunk of {len} bytes is not a multiple of the {frame_bytes}-byte frame")]
    MisalignedChunk { len: usize, frame_bytes: usize },

    /// A scheduling or accumulator invariant did not hold.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// The TOML configuration could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CepstrumError {
    pub(crate) fn invalid(
        name: &'static str,
        value: impl std::fmt::Display,
        expected: &'static str,
    ) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            expected,
        }
    }

    /// True for errors that must be fixed in configuration before any input
    /// can be processed.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. }
                | Self::UnsupportedFormat(_)
                | Self::NotNegotiated
                | Self::ConfigParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameter_message_names_the_field() {
        let err = CepstrumError::invalid("window_size", 0, "1..=4096");
        assert_eq!(
            err.to_string(),
            "invalid parameter `window_size` = 0 (expected 1..=4096)"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn invariant_violation_is_not_a_configuration_error() {
        let err = CepstrumError::InvariantViolation("residual bytes".into());
        assert!(!err.is_configuration());
    }
}
