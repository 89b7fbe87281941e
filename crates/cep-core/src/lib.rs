//! Shared types for the cepstrum analyser: configuration, errors, sample
//! formats, clock arithmetic and the per-interval event record.

pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod time;

pub use error::{CepstrumError, Result};
