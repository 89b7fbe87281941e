//! Streaming MFCC extraction for cepstrum.
//!
//! Audio arrives in chunks of any size; one coefficient vector per channel is
//! reported per fixed wall-clock interval.

pub mod analyzer;
pub mod cepstral;
pub mod channel;
pub mod filterbank;
pub mod normalizer;
pub mod scheduler;
pub mod spectrum;

pub use analyzer::{AudioChunk, CepstrumAnalyzer, Phase};
