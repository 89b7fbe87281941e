use std::path::PathBuf;

use clap::Parser;

/// Run the cepstrum analyser over a synthetic test tone and log every
/// interval it reports.
#[derive(Parser, Debug, Clone)]
#[command(name = "cepstrum", version, about)]
pub struct Cli {
    /// TOML analyser configuration. Flags below override it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Test tone frequency in Hz.
    #[arg(long, default_value_t = 300.0)]
    pub freq: f32,

    /// Test tone amplitude, 0.0 to 1.0.
    #[arg(long, default_value_t = 0.8)]
    pub volume: f32,

    /// Stream sample rate in Hz.
    #[arg(long, default_value_t = 16_000)]
    pub rate: u32,

    /// Interleaved channel count.
    #[arg(long, default_value_t = 1)]
    pub channels: usize,

    /// Sample format tag (S16LE, S24BE, F32LE, ...).
    #[arg(long, default_value = "F32LE")]
    pub format: String,

    /// Seconds of audio to generate.
    #[arg(long, default_value_t = 1.0)]
    pub seconds: f32,

    /// Frames per pushed chunk.
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,

    /// Report separate coefficients per channel.
    #[arg(long)]
    pub multi_channel: bool,

    /// Override the number of coefficients.
    #[arg(long)]
    pub num_coeffs: Option<usize>,

    /// Override the reporting interval in milliseconds.
    #[arg(long)]
    pub interval_ms: Option<u64>,
}
