use std::thread::JoinHandle;

use cep_audio::{AudioChunk, CepstrumAnalyzer};
use cep_core::config::CepstrumConfig;
use cep_core::event::CepstrumEvent;
use cep_core::format::{AudioFormat, AudioInfo, ByteOrder, SampleEncoding};
use cep_core::time::{SECOND, scale};

use crate::cli::Cli;

/// Build the analyser configuration from an optional file plus CLI overrides.
///
/// # Errors
/// Returns an error if the file cannot be loaded or the result is invalid.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<CepstrumConfig> {
    let mut config = match &cli.config {
        Some(path) => CepstrumConfig::load(path)?,
        None => CepstrumConfig::default(),
    };
    if cli.multi_channel {
        config.multi_channel = true;
    }
    if let Some(n) = cli.num_coeffs {
        config.num_coeffs = n;
    }
    if let Some(ms) = cli.interval_ms {
        config.interval_ns = ms.saturating_mul(1_000_000);
    }
    config.validate()?;
    Ok(config)
}

/// Start the analysis thread.
///
/// The thread synthesises `cli.seconds` of a sine tone, pushes it through the
/// analyser in `cli.chunk_frames` chunks and returns the number of frames
/// processed. Events arrive on the returned receiver; it disconnects when the
/// thread finishes.
///
/// # Errors
/// Returns an error if the format tag is unsupported or the analyser rejects
/// the configuration.
pub fn start_analysis(
    cli: &Cli,
    config: CepstrumConfig,
) -> anyhow::Result<(
    JoinHandle<anyhow::Result<u64>>,
    flume::Receiver<CepstrumEvent>,
)> {
    let format: AudioFormat = cli.format.parse()?;
    let info = AudioInfo::new(format, cli.channels, cli.rate);
    if cli.chunk_frames == 0 {
        anyhow::bail!("chunk size must be at least one frame");
    }

    let (tx, rx) = flume::unbounded();
    let analyzer = CepstrumAnalyzer::new(config)?.with_bus(tx);
    analyzer.setup(info)?;

    let tone = Tone {
        freq: cli.freq,
        volume: cli.volume.clamp(0.0, 1.0),
        rate: cli.rate,
    };
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let total_frames = (cli.seconds.max(0.0) * cli.rate as f32) as u64;
    let chunk_frames = cli.chunk_frames as u64;

    log::info!(
        "Starting analysis: {format} x{} @ {} Hz, {:.0} Hz tone, {total_frames} frames",
        cli.channels,
        cli.rate,
        cli.freq
    );

    let handle = std::thread::Builder::new()
        .name("cepstrum-analysis".into())
        .spawn(move || -> anyhow::Result<u64> {
            let mut offset = 0u64;
            let mut bytes = Vec::new();
            while offset < total_frames {
                let frames = chunk_frames.min(total_frames - offset);
                tone.encode(&info, offset, frames, &mut bytes);
                let pts = scale(offset, SECOND, u64::from(info.rate));
                analyzer.process(&AudioChunk::new(&bytes, Some(pts)))?;
                offset += frames;
            }
            Ok(offset)
        })?;

    Ok((handle, rx))
}

/// Sine test source, identical on every channel.
#[derive(Debug, Clone, Copy)]
struct Tone {
    freq: f32,
    volume: f32,
    rate: u32,
}

impl Tone {
    #[allow(clippy::cast_precision_loss)]
    fn sample(&self, frame: u64) -> f64 {
        let t = frame as f64 / f64::from(self.rate);
        f64::from(self.volume) * (2.0 * std::f64::consts::PI * f64::from(self.freq) * t).sin()
    }

    /// Encode `frames` frames starting at `offset` into `out`, replacing its
    /// contents.
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&self, info: &AudioInfo, offset: u64, frames: u64, out: &mut Vec<u8>) {
        out.clear();
        let be = info.format.order == ByteOrder::Big;
        for frame in offset..offset + frames {
            let v = self.sample(frame);
            for _ in 0..info.channels {
                match info.format.encoding {
                    SampleEncoding::S16 => {
                        let s = (v * f64::from(i16::MAX)).round() as i16;
                        out.extend(if be { s.to_be_bytes() } else { s.to_le_bytes() });
                    }
                    SampleEncoding::S24 => {
                        let s = (v * 8_388_607.0).round() as i32;
                        let b = s.to_le_bytes();
                        if be {
                            out.extend([b[2], b[1], b[0]]);
                        } else {
                            out.extend([b[0], b[1], b[2]]);
                        }
                    }
                    SampleEncoding::S32 => {
                        let s = (v * f64::from(i32::MAX)).round() as i32;
                        out.extend(if be { s.to_be_bytes() } else { s.to_le_bytes() });
                    }
                    SampleEncoding::F32 => {
                        let s = v as f32;
                        out.extend(if be { s.to_be_bytes() } else { s.to_le_bytes() });
                    }
                    SampleEncoding::F64 => {
                        out.extend(if be { v.to_be_bytes() } else { v.to_le_bytes() });
                    }
                }
            }
        }
    }
}
