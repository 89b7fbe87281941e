mod cli;
mod pipeline;

use cep_core::event::CepstrumEvent;
use cep_core::time::ClockTime;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();
    let config = pipeline::resolve_config(&cli)?;
    let (handle, events) = pipeline::start_analysis(&cli, config)?;

    let mut count = 0usize;
    for event in &events {
        log_event(&event);
        count += 1;
    }

    let frames = match handle.join() {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("analysis thread panicked"),
    };
    log::info!("Processed {frames} frames, {count} {} events", CepstrumEvent::NAME);
    Ok(())
}

fn log_event(event: &CepstrumEvent) {
    log::info!(
        "New {} message, endtime {}",
        CepstrumEvent::NAME,
        ClockTime(event.end_time)
    );
    for (channel, coeffs) in event.coefficients.channels().enumerate() {
        for (band, value) in coeffs.iter().enumerate() {
            log::info!("channel {channel} band {band} mfcc {value}");
        }
    }
}
