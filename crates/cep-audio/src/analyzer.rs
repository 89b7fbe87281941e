//! Thread-safe streaming MFCC analyser.
//!
//! All configuration and per-channel state sits behind one mutex. The audio
//! path and out-of-band reconfiguration may run on different threads, but
//! never observe a half-updated epoch.

use std::sync::{Mutex, MutexGuard, PoisonError};

use cep_core::config::CepstrumConfig;
use cep_core::event::{CepstrumEvent, Coefficients};
use cep_core::format::AudioInfo;
use cep_core::time::{ClockTime, Segment};
use cep_core::{CepstrumError, Result};
use rayon::prelude::*;

use crate::cepstral::CepstralProjector;
use crate::channel::ChannelState;
use crate::normalizer::{ChannelMode, SampleReader};
use crate::scheduler::{IntervalScheduler, IntervalSummary};

/// One block of interleaved input.
#[derive(Debug, Clone, Copy)]
pub struct AudioChunk<'a> {
    pub data: &'a [u8],
    /// Presentation timestamp of the first frame, in nanoseconds.
    pub pts: Option<u64>,
    /// Set when the chunk does not follow the previous one seamlessly.
    pub discont: bool,
}

impl<'a> AudioChunk<'a> {
    #[must_use]
    pub fn new(data: &'a [u8], pts: Option<u64>) -> Self {
        Self {
            data,
            pts,
            discont: false,
        }
    }

    #[must_use]
    pub fn with_discont(mut self, discont: bool) -> Self {
        self.discont = discont;
        self
    }
}

/// Whether buffers are currently allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No buffers; they are built on the next chunk.
    Unconfigured,
    /// Buffers allocated and consuming input.
    Accumulating,
}

/// Everything allocated for one configuration epoch.
struct Epoch {
    reader: SampleReader,
    projector: CepstralProjector,
    channels: Vec<ChannelState>,
    scheduler: IntervalScheduler,
}

impl Epoch {
    fn build(config: &CepstrumConfig, info: &AudioInfo) -> Self {
        let mode = if config.multi_channel {
            ChannelMode::PerChannel
        } else {
            ChannelMode::Downmix
        };
        let reader = SampleReader::new(info, mode);
        let projector = CepstralProjector::new(config);
        let channels = (0..reader.output_streams())
            .map(|_| projector.new_channel())
            .collect::<Vec<_>>();

        log::debug!(
            "allocating data for {} channels, transform size {}",
            channels.len(),
            config.transform_size
        );

        Self {
            reader,
            projector,
            channels,
            scheduler: IntervalScheduler::new(config.frame_length(), config.interval_ns, info.rate),
        }
    }

    fn project_all(&mut self, preemphasis: Option<f32>) -> Result<()> {
        let cursor = self.scheduler.cursor();
        let projector = &self.projector;
        if self.channels.len() > 1 {
            self.channels
                .par_iter_mut()
                .try_for_each(|ch| projector.project(ch, cursor, preemphasis))
        } else {
            self.channels
                .iter_mut()
                .try_for_each(|ch| projector.project(ch, cursor, preemphasis))
        }
    }

    /// Average the interval's spectra and derive the reported coefficients.
    fn finalize(&mut self, summary: &IntervalSummary) -> Result<Vec<Vec<f32>>> {
        if summary.transforms == 0 {
            return Err(CepstrumError::InvariantViolation(format!(
                "interval of {} frames closed without a transform",
                summary.frames
            )));
        }
        let projector = &self.projector;
        Ok(self
            .channels
            .iter_mut()
            .map(|ch| {
                ch.average_magnitude(summary.transforms);
                projector.cepstrum(ch);
                ch.coeffs().to_vec()
            })
            .collect())
    }

    fn clear_accumulators(&mut self) {
        for ch in &mut self.channels {
            ch.clear_accumulators();
        }
    }
}

struct State {
    config: CepstrumConfig,
    info: Option<AudioInfo>,
    segment: Segment,
    epoch: Option<Epoch>,
}

impl State {
    fn reset(&mut self) {
        if let Some(epoch) = self.epoch.take() {
            log::debug!("freeing data for {} channels", epoch.channels.len());
        }
    }

    fn run(&mut self, chunk: &AudioChunk<'_>, info: &AudioInfo) -> Result<Vec<CepstrumEvent>> {
        let config = &self.config;
        let segment = self.segment;
        let epoch = self
            .epoch
            .get_or_insert_with(|| Epoch::build(config, info));

        if chunk.discont {
            log::debug!("Discontinuity detected -- flushing");
            epoch.scheduler.flush();
            epoch.clear_accumulators();
        }
        epoch.scheduler.begin_chunk(chunk.pts);

        let bpf = epoch.reader.bytes_per_frame();
        let preemphasis = config.use_preemphasis.then_some(config.preemphasis_coeff);
        let mut data = chunk.data;
        let mut events = Vec::new();

        while data.len() >= bpf {
            let block = epoch.scheduler.next_block(data.len() / bpf);
            let cursor = epoch.scheduler.cursor();
            for (stream, ch) in epoch.channels.iter_mut().enumerate() {
                epoch
                    .reader
                    .read(data, stream, block, ch.samples_mut(), cursor);
            }
            data = &data[block * bpf..];
            epoch.scheduler.advance(block);

            log::trace!(
                "remaining: {} bytes, do-transform = {}, do-report = {}",
                data.len(),
                epoch.scheduler.transform_due(),
                epoch.scheduler.interval_complete()
            );

            if epoch.scheduler.transform_due() {
                epoch.project_all(preemphasis)?;
                epoch.scheduler.record_transform();
            }

            if epoch.scheduler.interval_complete() {
                let summary = epoch.scheduler.finish_interval();
                if config.post_results {
                    let coeffs = epoch.finalize(&summary)?;
                    events.push(build_event(config, &segment, &summary, coeffs));
                }
                epoch.clear_accumulators();
            }
        }

        if !data.is_empty() {
            return Err(CepstrumError::InvariantViolation(format!(
                "{} bytes left unconsumed",
                data.len()
            )));
        }
        Ok(events)
    }
}

fn build_event(
    config: &CepstrumConfig,
    segment: &Segment,
    summary: &IntervalSummary,
    mut coeffs: Vec<Vec<f32>>,
) -> CepstrumEvent {
    let timestamp = summary.timestamp;
    let stream_time = timestamp.and_then(|t| segment.to_stream_time(t));
    let running_time = timestamp.and_then(|t| segment.to_running_time(t));
    let end_time = stream_time.map(|t| t.saturating_add(config.interval_ns));

    log::debug!(
        "preparing event, coeffs = {} channels = {} endtime {}",
        config.num_coeffs,
        coeffs.len(),
        ClockTime(end_time)
    );

    let coefficients = if config.multi_channel {
        Coefficients::PerChannel(coeffs)
    } else {
        Coefficients::Mono(coeffs.pop().unwrap_or_default())
    };

    CepstrumEvent {
        timestamp,
        stream_time,
        running_time,
        duration: config.interval_ns,
        end_time,
        frames: summary.frames,
        transforms: summary.transforms,
        coefficients,
    }
}

/// Streaming MFCC analyser.
///
/// # Example
/// ```
/// use cep_audio::analyzer::{AudioChunk, CepstrumAnalyzer};
/// use cep_core::config::CepstrumConfig;
/// use cep_core::format::{AudioFormat, AudioInfo};
///
/// let analyzer = CepstrumAnalyzer::new(CepstrumConfig::default()).unwrap();
/// analyzer.setup(AudioInfo::new(AudioFormat::F32LE, 1, 16_000)).unwrap();
///
/// // 100 ms of silence at 16 kHz completes exactly one interval.
/// let bytes = vec![0u8; 1600 * 4];
/// let events = analyzer.process(&AudioChunk::new(&bytes, Some(0))).unwrap();
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].end_time, Some(100_000_000));
/// ```
pub struct CepstrumAnalyzer {
    state: Mutex<State>,
    bus: Option<flume::Sender<CepstrumEvent>>,
}

impl CepstrumAnalyzer {
    /// Create an analyser with a validated configuration. No buffers are
    /// allocated until the first chunk after [`setup`](Self::setup).
    ///
    /// # Errors
    /// Returns an error if the configuration is out of range.
    pub fn new(config: CepstrumConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(State {
                config,
                info: None,
                segment: Segment::default(),
                epoch: None,
            }),
            bus: None,
        })
    }

    /// Forward every posted event to `bus` as well as returning it.
    #[must_use]
    pub fn with_bus(mut self, bus: flume::Sender<CepstrumEvent>) -> Self {
        self.bus = Some(bus);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn config(&self) -> CepstrumConfig {
        self.lock().config.clone()
    }

    /// Replace the configuration. Structural changes tear the buffers down;
    /// they are rebuilt on the next chunk.
    ///
    /// # Errors
    /// Returns an error, leaving the current configuration untouched, if the
    /// new one is out of range.
    pub fn set_config(&self, config: CepstrumConfig) -> Result<()> {
        self.update_config(|cfg| *cfg = config)
    }

    /// Edit the configuration in place under the lock.
    ///
    /// # Errors
    /// Returns an error, leaving the current configuration untouched, if the
    /// edited one is out of range.
    pub fn update_config(&self, edit: impl FnOnce(&mut CepstrumConfig)) -> Result<()> {
        let mut state = self.lock();
        let mut next = state.config.clone();
        edit(&mut next);
        next.validate()?;
        if state.config.requires_rebuild(&next) {
            state.reset();
        }
        state.config = next;
        Ok(())
    }

    /// Negotiate the input stream format. Resets all state.
    ///
    /// # Errors
    /// Returns an error for a zero channel count or rate.
    pub fn setup(&self, info: AudioInfo) -> Result<()> {
        info.validate()?;
        let mut state = self.lock();
        log::debug!(
            "setup: {} x{} @ {} Hz",
            info.format,
            info.channels,
            info.rate
        );
        state.info = Some(info);
        state.reset();
        Ok(())
    }

    #[must_use]
    pub fn info(&self) -> Option<AudioInfo> {
        self.lock().info
    }

    /// Set the segment used to derive running and stream time.
    pub fn set_segment(&self, segment: Segment) {
        self.lock().segment = segment;
    }

    /// Drop all buffers and counters, as on element start or stop.
    pub fn reset(&self) {
        log::debug!("resetting state");
        self.lock().reset();
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.lock().epoch.is_some() {
            Phase::Accumulating
        } else {
            Phase::Unconfigured
        }
    }

    /// Copy of the current schedule, if buffers are allocated.
    #[must_use]
    pub fn scheduler(&self) -> Option<IntervalScheduler> {
        self.lock().epoch.as_ref().map(|e| e.scheduler.clone())
    }

    /// Copy of one channel's ring buffer, if allocated.
    #[must_use]
    pub fn channel_samples(&self, channel: usize) -> Option<Vec<f32>> {
        self.lock()
            .epoch
            .as_ref()
            .and_then(|e| e.channels.get(channel))
            .map(|ch| ch.samples().to_vec())
    }

    /// Consume one chunk in full, returning the events of every interval it
    /// completed. Events are only produced when `post_results` is set.
    ///
    /// # Errors
    /// Fails without touching any state if no format was negotiated or the
    /// chunk is not frame aligned. Fails with
    /// [`CepstrumError::InvariantViolation`] if scheduling goes wrong; no
    /// event from that chunk is delivered then.
    pub fn process(&self, chunk: &AudioChunk<'_>) -> Result<Vec<CepstrumEvent>> {
        let mut state = self.lock();
        let info = state.info.ok_or(CepstrumError::NotNegotiated)?;
        let frame_bytes = info.bytes_per_frame();
        if chunk.data.len() % frame_bytes != 0 {
            return Err(CepstrumError::MisalignedChunk {
                len: chunk.data.len(),
                frame_bytes,
            });
        }
        log::trace!("input size: {} bytes", chunk.data.len());

        let events = state.run(chunk, &info)?;
        drop(state);

        if let Some(bus) = &self.bus {
            for event in &events {
                if bus.send(event.clone()).is_err() {
                    log::warn!("event bus disconnected, dropping {} event", CepstrumEvent::NAME);
                    break;
                }
            }
        }
        Ok(events)
    }
}
