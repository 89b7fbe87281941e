//! Frame -> cepstral coefficients.
//!
//! Fixed order: window copy, pre-emphasis, Hamming window, power spectrum
//! accumulation, log Mel energies, DCT-II truncated to `num_coeffs`.
//! Window and DCT tables are built once per epoch.

use cep_core::Result;
use cep_core::config::CepstrumConfig;

use crate::channel::ChannelState;
use crate::filterbank::MelFilterbank;
use crate::spectrum::SpectralTransform;

/// Everything needed to turn a channel's ring buffer into coefficients.
#[derive(Debug, Clone)]
pub struct CepstralProjector {
    window_size: usize,
    num_coeffs: usize,
    window: Vec<f32>,
    /// Row `k` holds `cos(pi * k * (n + 0.5) / num_filters)` for every `n`.
    dct: Vec<f32>,
    filterbank: MelFilterbank,
    transform: SpectralTransform,
}

impl CepstralProjector {
    /// Build the tables, filterbank and FFT plan for a validated config.
    ///
    /// # Example
    /// ```
    /// use cep_audio::cepstral::CepstralProjector;
    /// use cep_core::config::CepstrumConfig;
    ///
    /// let projector = CepstralProjector::new(&CepstrumConfig::default());
    /// let mut channel = projector.new_channel();
    /// projector.project(&mut channel, 0, Some(0.97)).unwrap();
    /// assert_eq!(channel.coeffs().len(), 13);
    /// assert!(channel.coeffs().iter().all(|c| c.is_finite()));
    /// ```
    #[must_use]
    pub fn new(config: &CepstrumConfig) -> Self {
        let frame_length = config.frame_length();
        let num_filters = config.num_filters();
        Self {
            window_size: config.window_size,
            num_coeffs: config.num_coeffs,
            window: hamming(config.window_size),
            dct: dct_table(config.num_coeffs, num_filters),
            filterbank: MelFilterbank::new(num_filters, config.sample_rate, frame_length),
            transform: SpectralTransform::new(frame_length),
        }
    }

    #[inline]
    #[must_use]
    pub fn filterbank(&self) -> &MelFilterbank {
        &self.filterbank
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &SpectralTransform {
        &self.transform
    }

    /// Fresh zeroed buffers for one channel of this epoch.
    #[must_use]
    pub fn new_channel(&self) -> ChannelState {
        ChannelState::new(
            &self.transform,
            self.filterbank.num_filters(),
            self.num_coeffs,
        )
    }

    /// Run one transform on the window ending at `cursor`, add its power
    /// spectrum to the channel accumulator and refresh the coefficients.
    ///
    /// `preemphasis` is the filter coefficient, or `None` to skip the filter.
    ///
    /// # Errors
    /// Returns an error if the channel buffers do not match this epoch.
    pub fn project(
        &self,
        channel: &mut ChannelState,
        cursor: usize,
        preemphasis: Option<f32>,
    ) -> Result<()> {
        channel.load_window(cursor, self.window_size);

        let frame = &mut channel.frame[..self.window_size];
        if let Some(alpha) = preemphasis {
            pre_emphasis(frame, alpha);
        }
        for (x, w) in frame.iter_mut().zip(&self.window) {
            *x *= w;
        }

        self.transform.accumulate_power(
            &mut channel.frame,
            &mut channel.spectrum,
            &mut channel.fft_scratch,
            &mut channel.magnitude,
        )?;

        self.cepstrum(channel);
        Ok(())
    }

    /// Recompute the channel's coefficients from its current power spectrum.
    pub fn cepstrum(&self, channel: &mut ChannelState) {
        self.filterbank
            .log_energies(&channel.magnitude, &mut channel.energies);
        dct(&channel.energies, &self.dct, &mut channel.coeffs);
    }
}

/// First-order high-pass `x[i] -= alpha * x[i - 1]`, applied from the end so
/// every tap reads the unfiltered previous sample. `x[0]` is unchanged.
///
/// # Example
/// ```
/// use cep_audio::cepstral::pre_emphasis;
/// let mut x = [1.0f32, 1.0, 2.0];
/// pre_emphasis(&mut x, 0.5);
/// assert_eq!(x, [1.0, 0.5, 1.5]);
/// ```
pub fn pre_emphasis(data: &mut [f32], alpha: f32) {
    for i in (1..data.len()).rev() {
        data[i] -= alpha * data[i - 1];
    }
}

/// Hamming window `0.54 - 0.46 cos(2 pi i / (size - 1))`. A single-sample
/// window is `[1.0]`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn hamming(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| (0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / denom).cos()) as f32)
        .collect()
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn dct_table(num_coeffs: usize, size: usize) -> Vec<f32> {
    let mut table = Vec::with_capacity(num_coeffs * size);
    for k in 0..num_coeffs {
        for n in 0..size {
            let arg = std::f64::consts::PI * k as f64 * (n as f64 + 0.5) / size as f64;
            table.push(arg.cos() as f32);
        }
    }
    table
}

/// DCT-II `out[k] = sum(input[n] * cos(pi k (n + 0.5) / N))`, keeping only
/// `out.len()` outputs.
fn dct(input: &[f32], table: &[f32], out: &mut [f32]) {
    let size = input.len();
    for (coeff, row) in out.iter_mut().zip(table.chunks_exact(size)) {
        *coeff = input.iter().zip(row).map(|(x, c)| x * c).sum();
    }
}
