//! Real-input FFT and power spectrum accumulation.

use std::fmt;
use std::sync::Arc;

use cep_core::{CepstrumError, Result};
use realfft::num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};

/// Forward real FFT plan over one analysis frame.
///
/// The plan is immutable and shared by every channel; each channel brings its
/// own output and scratch buffers.
#[derive(Clone)]
pub struct SpectralTransform {
    fft: Arc<dyn RealToComplex<f32>>,
    frame_length: usize,
}

impl SpectralTransform {
    /// Plan a forward transform of `frame_length` real samples.
    ///
    /// # Example
    /// ```
    /// use cep_audio::spectrum::SpectralTransform;
    /// let t = SpectralTransform::new(1022);
    /// assert_eq!(t.bins(), 512);
    /// ```
    #[must_use]
    pub fn new(frame_length: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(frame_length),
            frame_length,
        }
    }

    #[inline]
    #[must_use]
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Number of half-spectrum bins, `frame_length / 2 + 1`.
    #[inline]
    #[must_use]
    pub fn bins(&self) -> usize {
        self.frame_length / 2 + 1
    }

    #[must_use]
    pub fn make_output_vec(&self) -> Vec<Complex32> {
        self.fft.make_output_vec()
    }

    #[must_use]
    pub fn make_scratch_vec(&self) -> Vec<Complex32> {
        self.fft.make_scratch_vec()
    }

    /// Transform `input` and add its power spectrum into `power`.
    ///
    /// Each bin adds `(re² + im²) / frame_length²`. `input` is used as
    /// scratch and left in an unspecified state.
    ///
    /// # Errors
    /// Returns [`CepstrumError::InvariantViolation`] if a buffer length does
    /// not match the plan.
    pub fn accumulate_power(
        &self,
        input: &mut [f32],
        spectrum: &mut [Complex32],
        scratch: &mut [Complex32],
        power: &mut [f32],
    ) -> Result<()> {
        self.fft
            .process_with_scratch(input, spectrum, scratch)
            .map_err(|e| CepstrumError::InvariantViolation(format!("real FFT: {e}")))?;

        #[allow(clippy::cast_precision_loss)]
        let norm = (self.frame_length as f64).powi(2);
        for (acc, bin) in power.iter_mut().zip(spectrum.iter()) {
            #[allow(clippy::cast_possible_truncation)]
            let p = (f64::from(bin.norm_sqr()) / norm) as f32;
            *acc += p;
        }
        Ok(())
    }
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("frame_length", &self.frame_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(t: &SpectralTransform, mut input: Vec<f32>, power: &mut [f32]) {
        let mut out = t.make_output_vec();
        let mut scratch = t.make_scratch_vec();
        t.accumulate_power(&mut input, &mut out, &mut scratch, power)
            .unwrap();
    }

    #[test]
    fn dc_lands_in_bin_zero() {
        let t = SpectralTransform::new(64);
        let mut power = vec![0.0f32; t.bins()];
        run(&t, vec![1.0; 64], &mut power);
        assert!((power[0] - 1.0).abs() < 1e-5);
        assert!(power[1..].iter().all(|p| p.abs() < 1e-8));
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn sine_peaks_at_its_bin() {
        let n = 128;
        let k = 10;
        let t = SpectralTransform::new(n);
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * k as f32 * i as f32 / n as f32).sin())
            .collect();
        let mut power = vec![0.0f32; t.bins()];
        run(&t, input, &mut power);
        assert!((power[k] - 0.25).abs() < 1e-4);
        let others: f32 = power.iter().enumerate().filter(|(i, _)| *i != k).map(|(_, p)| p).sum();
        assert!(others < 1e-6);
    }

    #[test]
    fn power_accumulates_across_calls() {
        let t = SpectralTransform::new(16);
        let mut power = vec![0.0f32; t.bins()];
        run(&t, vec![0.5; 16], &mut power);
        run(&t, vec![0.5; 16], &mut power);
        assert!((power[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn wrong_buffer_length_is_an_invariant_violation() {
        let t = SpectralTransform::new(16);
        let mut input = vec![0.0f32; 15];
        let mut out = t.make_output_vec();
        let mut scratch = t.make_scratch_vec();
        let mut power = vec![0.0f32; t.bins()];
        let err = t
            .accumulate_power(&mut input, &mut out, &mut scratch, &mut power)
            .unwrap_err();
        assert!(matches!(err, CepstrumError::InvariantViolation(_)));
    }
}
