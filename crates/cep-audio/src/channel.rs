//! Per-channel ring buffer, transform scratch and accumulators.
//!
//! Every buffer is sized once per configuration epoch. Nothing allocates
//! while audio is flowing.

use realfft::num_complex::Complex32;

use crate::spectrum::SpectralTransform;

/// Buffers owned by one analysed stream.
#[derive(Debug, Clone)]
pub struct ChannelState {
    /// Circular sample history, `frame_length` long. The write cursor is
    /// shared by all channels and lives in the scheduler.
    pub(crate) samples: Vec<f32>,
    /// Transform input, `frame_length` long.
    pub(crate) frame: Vec<f32>,
    pub(crate) spectrum: Vec<Complex32>,
    pub(crate) fft_scratch: Vec<Complex32>,
    /// Power spectrum summed over the transforms of the current interval.
    pub(crate) magnitude: Vec<f32>,
    /// Log filterbank energies, `num_filters` long.
    pub(crate) energies: Vec<f32>,
    /// Cepstral coefficients, `num_coeffs` long.
    pub(crate) coeffs: Vec<f32>,
}

impl ChannelState {
    #[must_use]
    pub fn new(transform: &SpectralTransform, num_filters: usize, num_coeffs: usize) -> Self {
        let frame_length = transform.frame_length();
        Self {
            samples: vec![0.0; frame_length],
            frame: vec![0.0; frame_length],
            spectrum: transform.make_output_vec(),
            fft_scratch: transform.make_scratch_vec(),
            magnitude: vec![0.0; transform.bins()],
            energies: vec![0.0; num_filters],
            coeffs: vec![0.0; num_coeffs],
        }
    }

    #[inline]
    #[must_use]
    pub fn frame_length(&self) -> usize {
        self.samples.len()
    }

    /// Ring buffer contents in storage order.
    #[inline]
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Accumulated power spectrum of the current interval.
    #[inline]
    #[must_use]
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    /// Latest cepstral coefficients.
    #[inline]
    #[must_use]
    pub fn coeffs(&self) -> &[f32] {
        &self.coeffs
    }

    /// Copy the `window_size` most recent samples, oldest first, into the
    /// transform input and zero the rest of it.
    ///
    /// `cursor` is the next write position, so the window ends just before it.
    pub fn load_window(&mut self, cursor: usize, window_size: usize) {
        let len = self.samples.len();
        debug_assert!(window_size <= len && cursor < len);

        let start = (cursor + len - window_size) % len;
        let first = (len - start).min(window_size);
        self.frame[..first].copy_from_slice(&self.samples[start..start + first]);
        self.frame[first..window_size].copy_from_slice(&self.samples[..window_size - first]);
        self.frame[window_size..].fill(0.0);
    }

    /// Turn the summed power spectrum into the mean over `transforms` runs.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_magnitude(&mut self, transforms: u64) {
        if transforms > 1 {
            let n = transforms as f32;
            for m in &mut self.magnitude {
                *m /= n;
            }
        }
    }

    /// Zero the interval accumulators. The sample history is kept.
    pub fn clear_accumulators(&mut self) {
        self.magnitude.fill(0.0);
        self.coeffs.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(frame_length: usize) -> ChannelState {
        ChannelState::new(&SpectralTransform::new(frame_length), 4, 2)
    }

    #[test]
    fn buffers_match_epoch_sizes() {
        let ch = state(1022);
        assert_eq!(ch.frame_length(), 1022);
        assert_eq!(ch.magnitude().len(), 512);
        assert_eq!(ch.energies.len(), 4);
        assert_eq!(ch.coeffs().len(), 2);
    }

    #[test]
    fn full_window_starts_at_cursor() {
        let mut ch = state(6);
        ch.samples_mut().copy_from_slice(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        ch.load_window(2, 6);
        assert_eq!(ch.frame, vec![2.0, 3.0, 4.0, 5.0, 0.0, 1.0]);
    }

    #[test]
    fn partial_window_ends_before_cursor_and_zero_pads() {
        let mut ch = state(6);
        ch.samples_mut().copy_from_slice(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        ch.frame.fill(9.0);
        ch.load_window(1, 3);
        assert_eq!(ch.frame, vec![4.0, 5.0, 0.0, 0.0, 0.0, 0.0]);
        ch.load_window(0, 4);
        assert_eq!(ch.frame, vec![2.0, 3.0, 4.0, 5.0, 0.0, 0.0]);
    }

    #[test]
    fn averaging_divides_by_transform_count() {
        let mut ch = state(6);
        ch.magnitude.fill(3.0);
        ch.average_magnitude(3);
        assert!(ch.magnitude().iter().all(|&m| (m - 1.0).abs() < 1e-6));
        ch.clear_accumulators();
        assert!(ch.magnitude().iter().all(|&m| m == 0.0));
    }
}
