//! Triangular Mel filterbank.
//!
//! `num_filters` filters spread evenly on the Mel scale between 0 Hz and
//! Nyquist, laid out on the bins of a `frame_length`-point transform. Built
//! once per configuration epoch.

/// Floor added before log compression so silence stays finite.
pub const LOG_FLOOR: f32 = 1e-10;

/// Mel filterbank for MFCC extraction.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    /// Bin edges, `num_filters + 2` entries, non-decreasing.
    edges: Vec<usize>,
    /// One weight vector of `frame_length` entries per filter.
    weights: Vec<Vec<f32>>,
    frame_length: usize,
}

impl MelFilterbank {
    /// Build the filterbank for the given filter count, sample rate and frame
    /// length.
    ///
    /// Filter `f` rises linearly from edge `f` to its peak of 1.0 at edge
    /// `f + 1` and falls back to zero at edge `f + 2`. A ramp spanning zero
    /// bins contributes nothing.
    ///
    /// # Example
    /// ```
    /// use cep_audio::filterbank::MelFilterbank;
    /// let fb = MelFilterbank::new(26, 16_000, 1022);
    /// assert_eq!(fb.num_filters(), 26);
    /// assert_eq!(fb.weights(0).len(), 1022);
    /// ```
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(num_filters: usize, sample_rate: u32, frame_length: usize) -> Self {
        let rate = sample_rate.max(1) as f32;
        let mel_low = hz_to_mel(0.0);
        let mel_high = hz_to_mel(rate / 2.0);
        let mel_step = (mel_high - mel_low) / (num_filters + 1) as f32;

        // Mel points -> Hz -> transform bin
        let edges: Vec<usize> = (0..num_filters + 2)
            .map(|i| {
                let hz = mel_to_hz(mel_low + i as f32 * mel_step);
                let bin = ((frame_length + 1) as f32 * hz / rate).floor().max(0.0);
                (bin as usize).min(frame_length)
            })
            .collect();

        let weights = edges
            .windows(3)
            .map(|w| {
                let (left, center, right) = (w[0], w[1], w[2]);
                let mut weights = vec![0.0f32; frame_length];
                for (k, v) in weights.iter_mut().enumerate().take(center).skip(left) {
                    *v = (k - left) as f32 / (center - left) as f32;
                }
                for (k, v) in weights.iter_mut().enumerate().take(right).skip(center) {
                    *v = (right - k) as f32 / (right - center) as f32;
                }
                weights
            })
            .collect();

        Self {
            edges,
            weights,
            frame_length,
        }
    }

    #[inline]
    #[must_use]
    pub fn num_filters(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    #[must_use]
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Weight vector of filter `f`.
    ///
    /// # Panics
    /// Panics if `f >= num_filters()`.
    #[inline]
    #[must_use]
    pub fn weights(&self, f: usize) -> &[f32] {
        &self.weights[f]
    }

    /// `(left, center, right)` bin edges of filter `f`. Weights are non-zero
    /// only inside `left..right`.
    ///
    /// # Panics
    /// Panics if `f >= num_filters()`.
    #[inline]
    #[must_use]
    pub fn span(&self, f: usize) -> (usize, usize, usize) {
        (self.edges[f], self.edges[f + 1], self.edges[f + 2])
    }

    /// Log-compressed filter energies of a power spectrum.
    ///
    /// Each output is `ln(sum(power[j] * weight[j]) + 1e-10)` over the first
    /// `frame_length / 2` bins. `out` must hold `num_filters()` values.
    pub fn log_energies(&self, power: &[f32], out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.num_filters());
        let limit = (self.frame_length / 2).min(power.len());

        for (f, slot) in out.iter_mut().enumerate() {
            let (left, _, right) = self.span(f);
            let end = right.min(limit);
            let energy: f32 = if left < end {
                power[left..end]
                    .iter()
                    .zip(&self.weights[f][left..end])
                    .map(|(p, w)| p * w)
                    .sum()
            } else {
                0.0
            };
            *slot = (energy + LOG_FLOOR).ln();
        }
    }
}

/// Hz to Mel scale conversion.
#[inline]
#[must_use]
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Mel to Hz conversion.
#[inline]
#[must_use]
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_conversion_round_trips() {
        for hz in [0.0f32, 300.0, 1000.0, 8000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 0.05, "{hz} -> {back}");
        }
        assert!((hz_to_mel(1000.0) - 1000.0).abs() < 1.0);
    }

    #[test]
    fn edges_are_non_decreasing() {
        let fb = MelFilterbank::new(26, 16_000, 1022);
        for f in 0..fb.num_filters() {
            let (l, c, r) = fb.span(f);
            assert!(l <= c && c <= r, "filter {f}: {l} {c} {r}");
            if f > 0 {
                assert!(fb.span(f - 1).1 <= c);
            }
        }
        assert_eq!(fb.span(0).0, 0);
        // floor(1023 * 8000 / 16000)
        assert_eq!(fb.span(25).2, 511);
    }

    #[test]
    fn weights_are_zero_outside_span_and_peak_at_center() {
        let fb = MelFilterbank::new(26, 16_000, 1022);
        for f in 0..fb.num_filters() {
            let (l, c, r) = fb.span(f);
            let w = fb.weights(f);
            for (k, &v) in w.iter().enumerate() {
                if k < l || k >= r {
                    assert_eq!(v, 0.0, "filter {f} bin {k}");
                } else {
                    assert!((0.0..=1.0).contains(&v));
                }
            }
            if r > c {
                assert_eq!(w[c], 1.0);
            }
        }
    }

    #[test]
    fn degenerate_spans_stay_finite() {
        // Far more filters than bins: many adjacent edges coincide.
        let fb = MelFilterbank::new(40, 8_000, 8);
        for f in 0..fb.num_filters() {
            assert!(fb.weights(f).iter().all(|v| v.is_finite()));
        }
        let power = vec![1.0f32; 5];
        let mut out = vec![0.0f32; 40];
        fb.log_energies(&power, &mut out);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn silence_hits_the_log_floor() {
        let fb = MelFilterbank::new(26, 16_000, 1022);
        let power = vec![0.0f32; 512];
        let mut out = vec![0.0f32; 26];
        fb.log_energies(&power, &mut out);
        for v in out {
            assert!((v - LOG_FLOOR.ln()).abs() < 1e-3);
        }
    }

    #[test]
    fn energy_concentrates_in_the_matching_filter() {
        let fb = MelFilterbank::new(26, 16_000, 1022);
        let (_, center, _) = fb.span(10);
        let mut power = vec![0.0f32; 512];
        power[center] = 1.0;
        let mut out = vec![0.0f32; 26];
        fb.log_energies(&power, &mut out);
        let loudest = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(loudest, Some(10));
        assert!(out[10].abs() < 1e-6);
    }
}
