//! Nanosecond clock arithmetic and segment time conversion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Nanoseconds per second.
pub const SECOND: u64 = 1_000_000_000;

/// Compute `value * num / denom` without intermediate overflow, rounding down.
///
/// Saturates at `u64::MAX`. A zero `denom` yields `u64::MAX`.
///
/// # Example
/// ```
/// use cep_core::time::{scale, SECOND};
/// assert_eq!(scale(SECOND / 10, 16_000, SECOND), 1600);
/// assert_eq!(scale(u64::MAX, 2, 4), u64::MAX / 2);
/// ```
#[inline]
#[must_use]
pub fn scale(value: u64, num: u64, denom: u64) -> u64 {
    if denom == 0 {
        return u64::MAX;
    }
    let wide = u128::from(value) * u128::from(num) / u128::from(denom);
    u64::try_from(wide).unwrap_or(u64::MAX)
}

/// Display adapter printing a nanosecond time as `h:mm:ss.nnnnnnnnn`.
///
/// # Example
/// ```
/// use cep_core::time::ClockTime;
/// assert_eq!(ClockTime(Some(1_500_000_000)).to_string(), "0:00:01.500000000");
/// assert_eq!(ClockTime(None).to_string(), "99:99:99.999999999");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime(pub Option<u64>);

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ns) => {
                let secs = ns / SECOND;
                write!(
                    f,
                    "{}:{:02}:{:02}.{:09}",
                    secs / 3600,
                    (secs / 60) % 60,
                    secs % 60,
                    ns % SECOND
                )
            }
            None => f.write_str("99:99:99.999999999"),
        }
    }
}

/// Playback segment used to derive running and stream time from a buffer
/// timestamp.
///
/// The default segment is the identity mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Timestamp at which the segment starts.
    pub start: u64,
    /// Stream time corresponding to `start`.
    pub time: u64,
    /// Running time accumulated by previous segments.
    pub base: u64,
}

impl Segment {
    /// Running time of `timestamp`, or `None` before the segment start.
    ///
    /// # Example
    /// ```
    /// use cep_core::time::Segment;
    /// let seg = Segment { start: 100, time: 0, base: 1_000 };
    /// assert_eq!(seg.to_running_time(150), Some(1_050));
    /// assert_eq!(seg.to_running_time(50), None);
    /// ```
    #[must_use]
    pub fn to_running_time(&self, timestamp: u64) -> Option<u64> {
        timestamp
            .checked_sub(self.start)
            .and_then(|offset| offset.checked_add(self.base))
    }

    /// Stream time of `timestamp`, or `None` before the segment start.
    #[must_use]
    pub fn to_stream_time(&self, timestamp: u64) -> Option<u64> {
        timestamp
            .checked_sub(self.start)
            .and_then(|offset| offset.checked_add(self.time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_handles_products_beyond_u64() {
        // 10 s at 92 kHz in nanoseconds overflows a u64 product.
        let interval = 10 * SECOND;
        assert_eq!(scale(interval, 92_000, SECOND), 920_000);
        assert_eq!(scale(u64::MAX, u64::MAX, u64::MAX), u64::MAX);
    }

    #[test]
    fn scale_rounds_down() {
        // 1 ms at 44.1 kHz is 44.1 frames
        assert_eq!(scale(SECOND / 1000, 44_100, SECOND), 44);
        assert_eq!(scale(7, 1, 2), 3);
        assert_eq!(scale(1, 1, 0), u64::MAX);
    }

    #[test]
    fn identity_segment_passes_timestamps_through() {
        let seg = Segment::default();
        assert_eq!(seg.to_running_time(42), Some(42));
        assert_eq!(seg.to_stream_time(42), Some(42));
    }

    #[test]
    fn stream_time_offsets_by_segment_time() {
        let seg = Segment {
            start: SECOND,
            time: 5 * SECOND,
            base: 0,
        };
        assert_eq!(seg.to_stream_time(2 * SECOND), Some(6 * SECOND));
        assert_eq!(seg.to_running_time(2 * SECOND), Some(SECOND));
        assert_eq!(seg.to_stream_time(0), None);
    }

    #[test]
    fn clock_time_formats_hours() {
        let t = ClockTime(Some(3_723 * SECOND + 7));
        assert_eq!(t.to_string(), "1:02:03.000000007");
    }
}
