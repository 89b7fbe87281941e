//! Interval scheduling: which frames feed which transform and report.
//!
//! Input is consumed in sub-blocks that never cross a ring refill or an
//! interval boundary, so transforms fire at the same sample positions however
//! the input is fragmented. Intervals whose length is not a whole number of
//! frames carry the remainder forward in nanosecond-frames and periodically
//! roll one extra frame into the target.

use cep_core::time::{ClockTime, SECOND, scale};

/// Summary of a completed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSummary {
    /// Timestamp of the interval's first frame.
    pub timestamp: Option<u64>,
    pub frames: u64,
    pub transforms: u64,
}

/// Frame counters and timing for one configuration epoch.
#[derive(Debug, Clone)]
pub struct IntervalScheduler {
    frame_length: usize,
    rate: u32,
    frames_per_interval: u64,
    /// `(interval * rate) mod 1e9`, the per-interval rounding loss.
    error_per_interval: u64,
    accumulated_error: u64,
    frames_seen: u64,
    frames_target: u64,
    transform_count: u64,
    /// Next ring write position, shared by every channel.
    cursor: usize,
    timestamp: Option<u64>,
}

impl IntervalScheduler {
    /// Start a schedule for frames arriving at `rate` and reported every
    /// `interval_ns`.
    ///
    /// # Example
    /// ```
    /// use cep_audio::scheduler::IntervalScheduler;
    /// let s = IntervalScheduler::new(1022, 100_000_000, 16_000);
    /// assert_eq!(s.frames_per_interval(), 1600);
    /// assert_eq!(s.error_per_interval(), 0);
    /// ```
    #[must_use]
    pub fn new(frame_length: usize, interval_ns: u64, rate: u32) -> Self {
        let frames_per_interval = scale(interval_ns, u64::from(rate), SECOND).max(1);
        let error = (u128::from(interval_ns) * u128::from(rate)) % u128::from(SECOND);
        let error_per_interval = u64::try_from(error).unwrap_or(0);

        log::info!(
            "interval {}, fpi {frames_per_interval}, error {}",
            ClockTime(Some(interval_ns)),
            ClockTime(Some(error_per_interval))
        );

        Self {
            frame_length: frame_length.max(1),
            rate,
            frames_per_interval,
            error_per_interval,
            accumulated_error: 0,
            frames_seen: 0,
            frames_target: frames_per_interval,
            transform_count: 0,
            cursor: 0,
            timestamp: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn frames_per_interval(&self) -> u64 {
        self.frames_per_interval
    }

    #[inline]
    #[must_use]
    pub fn error_per_interval(&self) -> u64 {
        self.error_per_interval
    }

    #[inline]
    #[must_use]
    pub fn accumulated_error(&self) -> u64 {
        self.accumulated_error
    }

    #[inline]
    #[must_use]
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    #[inline]
    #[must_use]
    pub fn frames_target(&self) -> u64 {
        self.frames_target
    }

    #[inline]
    #[must_use]
    pub fn transform_count(&self) -> u64 {
        self.transform_count
    }

    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Forget the partial interval after a discontinuity. Ring contents and
    /// cursor are kept.
    pub fn flush(&mut self) {
        self.frames_seen = 0;
        self.transform_count = 0;
        self.accumulated_error = 0;
    }

    /// Note the timestamp of an incoming chunk. It becomes the interval
    /// timestamp only when no frame of the current interval was seen yet.
    pub fn begin_chunk(&mut self, pts: Option<u64>) {
        if self.frames_seen == 0 {
            self.timestamp = pts;
        }
    }

    /// Largest sub-block that neither refills the ring past a transform point
    /// nor crosses the interval boundary.
    #[must_use]
    pub fn next_block(&self, available: usize) -> usize {
        let fl = self.frame_length as u64;
        let to_transform = fl - self.frames_seen % fl;
        let to_report = self.frames_target - self.frames_seen;
        let block = to_transform.min(to_report);
        usize::try_from(block).map_or(available, |b| b.min(available))
    }

    /// Account for `frames` frames just written at the cursor.
    pub fn advance(&mut self, frames: usize) {
        self.cursor = (self.cursor + frames) % self.frame_length;
        self.frames_seen += frames as u64;
        debug_assert!(self.frames_seen <= self.frames_target);
    }

    /// A transform runs when the ring was just refilled, or when the interval
    /// ends without any transform so far.
    #[must_use]
    pub fn transform_due(&self) -> bool {
        self.frames_seen % self.frame_length as u64 == 0
            || (self.interval_complete() && self.transform_count == 0)
    }

    pub fn record_transform(&mut self) {
        self.transform_count += 1;
    }

    #[inline]
    #[must_use]
    pub fn interval_complete(&self) -> bool {
        self.frames_seen == self.frames_target
    }

    /// Close the current interval: pick the next target, advance the
    /// timestamp and reset the counters.
    pub fn finish_interval(&mut self) -> IntervalSummary {
        debug_assert!(self.interval_complete());
        log::debug!(
            "frame length: {} frames: {} fpi: {} error: {}",
            self.frame_length,
            self.frames_seen,
            self.frames_per_interval,
            ClockTime(Some(self.accumulated_error))
        );

        let summary = IntervalSummary {
            timestamp: self.timestamp,
            frames: self.frames_seen,
            transforms: self.transform_count,
        };

        self.frames_target = self.frames_per_interval;
        if self.accumulated_error >= SECOND {
            self.accumulated_error -= SECOND;
            self.frames_target += 1;
        }
        self.accumulated_error += self.error_per_interval;

        if let Some(ts) = self.timestamp {
            self.timestamp = Some(ts.saturating_add(scale(
                self.frames_seen,
                SECOND,
                u64::from(self.rate),
            )));
        }

        self.frames_seen = 0;
        self.transform_count = 0;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed `frames` frames in one go, returning completed intervals.
    fn feed(s: &mut IntervalScheduler, mut frames: usize) -> Vec<IntervalSummary> {
        let mut done = Vec::new();
        while frames > 0 {
            let block = s.next_block(frames);
            assert!(block > 0);
            s.advance(block);
            frames -= block;
            if s.transform_due() {
                s.record_transform();
            }
            if s.interval_complete() {
                done.push(s.finish_interval());
            }
        }
        done
    }

    #[test]
    fn derives_frames_and_remainder() {
        // 1 ms at 44.1 kHz: 44 frames plus 0.1 frame of remainder
        let s = IntervalScheduler::new(1022, 1_000_000, 44_100);
        assert_eq!(s.frames_per_interval(), 44);
        assert_eq!(s.error_per_interval(), 100_000_000);
        assert_eq!(s.frames_target(), 44);
    }

    #[test]
    fn tiny_interval_still_needs_one_frame() {
        let s = IntervalScheduler::new(1022, 1, 16_000);
        assert_eq!(s.frames_per_interval(), 1);
    }

    #[test]
    fn blocks_stop_at_transform_and_report_points() {
        let mut s = IntervalScheduler::new(1022, 100_000_000, 16_000);
        assert_eq!(s.next_block(5000), 1022);
        s.advance(1022);
        assert!(s.transform_due());
        s.record_transform();
        assert_eq!(s.next_block(5000), 578);
        assert_eq!(s.next_block(100), 100);
        s.advance(578);
        assert!(s.interval_complete());
        assert!(!s.transform_due());
        assert_eq!(s.cursor(), 1600 % 1022);
    }

    #[test]
    fn short_interval_forces_one_transform() {
        let mut s = IntervalScheduler::new(1022, 10_000_000, 16_000);
        let done = feed(&mut s, 160);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].transforms, 1);
        assert_eq!(done[0].frames, 160);
    }

    #[test]
    fn long_interval_counts_every_refill() {
        // 1 s at 16 kHz spans 15 full refills of a 1022-frame ring
        let mut s = IntervalScheduler::new(1022, SECOND, 16_000);
        let done = feed(&mut s, 16_000);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].transforms, 15);
    }

    #[test]
    fn fractional_intervals_do_not_drift() {
        let mut s = IntervalScheduler::new(1022, 1_000_000, 44_100);
        let mut total = 0u64;
        let mut reported = 0usize;
        while reported < 10_000 {
            let block = s.next_block(usize::MAX);
            s.advance(block);
            if s.transform_due() {
                s.record_transform();
            }
            if s.interval_complete() {
                total += s.finish_interval().frames;
                reported += 1;
                assert!(s.accumulated_error() < SECOND + s.error_per_interval());
            }
        }
        let expected = 441_000u64;
        assert!(total.abs_diff(expected) <= 1, "{total} vs {expected}");
    }

    #[test]
    fn timestamps_advance_by_consumed_frames() {
        let mut s = IntervalScheduler::new(1022, 100_000_000, 16_000);
        s.begin_chunk(Some(SECOND));
        let done = feed(&mut s, 3200);
        assert_eq!(done[0].timestamp, Some(SECOND));
        assert_eq!(done[1].timestamp, Some(SECOND + 100_000_000));

        // A later chunk starting mid-interval does not move the timestamp.
        feed(&mut s, 10);
        s.begin_chunk(Some(42));
        let done = feed(&mut s, 1590);
        assert_eq!(done[0].timestamp, Some(SECOND + 200_000_000));
    }

    #[test]
    fn timestamp_saturates_near_the_end_of_time() {
        let mut s = IntervalScheduler::new(1022, 100_000_000, 16_000);
        s.begin_chunk(Some(u64::MAX - 5));
        let done = feed(&mut s, 3200);
        assert_eq!(done[0].timestamp, Some(u64::MAX - 5));
        assert_eq!(done[1].timestamp, Some(u64::MAX));
    }

    #[test]
    fn missing_timestamp_stays_missing() {
        let mut s = IntervalScheduler::new(1022, 100_000_000, 16_000);
        s.begin_chunk(None);
        let done = feed(&mut s, 1600);
        assert_eq!(done[0].timestamp, None);
    }

    #[test]
    fn flush_keeps_cursor() {
        let mut s = IntervalScheduler::new(1022, 100_000_000, 16_000);
        feed(&mut s, 700);
        s.flush();
        assert_eq!(s.frames_seen(), 0);
        assert_eq!(s.transform_count(), 0);
        assert_eq!(s.accumulated_error(), 0);
        assert_eq!(s.cursor(), 700);
    }
}
