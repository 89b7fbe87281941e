//! Per-interval result record handed to the event bus.

use serde::{Deserialize, Serialize};

/// Coefficients reported for one interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coefficients {
    /// Downmixed input: a single vector of `num_coeffs` values.
    Mono(Vec<f32>),
    /// One vector per input channel.
    PerChannel(Vec<Vec<f32>>),
}

impl Coefficients {
    /// Vectors in channel order. A mono result yields a single vector.
    ///
    /// # Example
    /// ```
    /// use cep_core::event::Coefficients;
    /// let c = Coefficients::PerChannel(vec![vec![1.0], vec![2.0]]);
    /// assert_eq!(c.channels().count(), 2);
    /// ```
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        let slices: Vec<&[f32]> = match self {
            Self::Mono(v) => vec![v.as_slice()],
            Self::PerChannel(vs) => vs.iter().map(Vec::as_slice).collect(),
        };
        slices.into_iter()
    }
}

/// Event emitted once per completed reporting interval.
///
/// Times are nanoseconds. They are absent when the input carried no
/// timestamp or fell before the current segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CepstrumEvent {
    /// Timestamp of the first frame of the interval.
    pub timestamp: Option<u64>,
    pub stream_time: Option<u64>,
    pub running_time: Option<u64>,
    /// Configured interval duration.
    pub duration: u64,
    /// `stream_time + duration`.
    pub end_time: Option<u64>,
    /// Frames that made up this interval.
    pub frames: u64,
    /// Transforms averaged into this interval.
    pub transforms: u64,
    pub coefficients: Coefficients,
}

impl CepstrumEvent {
    /// Name under which the record is posted.
    pub const NAME: &'static str = "cepstrum";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_yields_one_channel() {
        let c = Coefficients::Mono(vec![0.5; 13]);
        let all: Vec<&[f32]> = c.channels().collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].len(), 13);
    }
}
