//! Interleaved raw samples -> normalized `f32` ring-buffer writes.
//!
//! The reader is chosen once per negotiated format. Each block then runs a
//! loop specialised for its encoding and byte order.

use cep_core::format::{AudioFormat, AudioInfo, ByteOrder, SampleEncoding};

/// How input channels map onto the analysed streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// One stream holding the arithmetic mean of all input channels.
    Downmix,
    /// One stream per input channel.
    PerChannel,
}

/// Normalizing reader for one negotiated stream format.
///
/// # Example
/// ```
/// use cep_audio::normalizer::{ChannelMode, SampleReader};
/// use cep_core::format::{AudioFormat, AudioInfo};
///
/// let info = AudioInfo::new(AudioFormat::S16LE, 2, 16_000);
/// let reader = SampleReader::new(&info, ChannelMode::Downmix);
/// // One stereo frame: left = 16384, right = 0
/// let bytes = [0x00, 0x40, 0x00, 0x00];
/// let mut ring = [0.0f32; 4];
/// let pos = reader.read(&bytes, 0, 1, &mut ring, 3);
/// assert_eq!(pos, 0);
/// assert!((ring[3] - 0.25).abs() < 1e-4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleReader {
    format: AudioFormat,
    channels: usize,
    mode: ChannelMode,
}

impl SampleReader {
    #[must_use]
    pub fn new(info: &AudioInfo, mode: ChannelMode) -> Self {
        Self {
            format: info.format,
            channels: info.channels.max(1),
            mode,
        }
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Number of analysed streams this reader produces.
    #[inline]
    #[must_use]
    pub fn output_streams(&self) -> usize {
        match self.mode {
            ChannelMode::Downmix => 1,
            ChannelMode::PerChannel => self.channels,
        }
    }

    #[inline]
    #[must_use]
    pub fn bytes_per_frame(&self) -> usize {
        self.channels * self.format.bytes_per_sample()
    }

    /// Decode `frames` interleaved frames from `input` for output `stream`,
    /// writing into the ring `dest` from `pos` and wrapping at its end.
    ///
    /// Returns the ring position following the last written sample. `input`
    /// must hold at least `frames` whole frames.
    pub fn read(
        &self,
        input: &[u8],
        stream: usize,
        frames: usize,
        dest: &mut [f32],
        pos: usize,
    ) -> usize {
        use ByteOrder::{Big, Little};

        debug_assert!(stream < self.output_streams());
        debug_assert!(input.len() >= frames * self.bytes_per_frame());

        match (self.format.encoding, self.format.order) {
            (SampleEncoding::S16, Little) => {
                self.fill(input, stream, frames, dest, pos, s16::<false>)
            }
            (SampleEncoding::S16, Big) => self.fill(input, stream, frames, dest, pos, s16::<true>),
            (SampleEncoding::S24, Little) => {
                self.fill(input, stream, frames, dest, pos, s24::<false>)
            }
            (SampleEncoding::S24, Big) => self.fill(input, stream, frames, dest, pos, s24::<true>),
            (SampleEncoding::S32, Little) => {
                self.fill(input, stream, frames, dest, pos, s32::<false>)
            }
            (SampleEncoding::S32, Big) => self.fill(input, stream, frames, dest, pos, s32::<true>),
            (SampleEncoding::F32, Little) => self.fill(input, stream, frames, dest, pos, f32le),
            (SampleEncoding::F32, Big) => self.fill(input, stream, frames, dest, pos, f32be),
            (SampleEncoding::F64, Little) => self.fill(input, stream, frames, dest, pos, f64le),
            (SampleEncoding::F64, Big) => self.fill(input, stream, frames, dest, pos, f64be),
        }
    }

    #[inline(always)]
    #[allow(clippy::cast_precision_loss)]
    fn fill<F: Fn(&[u8]) -> f32>(
        &self,
        input: &[u8],
        stream: usize,
        frames: usize,
        dest: &mut [f32],
        mut pos: usize,
        decode: F,
    ) -> usize {
        let width = self.format.bytes_per_sample();
        let stride = width * self.channels;
        let len = dest.len();
        let frames_in = input.chunks_exact(stride).take(frames);

        match self.mode {
            ChannelMode::Downmix => {
                let channels = self.channels as f32;
                for frame in frames_in {
                    let sum: f32 = frame.chunks_exact(width).map(&decode).sum();
                    dest[pos] = sum / channels;
                    pos = (pos + 1) % len;
                }
            }
            ChannelMode::PerChannel => {
                let offset = stream * width;
                for frame in frames_in {
                    dest[pos] = decode(&frame[offset..offset + width]);
                    pos = (pos + 1) % len;
                }
            }
        }
        pos
    }
}

#[inline(always)]
fn s16<const BE: bool>(b: &[u8]) -> f32 {
    let raw = [b[0], b[1]];
    let v = if BE {
        i16::from_be_bytes(raw)
    } else {
        i16::from_le_bytes(raw)
    };
    f32::from(v) / f32::from(i16::MAX)
}

#[inline(always)]
#[allow(clippy::cast_precision_loss)]
fn s24<const BE: bool>(b: &[u8]) -> f32 {
    // Place the 3 bytes in the top of an i32, then shift back to sign-extend.
    let top = if BE {
        i32::from_be_bytes([b[0], b[1], b[2], 0])
    } else {
        i32::from_le_bytes([0, b[0], b[1], b[2]])
    };
    (top >> 8) as f32 / SampleEncoding::S24.max_value()
}

#[inline(always)]
#[allow(clippy::cast_precision_loss)]
fn s32<const BE: bool>(b: &[u8]) -> f32 {
    let raw = [b[0], b[1], b[2], b[3]];
    let v = if BE {
        i32::from_be_bytes(raw)
    } else {
        i32::from_le_bytes(raw)
    };
    v as f32 / SampleEncoding::S32.max_value()
}

#[inline(always)]
fn f32le(b: &[u8]) -> f32 {
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

#[inline(always)]
fn f32be(b: &[u8]) -> f32 {
    f32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[inline(always)]
#[allow(clippy::cast_possible_truncation)]
fn f64le(b: &[u8]) -> f32 {
    f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32
}

#[inline(always)]
#[allow(clippy::cast_possible_truncation)]
fn f64be(b: &[u8]) -> f32 {
    f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(tag: &str, channels: usize, mode: ChannelMode) -> SampleReader {
        let info = AudioInfo::new(tag.parse().unwrap(), channels, 48_000);
        SampleReader::new(&info, mode)
    }

    #[test]
    fn s16_full_scale_maps_to_unit_range() {
        let r = reader("S16LE", 1, ChannelMode::Downmix);
        let bytes: Vec<u8> = [i16::MAX, i16::MIN, 0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut ring = [9.0f32; 3];
        assert_eq!(r.read(&bytes, 0, 3, &mut ring, 0), 0);
        assert_eq!(ring[0], 1.0);
        assert!((ring[1] + 1.0).abs() < 1e-4);
        assert_eq!(ring[2], 0.0);
    }

    #[test]
    fn s24_sign_extends_both_orders() {
        let le = reader("S24LE", 1, ChannelMode::Downmix);
        let be = reader("S24BE", 1, ChannelMode::Downmix);
        let mut ring = [0.0f32; 2];

        // -1 and the most negative value
        le.read(&[0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x80], 0, 2, &mut ring, 0);
        assert!((ring[0] + 1.0 / 8_388_607.0).abs() < 1e-9);
        assert!((ring[1] + 1.0).abs() < 1e-6);

        be.read(&[0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE], 0, 2, &mut ring, 0);
        assert_eq!(ring[0], 1.0);
        assert!((ring[1] + 2.0 / 8_388_607.0).abs() < 1e-9);
    }

    #[test]
    fn s32_and_float_formats_decode() {
        let mut ring = [0.0f32; 1];
        let r = reader("S32BE", 1, ChannelMode::Downmix);
        r.read(&(i32::MIN / 2).to_be_bytes(), 0, 1, &mut ring, 0);
        assert!((ring[0] + 0.5).abs() < 1e-6);

        let r = reader("F32BE", 1, ChannelMode::Downmix);
        r.read(&0.25f32.to_be_bytes(), 0, 1, &mut ring, 0);
        assert_eq!(ring[0], 0.25);

        let r = reader("F64LE", 1, ChannelMode::Downmix);
        r.read(&(-0.75f64).to_le_bytes(), 0, 1, &mut ring, 0);
        assert_eq!(ring[0], -0.75);
    }

    #[test]
    fn downmix_averages_channels() {
        let r = reader("F32LE", 3, ChannelMode::Downmix);
        assert_eq!(r.output_streams(), 1);
        let bytes: Vec<u8> = [0.3f32, 0.6, 0.9, -0.3, -0.3, 0.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut ring = [0.0f32; 2];
        r.read(&bytes, 0, 2, &mut ring, 0);
        assert!((ring[0] - 0.6).abs() < 1e-6);
        assert!((ring[1] + 0.2).abs() < 1e-6);
    }

    #[test]
    fn per_channel_picks_one_stream() {
        let r = reader("S16LE", 2, ChannelMode::PerChannel);
        assert_eq!(r.output_streams(), 2);
        let bytes: Vec<u8> = [16384i16, -16384, 8192, -8192]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];
        r.read(&bytes, 0, 2, &mut left, 0);
        r.read(&bytes, 1, 2, &mut right, 0);
        assert!((left[0] - 0.5).abs() < 1e-4 && (left[1] - 0.25).abs() < 1e-4);
        assert!((right[0] + 0.5).abs() < 1e-4 && (right[1] + 0.25).abs() < 1e-4);
    }

    #[test]
    fn writes_wrap_around_the_ring() {
        let r = reader("F32LE", 1, ChannelMode::Downmix);
        let bytes: Vec<u8> = [1.0f32, 2.0, 3.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut ring = [0.0f32; 4];
        let pos = r.read(&bytes, 0, 3, &mut ring, 2);
        assert_eq!(pos, 1);
        assert_eq!(ring, [3.0, 0.0, 1.0, 2.0]);
    }
}
