//! Raw sample formats accepted on the input side.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CepstrumError, Result};

/// Sample encoding, independent of byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleEncoding {
    S16,
    /// Packed 3-byte two's-complement.
    S24,
    S32,
    F32,
    F64,
}

impl SampleEncoding {
    #[inline]
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::S16 => 2,
            Self::S24 => 3,
            Self::S32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Full-scale positive value for integer encodings, `1.0` for floats.
    ///
    /// # Example
    /// ```
    /// use cep_core::format::SampleEncoding;
    /// assert_eq!(SampleEncoding::S16.max_value(), 32767.0);
    /// assert_eq!(SampleEncoding::F64.max_value(), 1.0);
    /// ```
    #[must_use]
    pub fn max_value(self) -> f32 {
        match self {
            Self::S16 => f32::from(i16::MAX),
            Self::S24 => 8_388_607.0,
            #[allow(clippy::cast_precision_loss)]
            Self::S32 => i32::MAX as f32,
            Self::F32 | Self::F64 => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
}

/// An interleaved sample format tag such as `S16LE` or `F64BE`.
///
/// # Example
/// ```
/// use cep_core::format::{AudioFormat, ByteOrder, SampleEncoding};
/// let fmt: AudioFormat = "s24be".parse().unwrap();
/// assert_eq!(fmt.encoding, SampleEncoding::S24);
/// assert_eq!(fmt.order, ByteOrder::Big);
/// assert_eq!(fmt.to_string(), "S24BE");
/// assert!("U8".parse::<AudioFormat>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: SampleEncoding,
    pub order: ByteOrder,
}

impl AudioFormat {
    pub const S16LE: Self = Self::le(SampleEncoding::S16);
    pub const S24LE: Self = Self::le(SampleEncoding::S24);
    pub const S32LE: Self = Self::le(SampleEncoding::S32);
    pub const F32LE: Self = Self::le(SampleEncoding::F32);
    pub const F64LE: Self = Self::le(SampleEncoding::F64);

    const fn le(encoding: SampleEncoding) -> Self {
        Self {
            encoding,
            order: ByteOrder::Little,
        }
    }

    #[inline]
    #[must_use]
    pub const fn bytes_per_sample(self) -> usize {
        self.encoding.bytes_per_sample()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enc = match self.encoding {
            SampleEncoding::S16 => "S16",
            SampleEncoding::S24 => "S24",
            SampleEncoding::S32 => "S32",
            SampleEncoding::F32 => "F32",
            SampleEncoding::F64 => "F64",
        };
        let order = match self.order {
            ByteOrder::Little => "LE",
            ByteOrder::Big => "BE",
        };
        write!(f, "{enc}{order}")
    }
}

impl FromStr for AudioFormat {
    type Err = CepstrumError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let unsupported = || CepstrumError::UnsupportedFormat(s.to_string());
        if upper.len() != 5 {
            return Err(unsupported());
        }
        let (enc, order) = upper.split_at(3);
        let encoding = match enc {
            "S16" => SampleEncoding::S16,
            "S24" => SampleEncoding::S24,
            "S32" => SampleEncoding::S32,
            "F32" => SampleEncoding::F32,
            "F64" => SampleEncoding::F64,
            _ => return Err(unsupported()),
        };
        let order = match order {
            "LE" => ByteOrder::Little,
            "BE" => ByteOrder::Big,
            _ => return Err(unsupported()),
        };
        Ok(Self { encoding, order })
    }
}

/// Negotiated description of the incoming stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub format: AudioFormat,
    pub channels: usize,
    /// Rate the frames arrive at, used for interval timing.
    pub rate: u32,
}

impl AudioInfo {
    #[must_use]
    pub fn new(format: AudioFormat, channels: usize, rate: u32) -> Self {
        Self {
            format,
            channels,
            rate,
        }
    }

    /// Size in bytes of one interleaved frame (one sample per channel).
    #[inline]
    #[must_use]
    pub fn bytes_per_frame(&self) -> usize {
        self.channels * self.format.bytes_per_sample()
    }

    /// # Errors
    /// Returns an error for a zero channel count or rate.
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(CepstrumError::invalid("channels", 0, ">= 1"));
        }
        if self.rate == 0 {
            return Err(CepstrumError::invalid("rate", 0, ">= 1"));
        }
        Ok(())
    }
}
