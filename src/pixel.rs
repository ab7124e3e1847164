//! Pixel format descriptors.
//!
//! A [`PixelFormat`] describes one interleaved pixel: how many channels it
//! has, how many bits each channel occupies and whether those bits hold
//! IEEE-754 floats or unsigned integers. Formats are looked up by name
//! (`"RGB96F"`, `"GRAY16LE"`, ...) and never mutated.

use core::fmt;

use crate::error::{RenderError, RenderResult};

/// Upper bound on channels per pixel.
pub const MAX_CHANNELS: usize = 4;

// ---------------------------------------------------------------------------
// Channel kinds
// ---------------------------------------------------------------------------

/// Numeric interpretation of a channel's bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ChannelKind {
    /// IEEE-754 half (16-bit) or single (32-bit) precision.
    Float,
    /// Unsigned integer, native byte order.
    Unsigned,
}

/// Sample type tag written into a floating-point image file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExrSampleType {
    /// IEEE-754 binary16.
    Half,
    /// IEEE-754 binary32.
    Float,
}

impl ExrSampleType {
    /// Bytes occupied by one sample in memory.
    #[inline]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::Half => 2,
            Self::Float => 4,
        }
    }
}

// ---------------------------------------------------------------------------
// PixelFormat
// ---------------------------------------------------------------------------

/// Static description of an interleaved pixel layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    name: &'static str,
    kind: ChannelKind,
    channels: u8,
    channel_bits: [u8; MAX_CHANNELS],
}

impl PixelFormat {
    /// 8-bit grayscale.
    pub const GRAY8: Self = Self::uniform("GRAY8", ChannelKind::Unsigned, 1, 8);
    /// 16-bit unsigned grayscale, little-endian in memory.
    pub const GRAY16LE: Self = Self::uniform("GRAY16LE", ChannelKind::Unsigned, 1, 16);
    /// 8-bit RGB.
    pub const RGB24: Self = Self::uniform("RGB24", ChannelKind::Unsigned, 3, 8);
    /// 8-bit RGBA.
    pub const RGBA32: Self = Self::uniform("RGBA32", ChannelKind::Unsigned, 4, 8);
    /// Half-float grayscale.
    pub const GRAY16F: Self = Self::uniform("GRAY16F", ChannelKind::Float, 1, 16);
    /// Single-float grayscale (depth textures).
    pub const GRAY32F: Self = Self::uniform("GRAY32F", ChannelKind::Float, 1, 32);
    /// Half-float RGB.
    pub const RGB48F: Self = Self::uniform("RGB48F", ChannelKind::Float, 3, 16);
    /// Single-float RGB, the color download format.
    pub const RGB96F: Self = Self::uniform("RGB96F", ChannelKind::Float, 3, 32);
    /// Half-float RGBA.
    pub const RGBA64F: Self = Self::uniform("RGBA64F", ChannelKind::Float, 4, 16);
    /// Single-float RGBA.
    pub const RGBA128F: Self = Self::uniform("RGBA128F", ChannelKind::Float, 4, 32);

    const TABLE: [Self; 10] = [
        Self::GRAY8,
        Self::GRAY16LE,
        Self::RGB24,
        Self::RGBA32,
        Self::GRAY16F,
        Self::GRAY32F,
        Self::RGB48F,
        Self::RGB96F,
        Self::RGBA64F,
        Self::RGBA128F,
    ];

    const fn uniform(name: &'static str, kind: ChannelKind, channels: u8, bits: u8) -> Self {
        let mut channel_bits = [0u8; MAX_CHANNELS];
        let mut i = 0;
        while i < channels as usize {
            channel_bits[i] = bits;
            i += 1;
        }
        Self {
            name,
            kind,
            channels,
            channel_bits,
        }
    }

    /// Look up a format by its name. Names are case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedFormat`] for unknown names.
    pub fn lookup(name: &str) -> RenderResult<Self> {
        Self::TABLE
            .iter()
            .copied()
            .find(|fmt| fmt.name == name)
            .ok_or_else(|| RenderError::UnsupportedFormat(name.to_string()))
    }

    /// Every format known to [`lookup`](Self::lookup).
    pub fn all() -> &'static [Self] {
        &Self::TABLE
    }

    /// Format name as accepted by [`lookup`](Self::lookup).
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Numeric interpretation shared by all channels.
    #[inline]
    pub const fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Number of channels per pixel (1..=4).
    #[inline]
    pub const fn channels(&self) -> usize {
        self.channels as usize
    }

    /// Bit depth of channel `index`, or 0 past the last channel.
    #[inline]
    pub const fn channel_bits(&self, index: usize) -> u32 {
        if index < MAX_CHANNELS {
            self.channel_bits[index] as u32
        } else {
            0
        }
    }

    /// Total bits per pixel.
    pub const fn bits_per_pixel(&self) -> u32 {
        let mut total = 0;
        let mut i = 0;
        while i < MAX_CHANNELS {
            total += self.channel_bits[i] as u32;
            i += 1;
        }
        total
    }

    /// Bytes per pixel: the sum of channel bit depths divided by 8.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel() as usize / 8
    }

    /// Byte offset of channel `index` within a pixel.
    pub const fn channel_offset(&self, index: usize) -> usize {
        let mut bits = 0;
        let mut i = 0;
        while i < index && i < MAX_CHANNELS {
            bits += self.channel_bits[i] as usize;
            i += 1;
        }
        bits / 8
    }

    /// Alignment required to read any channel in place.
    pub const fn min_alignment(&self) -> usize {
        let mut widest = 1;
        let mut i = 0;
        while i < MAX_CHANNELS {
            let bytes = self.channel_bits[i] as usize / 8;
            if bytes > widest {
                widest = bytes;
            }
            i += 1;
        }
        widest
    }

    /// Row pitch for `width` pixels, rounded up to the channel alignment.
    #[inline]
    pub const fn aligned_pitch(&self, width: u32) -> usize {
        let raw = width as usize * self.bytes_per_pixel();
        let align = self.min_alignment();
        (raw + align - 1) & !(align - 1)
    }

    /// Sample type used when writing channel `index` to a floating-point
    /// image: 16 bits map to half, 32 bits to single precision.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedPixelType`] for any other bit depth,
    /// for integer formats, and for channel indices past the last channel.
    pub fn channel_pixel_type(&self, index: usize) -> RenderResult<ExrSampleType> {
        let bits = self.channel_bits(index);
        let unsupported = RenderError::UnsupportedPixelType {
            format: self.name,
            channel: index,
            bits,
        };
        if index >= self.channels() || self.kind != ChannelKind::Float {
            return Err(unsupported);
        }
        match bits {
            16 => Ok(ExrSampleType::Half),
            32 => Ok(ExrSampleType::Float),
            _ => Err(unsupported),
        }
    }
}

impl fmt::Debug for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
