//! Depth quantization.
//!
//! Converts a single-channel float depth raster into 16-bit unsigned
//! integers by rounding half up: `out = trunc(value * scale + 0.5)`.
//! The depth pass normally writes values already expressed in output units,
//! in which case the scale is 1.

use log::warn;

use crate::buffer::{ImageBuffer, ImageView};
use crate::error::{RenderError, RenderResult};
use crate::pixel::PixelFormat;

/// What happens to rounded values above `u16::MAX`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OverflowPolicy {
    /// Keep the low 16 bits, as a truncating integer store does, at any
    /// magnitude. Infinity becomes 0.
    #[default]
    Wrap,
    /// Clamp to 65535.
    Saturate,
}

/// Per-call counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuantizeStats {
    /// Pixels whose rounded value exceeded 65535.
    pub overflowed: usize,
    /// Pixels that were negative or NaN and became 0.
    pub clamped_low: usize,
}

/// Float depth to 16-bit converter.
#[derive(Clone, Copy, Debug, Default)]
pub struct DepthQuantizer {
    policy: OverflowPolicy,
}

impl DepthQuantizer {
    /// Create a quantizer with the given overflow policy.
    pub fn new(policy: OverflowPolicy) -> Self {
        Self { policy }
    }

    /// Overflow policy in effect.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Quantize one value. Negative values and NaN become 0.
    #[inline]
    pub fn quantize_value(&self, value: f32, scale: f32) -> u16 {
        let rounded = value * scale + 0.5;
        if !(rounded >= 1.0) {
            return 0;
        }
        match self.policy {
            // Modulo 2^16 before the cast, which would otherwise saturate.
            // Infinity gives NaN here and casts to 0.
            OverflowPolicy::Wrap => rounded.rem_euclid(65536.0) as u16,
            OverflowPolicy::Saturate => rounded as u16,
        }
    }

    /// Quantize `depth` into a newly allocated `GRAY16LE` buffer of the same size.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedFormat`] unless `depth` is `GRAY32F`.
    pub fn quantize(&self, depth: &ImageView<'_>, scale: f32) -> RenderResult<ImageBuffer> {
        let mut out = ImageBuffer::new(depth.width(), depth.height(), PixelFormat::GRAY16LE);
        self.quantize_into(depth, scale, &mut out)?;
        Ok(out)
    }

    /// Quantize `depth` into an existing `GRAY16LE` buffer, overwriting it.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedFormat`] if either format is wrong and
    /// [`RenderError::Buffer`] if the dimensions differ.
    pub fn quantize_into(
        &self,
        depth: &ImageView<'_>,
        scale: f32,
        out: &mut ImageBuffer,
    ) -> RenderResult<QuantizeStats> {
        if depth.format() != PixelFormat::GRAY32F {
            return Err(RenderError::UnsupportedFormat(format!(
                "depth quantizer input must be GRAY32F, got {}",
                depth.format()
            )));
        }
        if out.format() != PixelFormat::GRAY16LE {
            return Err(RenderError::UnsupportedFormat(format!(
                "depth quantizer output must be GRAY16LE, got {}",
                out.format()
            )));
        }
        if out.width() != depth.width() || out.height() != depth.height() {
            return Err(crate::buffer::BufferError::FormatMismatch.into());
        }

        let src = depth.reinterpret::<f32>()?;
        let mut dst = out.typed_mut::<u16>()?;
        let mut stats = QuantizeStats::default();
        for y in 0..src.height() {
            for (out_value, &value) in dst.row_mut(y).iter_mut().zip(src.row(y)) {
                let rounded = value * scale + 0.5;
                if rounded >= 65536.0 {
                    stats.overflowed += 1;
                } else if !(rounded >= 0.0) {
                    stats.clamped_low += 1;
                }
                *out_value = self.quantize_value(value, scale);
            }
        }

        if stats.overflowed > 0 {
            warn!(
                "{} depth values exceeded the 16-bit range ({:?})",
                stats.overflowed, self.policy
            );
        }
        Ok(stats)
    }
}
