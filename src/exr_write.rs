//! Floating-point image export.
//!
//! Writes an interleaved scanline buffer as a multi-channel OpenEXR file.
//! Each channel is described by a [`ChannelSlice`]: a byte offset into the
//! pixel, an x stride of one pixel and a y stride of one row pitch. The
//! encoder reads every sample out of the interleaved rows through those
//! strides while it compresses, so no per-channel copy of the image is made.
//!
//! 16-bit channels are written as half floats and 32-bit channels as single
//! floats. The bytes are taken as they are: the exporter never narrows.

use std::path::Path;

use exr::prelude::*;
use log::debug;

use crate::buffer::{BufferError, ImageView};
use crate::error::{RenderError, RenderResult};
use crate::pixel::{ExrSampleType, PixelFormat};

/// Channel names in emission order. Only the first `channels()` are used.
pub const CHANNEL_NAMES: [&str; 4] = ["R", "G", "B", "A"];

// ---------------------------------------------------------------------------
// Channel layout
// ---------------------------------------------------------------------------

/// Where one channel lives inside an interleaved buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSlice {
    /// Channel name written to the file.
    pub name: &'static str,
    /// Sample type written to the file.
    pub sample_type: ExrSampleType,
    /// Byte offset of the channel inside a pixel.
    pub byte_offset: usize,
    /// Bytes between horizontally adjacent samples.
    pub x_stride: usize,
    /// Bytes between vertically adjacent samples.
    pub y_stride: usize,
}

impl ChannelSlice {
    /// Byte index of the sample at `(x, y)`.
    #[inline]
    pub fn sample_index(&self, x: usize, y: usize) -> usize {
        y * self.y_stride + x * self.x_stride + self.byte_offset
    }

    fn description(&self) -> ChannelDescription {
        let sample_type = match self.sample_type {
            ExrSampleType::Half => SampleType::F16,
            ExrSampleType::Float => SampleType::F32,
        };
        ChannelDescription::new(self.name, sample_type, false)
    }

    /// Sample at `(x, y)`, in the channel's own precision.
    fn read(&self, bytes: &[u8], x: usize, y: usize) -> Sample {
        let i = self.sample_index(x, y);
        match self.sample_type {
            ExrSampleType::Half => {
                Sample::F16(f16::from_bits(bytemuck::pod_read_unaligned(&bytes[i..i + 2])))
            }
            ExrSampleType::Float => Sample::F32(bytemuck::pod_read_unaligned(&bytes[i..i + 4])),
        }
    }
}

/// Describe every channel of `format` for a buffer with row `pitch`.
///
/// # Errors
///
/// Returns [`RenderError::UnsupportedPixelType`] if any channel is not a
/// 16- or 32-bit float.
pub fn channel_slices(format: &PixelFormat, pitch: usize) -> RenderResult<Vec<ChannelSlice>> {
    (0..format.channels())
        .map(|i| {
            Ok(ChannelSlice {
                name: CHANNEL_NAMES[i],
                sample_type: format.channel_pixel_type(i)?,
                byte_offset: format.channel_offset(i),
                x_stride: format.bytes_per_pixel(),
                y_stride: pitch,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write `image` to `path` as an OpenEXR file with channels named R, G, B, A.
///
/// When `top_line_first` is false, row 0 of `image` is the bottom scanline;
/// the rows are copied into reversed order before writing. Otherwise the
/// buffer is read in place.
///
/// # Errors
///
/// - [`RenderError::UnsupportedPixelType`] if a channel is not 16/32-bit float.
/// - [`RenderError::Buffer`] if `format` does not match the buffer's pixel size.
/// - [`RenderError::Io`] if the file cannot be created or written.
pub fn export_exr(
    image: &ImageView<'_>,
    format: &PixelFormat,
    path: &Path,
    top_line_first: bool,
) -> RenderResult<()> {
    if format.bytes_per_pixel() != image.format().bytes_per_pixel() {
        return Err(BufferError::FormatMismatch.into());
    }
    if format.bytes_per_pixel() * image.width() as usize > image.pitch() {
        return Err(BufferError::StrideTooSmall.into());
    }
    // Validate every channel before the file is created.
    channel_slices(format, image.pitch())?;

    let flipped;
    let source = if top_line_first {
        *image
    } else {
        flipped = image.to_flipped();
        flipped.as_view()
    };

    let width = source.width() as usize;
    let height = source.height() as usize;
    let bytes = source.as_bytes();
    let slices = channel_slices(format, source.pitch())?;

    // The codec pulls every pixel through the closure, reading each channel
    // at its offset and strides in the source rows.
    macro_rules! write_layer {
        ($($slice:ident),+) => {
            Image::from_channels(
                (width, height),
                SpecificChannels::new(
                    ($($slice.description(),)+),
                    |Vec2(x, y): Vec2<usize>| ($($slice.read(bytes, x, y),)+),
                ),
            )
            .write()
            .to_file(path)
        };
    }
    let written = match slices.as_slice() {
        [r] => write_layer!(r),
        [r, g] => write_layer!(r, g),
        [r, g, b] => write_layer!(r, g, b),
        [r, g, b, a] => write_layer!(r, g, b, a),
        _ => return Err(RenderError::UnsupportedFormat(format.to_string())),
    };
    written.map_err(|err| RenderError::exr(path, err))?;
    debug!(
        "wrote {} ({}x{}, {})",
        path.display(),
        width,
        height,
        format
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Read-back
// ---------------------------------------------------------------------------

/// Channels of an EXR file, widened to `f32`, top scanline first.
#[derive(Clone, Debug)]
pub struct ExrChannels {
    pub width: usize,
    pub height: usize,
    pub channels: Vec<(String, Vec<f32>)>,
}

impl ExrChannels {
    /// Samples of the channel called `name`.
    pub fn channel(&self, name: &str) -> Option<&[f32]> {
        self.channels
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, samples)| samples.as_slice())
    }

    /// Channel names in file order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|(n, _)| n.as_str())
    }
}

/// Read the first layer of an EXR file.
///
/// # Errors
///
/// Returns [`RenderError::Io`] if the file cannot be read and
/// [`RenderError::Exr`] if it is not a valid EXR image.
pub fn read_exr(path: &Path) -> RenderResult<ExrChannels> {
    let image = read_first_flat_layer_from_file(path).map_err(|err| RenderError::exr(path, err))?;
    let layer = image.layer_data;
    let channels = layer
        .channel_data
        .list
        .into_iter()
        .map(|channel| {
            let samples = match channel.sample_data {
                FlatSamples::F16(values) => values.into_iter().map(f16::to_f32).collect(),
                FlatSamples::F32(values) => values,
                FlatSamples::U32(values) => values.into_iter().map(|v| v as f32).collect(),
            };
            (channel.name.to_string(), samples)
        })
        .collect();
    Ok(ExrChannels {
        width: layer.size.0,
        height: layer.size.1,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ImageBuffer;
    use crate::test_util::TempDir;
    use imgref::Img;
    use rgb::Rgb;

    fn rgb_image(width: u32, height: u32, f: impl Fn(u32, u32) -> [f32; 3]) -> ImageBuffer {
        let mut buf = ImageBuffer::new(width, height, PixelFormat::RGB96F);
        {
            let mut typed = buf.typed_mut::<f32>().unwrap();
            for y in 0..height {
                let row = typed.row_mut(y);
                for x in 0..width {
                    let px = f(x, y);
                    row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&px);
                }
            }
        }
        buf
    }

    #[test]
    fn slices_follow_interleaved_layout() {
        let slices = channel_slices(&PixelFormat::RGB96F, 128).unwrap();
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].name, "R");
        assert_eq!(slices[2].name, "B");
        assert_eq!(slices[1].byte_offset, 4);
        assert_eq!(slices[2].byte_offset, 8);
        assert!(slices.iter().all(|s| s.x_stride == 12 && s.y_stride == 128));
        assert_eq!(slices[2].sample_index(1, 2), 2 * 128 + 12 + 8);

        let half = channel_slices(&PixelFormat::RGBA64F, 32).unwrap();
        assert_eq!(half[3].name, "A");
        assert_eq!(half[3].byte_offset, 6);
        assert_eq!(half[3].sample_type, ExrSampleType::Half);
    }

    #[test]
    fn single_float_round_trips_exactly() {
        let dir = TempDir::new("exr-f32");
        let path = dir.path().join("exact.exr");
        let values = [0.1f32, -3.75, 1.0e-7, 65504.5, 123456.79, 0.0];
        let buf = rgb_image(2, 1, |x, _| {
            let i = x as usize * 3;
            [values[i], values[i + 1], values[i + 2]]
        });
        export_exr(&buf.as_view(), &PixelFormat::RGB96F, &path, true).unwrap();

        let read = read_exr(&path).unwrap();
        assert_eq!((read.width, read.height), (2, 1));
        assert_eq!(read.channel("R").unwrap(), &[values[0], values[3]]);
        assert_eq!(read.channel("G").unwrap(), &[values[1], values[4]]);
        assert_eq!(read.channel("B").unwrap(), &[values[2], values[5]]);
        assert!(read.channel("A").is_none());
    }

    #[test]
    fn half_channels_round_to_nearest_half() {
        let dir = TempDir::new("exr-f16");
        let path = dir.path().join("half.exr");
        let originals = [0.1f32, 1.0 / 3.0, 2049.0];
        let mut buf = ImageBuffer::new(3, 1, PixelFormat::GRAY16F);
        {
            let mut typed = buf.typed_mut::<u16>().unwrap();
            for (dst, &v) in typed.row_mut(0).iter_mut().zip(&originals) {
                *dst = f16::from_f32(v).to_bits();
            }
        }
        export_exr(&buf.as_view(), &PixelFormat::GRAY16F, &path, true).unwrap();

        let read = read_exr(&path).unwrap();
        let r = read.channel("R").unwrap();
        for (&got, &orig) in r.iter().zip(&originals) {
            assert_eq!(got, f16::from_f32(orig).to_f32());
        }
        // 2049 is not representable in half precision.
        assert_eq!(r[2], 2048.0);
    }

    #[test]
    fn bottom_line_first_is_flipped() {
        let dir = TempDir::new("exr-orientation");
        let a = [1.0, 1.0, 1.0];
        let b = [2.0, 2.0, 2.0];
        let buf = rgb_image(3, 2, |_, y| if y == 0 { a } else { b });

        let flipped = dir.path().join("flipped.exr");
        export_exr(&buf.as_view(), &PixelFormat::RGB96F, &flipped, false).unwrap();
        let read = read_exr(&flipped).unwrap();
        assert_eq!(read.channel("R").unwrap(), &[2.0, 2.0, 2.0, 1.0, 1.0, 1.0]);

        let kept = dir.path().join("kept.exr");
        export_exr(&buf.as_view(), &PixelFormat::RGB96F, &kept, true).unwrap();
        let read = read_exr(&kept).unwrap();
        assert_eq!(read.channel("R").unwrap(), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn channels_keep_their_names() {
        let dir = TempDir::new("exr-channels");
        let path = dir.path().join("rgb.exr");
        let buf = rgb_image(4, 3, |_, _| [1.0, 2.0, 3.0]);
        export_exr(&buf.as_view(), &PixelFormat::RGB96F, &path, true).unwrap();

        let read = read_exr(&path).unwrap();
        let mut names: Vec<&str> = read.names().collect();
        names.sort_unstable();
        assert_eq!(names, ["B", "G", "R"]);
        assert!(read.channel("R").unwrap().iter().all(|&v| v == 1.0));
        assert!(read.channel("G").unwrap().iter().all(|&v| v == 2.0));
        assert!(read.channel("B").unwrap().iter().all(|&v| v == 3.0));
        assert_eq!(read.channel("R").unwrap().len(), 12);
    }

    #[test]
    fn padded_pitch_is_skipped() {
        let dir = TempDir::new("exr-padded");
        let path = dir.path().join("padded.exr");
        // Two visible pixels per row, stride of three; the third is padding.
        let pixels = vec![
            Rgb::new(1.0f32, 2.0, 3.0),
            Rgb::new(4.0, 5.0, 6.0),
            Rgb::new(-99.0, -99.0, -99.0),
            Rgb::new(7.0, 8.0, 9.0),
            Rgb::new(10.0, 11.0, 12.0),
            Rgb::new(-99.0, -99.0, -99.0),
        ];
        let img = Img::new_stride(pixels, 2, 2, 3);
        let view = ImageView::from(img.as_ref());
        assert_eq!(view.pitch(), 36);
        export_exr(&view, &PixelFormat::RGB96F, &path, true).unwrap();

        let read = read_exr(&path).unwrap();
        assert_eq!((read.width, read.height), (2, 2));
        assert_eq!(read.channel("R").unwrap(), &[1.0, 4.0, 7.0, 10.0]);
        assert_eq!(read.channel("B").unwrap(), &[3.0, 6.0, 9.0, 12.0]);
    }

    #[test]
    fn half_rgba_reads_through_row_padding() {
        let dir = TempDir::new("exr-rgba-half");
        // 3 pixels of 4 halves per row, then 4 halves of padding.
        let mut data = vec![0xFFFFu16; 32];
        for y in 0..2 {
            for x in 0..3 {
                let base = (y * 10 + x) as f32;
                for c in 0..4 {
                    data[y * 16 + x * 4 + c] = f16::from_f32(base + c as f32 * 0.25).to_bits();
                }
            }
        }
        let view = ImageView::new(bytemuck::cast_slice(&data), 3, 2, 32, PixelFormat::RGBA64F)
            .unwrap();

        let kept = dir.path().join("kept.exr");
        export_exr(&view, &PixelFormat::RGBA64F, &kept, true).unwrap();
        let read = read_exr(&kept).unwrap();
        assert_eq!((read.width, read.height), (3, 2));
        assert_eq!(read.channel("R").unwrap(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(read.channel("A").unwrap(), &[0.75, 1.75, 2.75, 10.75, 11.75, 12.75]);

        let flipped = dir.path().join("flipped.exr");
        export_exr(&view, &PixelFormat::RGBA64F, &flipped, false).unwrap();
        let read = read_exr(&flipped).unwrap();
        assert_eq!(read.channel("G").unwrap(), &[10.25, 11.25, 12.25, 0.25, 1.25, 2.25]);
    }

    #[test]
    fn integer_formats_are_rejected_before_writing() {
        let dir = TempDir::new("exr-reject");
        let path = dir.path().join("bytes.exr");
        let buf = ImageBuffer::new(2, 2, PixelFormat::RGB24);
        let err = export_exr(&buf.as_view(), &PixelFormat::RGB24, &path, true).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnsupportedPixelType { bits: 8, .. }
        ));
        assert!(!path.exists());
    }

    #[test]
    fn mismatched_format_is_rejected() {
        let dir = TempDir::new("exr-mismatch");
        let buf = ImageBuffer::new(2, 2, PixelFormat::RGB96F);
        let err = export_exr(
            &buf.as_view(),
            &PixelFormat::RGBA128F,
            &dir.path().join("x.exr"),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::Buffer(BufferError::FormatMismatch)));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = TempDir::new("exr-io");
        let path = dir.path().join("no-such-dir").join("frame000000.exr");
        let buf = rgb_image(1, 1, |_, _| [0.5, 0.5, 0.5]);
        let err = export_exr(&buf.as_view(), &PixelFormat::RGB96F, &path, true).unwrap_err();
        assert!(err.is_io(), "{err}");
    }
}
