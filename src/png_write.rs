//! 16-bit grayscale PNG output for quantized depth.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::debug;

use crate::buffer::ImageView;
use crate::error::{RenderError, RenderResult};
use crate::pixel::PixelFormat;

/// gAMA value stored in depth PNGs. Downstream tooling keys on it; it is an
/// encoding tag, not a display gamma.
pub const DEPTH_PNG_GAMMA: f32 = 34.0;

/// Write a `GRAY16LE` image as a single-channel 16-bit PNG.
///
/// PNG stores samples big-endian, so every sample is byte-swapped on the way
/// out. When `top_line_first` is false the rows are written in reverse.
/// `gamma`, when given, is stored in the gAMA chunk.
///
/// # Errors
///
/// - [`RenderError::UnsupportedFormat`] if `image` is not `GRAY16LE`.
/// - [`RenderError::Io`] if the file cannot be created or written.
/// - [`RenderError::Png`] for encoder failures.
pub fn write_gray16_png(
    image: &ImageView<'_>,
    path: &Path,
    top_line_first: bool,
    gamma: Option<f32>,
) -> RenderResult<()> {
    if image.format() != PixelFormat::GRAY16LE {
        return Err(RenderError::UnsupportedFormat(format!(
            "16-bit PNG expects GRAY16LE, got {}",
            image.format()
        )));
    }
    let typed = image.reinterpret::<u16>()?;
    let height = typed.height();
    let mut samples = Vec::with_capacity(image.width() as usize * height as usize * 2);
    for y in 0..height {
        let src_y = if top_line_first { y } else { height - 1 - y };
        for &value in typed.row(src_y) {
            samples.extend_from_slice(&value.to_be_bytes());
        }
    }

    let file = File::create(path).map_err(|err| RenderError::io(path, err))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), image.width(), height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Sixteen);
    if let Some(gamma) = gamma {
        encoder.set_source_gamma(png::ScaledFloat::new(gamma));
    }
    let mut writer = encoder
        .write_header()
        .map_err(|err| RenderError::png(path, err))?;
    writer
        .write_image_data(&samples)
        .map_err(|err| RenderError::png(path, err))?;
    writer.finish().map_err(|err| RenderError::png(path, err))?;
    debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ImageBuffer;
    use crate::test_util::TempDir;
    use std::io::BufReader;

    fn gray16(rows: &[&[u16]]) -> ImageBuffer {
        let mut buf = ImageBuffer::new(rows[0].len() as u32, rows.len() as u32, PixelFormat::GRAY16LE);
        {
            let mut typed = buf.typed_mut::<u16>().unwrap();
            for (y, row) in rows.iter().enumerate() {
                typed.row_mut(y as u32).copy_from_slice(row);
            }
        }
        buf
    }

    fn decode(path: &Path) -> (png::BitDepth, png::ColorType, Option<f32>, Vec<u8>) {
        let decoder = png::Decoder::new(BufReader::new(File::open(path).unwrap()));
        let mut reader = decoder.read_info().unwrap();
        let gamma = reader.info().source_gamma.map(|g| g.into_value());
        let mut data = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut data).unwrap();
        data.truncate(frame.buffer_size());
        (frame.bit_depth, frame.color_type, gamma, data)
    }

    #[test]
    fn writes_big_endian_with_gamma() {
        let dir = TempDir::new("png-gamma");
        let path = dir.path().join("depth000000.png");
        let buf = gray16(&[&[0x0102, 0xfffe]]);
        write_gray16_png(&buf.as_view(), &path, true, Some(DEPTH_PNG_GAMMA)).unwrap();

        let (depth, color, gamma, data) = decode(&path);
        assert_eq!(depth, png::BitDepth::Sixteen);
        assert_eq!(color, png::ColorType::Grayscale);
        assert_eq!(gamma, Some(34.0));
        assert_eq!(data, [0x01, 0x02, 0xff, 0xfe]);
    }

    #[test]
    fn bottom_line_first_reverses_rows() {
        let dir = TempDir::new("png-flip");
        let path = dir.path().join("flip.png");
        let buf = gray16(&[&[1, 1], &[2, 2], &[3, 3]]);
        write_gray16_png(&buf.as_view(), &path, false, None).unwrap();

        let img = image::open(&path).unwrap().into_luma16();
        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(img.get_pixel(0, 0).0, [3]);
        assert_eq!(img.get_pixel(1, 1).0, [2]);
        assert_eq!(img.get_pixel(0, 2).0, [1]);

        let (_, _, gamma, _) = decode(&path);
        assert_eq!(gamma, None);
    }

    #[test]
    fn rejects_float_input() {
        let dir = TempDir::new("png-reject");
        let path = dir.path().join("bad.png");
        let buf = ImageBuffer::new(2, 2, PixelFormat::GRAY32F);
        let err = write_gray16_png(&buf.as_view(), &path, true, None).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedFormat(_)));
        assert!(!path.exists());
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = TempDir::new("png-io");
        let buf = gray16(&[&[7]]);
        let path = dir.path().join("missing").join("depth.png");
        let err = write_gray16_png(&buf.as_view(), &path, true, None).unwrap_err();
        assert!(err.is_io());
    }
}
