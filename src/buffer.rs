//! Scanline buffers.
//!
//! An image is stored row-major with an explicit row pitch in bytes. The
//! pitch may exceed `width * bytes_per_pixel`; bytes past the pixel data in
//! each row are padding with no defined content.
//!
//! [`ImageBuffer`] owns its storage and is allocated once, then overwritten
//! in place. [`ImageView`] and [`ImageViewMut`] borrow it. A view can be
//! reinterpreted as a [`TypedView`] of plain elements (`f32`, `u16`, ...)
//! over the same bytes without copying.

use core::fmt;

use bytemuck::Pod;
use imgref::ImgRef;
use rgb::{Rgb, Rgba};

use crate::orientation::RowOrder;
use crate::pixel::PixelFormat;

// ---------------------------------------------------------------------------
// BufferError
// ---------------------------------------------------------------------------

/// Errors from scanline buffer operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum BufferError {
    /// Data pointer or pitch is not aligned for the element type.
    AlignmentViolation,
    /// Data slice is too small for the given dimensions and pitch.
    InsufficientData,
    /// Pitch is smaller than `width * bytes_per_pixel`.
    StrideTooSmall,
    /// Width or height causes overflow.
    InvalidDimensions,
    /// Row size is not a whole number of elements of the requested type.
    ElementSizeMismatch,
    /// Source and destination differ in dimensions or pixel format.
    FormatMismatch,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlignmentViolation => write!(f, "data is not aligned for the element type"),
            Self::InsufficientData => {
                write!(f, "data slice is too small for the given dimensions")
            }
            Self::StrideTooSmall => write!(f, "stride is smaller than width * bytes_per_pixel"),
            Self::InvalidDimensions => write!(f, "width or height causes overflow"),
            Self::ElementSizeMismatch => {
                write!(f, "row size is not a multiple of the element size")
            }
            Self::FormatMismatch => write!(f, "dimensions or pixel format do not match"),
        }
    }
}

impl std::error::Error for BufferError {}

// ---------------------------------------------------------------------------
// ImageView (borrowed, immutable)
// ---------------------------------------------------------------------------

/// Borrowed view of scanline data.
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    pitch: usize,
    format: PixelFormat,
}

impl<'a> ImageView<'a> {
    /// Create a new view with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is too small, the pitch is too small,
    /// or the data is not aligned for the pixel format's channels.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        pitch: usize,
        format: PixelFormat,
    ) -> Result<Self, BufferError> {
        let row_bytes = row_bytes(width, format)?;
        if pitch < row_bytes {
            return Err(BufferError::StrideTooSmall);
        }
        if height > 0 {
            let required = required_bytes(height, pitch, row_bytes)?;
            if data.len() < required {
                return Err(BufferError::InsufficientData);
            }
        }
        if !(data.as_ptr() as usize).is_multiple_of(format.min_alignment()) {
            return Err(BufferError::AlignmentViolation);
        }
        Ok(Self {
            data,
            width,
            height,
            pitch,
            format,
        })
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte distance between row starts.
    #[inline]
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Underlying bytes, starting at the first pixel of row 0.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Pixel bytes for row `y` (no padding, exactly `width * bpp` bytes).
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u8] {
        assert!(
            y < self.height,
            "row index {y} out of bounds (height: {})",
            self.height
        );
        let data: &'a [u8] = self.data;
        let start = y as usize * self.pitch;
        let len = self.width as usize * self.format.bytes_per_pixel();
        &data[start..start + len]
    }

    /// Bytes of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &'a [u8] {
        assert!(x < self.width, "column {x} out of bounds (width: {})", self.width);
        let bpp = self.format.bytes_per_pixel();
        let start = x as usize * bpp;
        &self.row(y)[start..start + bpp]
    }

    /// Reinterpret the pixel bytes as rows of `T` without copying.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::ElementSizeMismatch`] when the row size or pitch
    /// is not a whole number of `T`, and [`BufferError::AlignmentViolation`]
    /// when the storage is not aligned for `T`.
    pub fn reinterpret<T: Pod>(&self) -> Result<TypedView<'a, T>, BufferError> {
        let (pitch, row_len) = element_layout::<T>(self.width, self.pitch, self.format)?;
        let data: &'a [u8] = self.data;
        let bytes = &data[..used_bytes(self.height, self.pitch, self.width, self.format)];
        let elements = bytemuck::try_cast_slice::<u8, T>(bytes).map_err(cast_error)?;
        Ok(TypedView {
            elements,
            width: self.width,
            height: self.height,
            pitch,
            row_len,
        })
    }

    /// Copy into a new, tightly-packed buffer with the rows in reverse order.
    pub fn to_flipped(&self) -> ImageBuffer {
        self.to_buffer_ordered(RowOrder::BottomLineFirst)
    }

    /// Copy into a new, tightly-packed buffer.
    pub fn to_buffer(&self) -> ImageBuffer {
        self.to_buffer_ordered(RowOrder::TopLineFirst)
    }

    fn to_buffer_ordered(&self, order: RowOrder) -> ImageBuffer {
        let mut dst = ImageBuffer::new(self.width, self.height, self.format);
        for y in 0..self.height {
            let src_row = self.row(order.storage_row(y, self.height));
            dst.row_mut(y).copy_from_slice(src_row);
        }
        dst
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ImageView({}x{}, {}, pitch {})",
            self.width, self.height, self.format, self.pitch
        )
    }
}

// ---------------------------------------------------------------------------
// ImageViewMut (borrowed, mutable)
// ---------------------------------------------------------------------------

/// Mutable borrowed view of scanline data.
pub struct ImageViewMut<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    pitch: usize,
    format: PixelFormat,
}

impl<'a> ImageViewMut<'a> {
    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte distance between row starts.
    #[inline]
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Mutable pixel bytes for row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(
            y < self.height,
            "row index {y} out of bounds (height: {})",
            self.height
        );
        let start = y as usize * self.pitch;
        let len = self.width as usize * self.format.bytes_per_pixel();
        &mut self.data[start..start + len]
    }

    /// Reinterpret the pixel bytes as mutable rows of `T` without copying.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ImageView::reinterpret`].
    pub fn reinterpret_mut<T: Pod>(self) -> Result<TypedViewMut<'a, T>, BufferError> {
        let (pitch, row_len) = element_layout::<T>(self.width, self.pitch, self.format)?;
        let used = used_bytes(self.height, self.pitch, self.width, self.format);
        let elements =
            bytemuck::try_cast_slice_mut::<u8, T>(&mut self.data[..used]).map_err(cast_error)?;
        Ok(TypedViewMut {
            elements,
            width: self.width,
            height: self.height,
            pitch,
            row_len,
        })
    }
}

impl fmt::Debug for ImageViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ImageViewMut({}x{}, {}, pitch {})",
            self.width, self.height, self.format, self.pitch
        )
    }
}

// ---------------------------------------------------------------------------
// TypedView / TypedViewMut
// ---------------------------------------------------------------------------

/// Rows of plain elements aliasing a scanline buffer's bytes.
///
/// Borrowed from the owning buffer, so it cannot outlive it.
pub struct TypedView<'a, T> {
    elements: &'a [T],
    width: u32,
    height: u32,
    /// Row pitch in elements.
    pitch: usize,
    /// Elements of pixel data per row.
    row_len: usize,
}

impl<'a, T> TypedView<'a, T> {
    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Elements of row `y`, padding excluded.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [T] {
        assert!(
            y < self.height,
            "row index {y} out of bounds (height: {})",
            self.height
        );
        let elements: &'a [T] = self.elements;
        let start = y as usize * self.pitch;
        &elements[start..start + self.row_len]
    }

    /// Iterate rows top to bottom in storage order.
    pub fn rows(&self) -> impl Iterator<Item = &'a [T]> + '_ {
        (0..self.height).map(move |y| self.row(y))
    }
}

impl<T> fmt::Debug for TypedView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TypedView<{}>({}x{}, pitch {})",
            core::any::type_name::<T>(),
            self.width,
            self.height,
            self.pitch
        )
    }
}

/// Mutable rows of plain elements aliasing a scanline buffer's bytes.
pub struct TypedViewMut<'a, T> {
    elements: &'a mut [T],
    width: u32,
    height: u32,
    pitch: usize,
    row_len: usize,
}

impl<T> TypedViewMut<'_, T> {
    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Elements of row `y`, padding excluded.
    #[inline]
    pub fn row(&self, y: u32) -> &[T] {
        assert!(y < self.height, "row index {y} out of bounds");
        let start = y as usize * self.pitch;
        &self.elements[start..start + self.row_len]
    }

    /// Mutable elements of row `y`, padding excluded.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [T] {
        assert!(
            y < self.height,
            "row index {y} out of bounds (height: {})",
            self.height
        );
        let start = y as usize * self.pitch;
        &mut self.elements[start..start + self.row_len]
    }
}

impl<T> fmt::Debug for TypedViewMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TypedViewMut<{}>({}x{}, pitch {})",
            core::any::type_name::<T>(),
            self.width,
            self.height,
            self.pitch
        )
    }
}

// ---------------------------------------------------------------------------
// ImageBuffer (owned)
// ---------------------------------------------------------------------------

/// Owned scanline buffer.
///
/// Wraps a `Vec<u8>` with an alignment offset so that rows start aligned
/// for the widest channel. Allocate once and overwrite with
/// [`copy_from`](Self::copy_from) to avoid per-frame allocation.
pub struct ImageBuffer {
    data: Vec<u8>,
    /// Byte offset from `data` start to the first aligned pixel.
    offset: usize,
    width: u32,
    height: u32,
    pitch: usize,
    format: PixelFormat,
}

impl ImageBuffer {
    /// Allocate a zero-filled, tightly-packed buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let pitch = format.aligned_pitch(width);
        Self::allocate(width, height, pitch, format)
    }

    /// Allocate a zero-filled buffer with an explicit row pitch, e.g. to
    /// match a download alignment.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::StrideTooSmall`] if `pitch` cannot hold a row and
    /// [`BufferError::AlignmentViolation`] if it breaks channel alignment.
    pub fn with_pitch(
        width: u32,
        height: u32,
        pitch: usize,
        format: PixelFormat,
    ) -> Result<Self, BufferError> {
        if pitch < row_bytes(width, format)? {
            return Err(BufferError::StrideTooSmall);
        }
        if !pitch.is_multiple_of(format.min_alignment()) {
            return Err(BufferError::AlignmentViolation);
        }
        pitch
            .checked_mul(height as usize)
            .ok_or(BufferError::InvalidDimensions)?;
        Ok(Self::allocate(width, height, pitch, format))
    }

    fn allocate(width: u32, height: u32, pitch: usize, format: PixelFormat) -> Self {
        let total = pitch * height as usize;
        let align = format.min_alignment();
        let data = vec![0u8; total + align - 1];
        let offset = align_offset(data.as_ptr(), align);
        Self {
            data,
            offset,
            width,
            height,
            pitch,
            format,
        }
    }

    /// Wrap an existing `Vec<u8>` of tightly-packed rows.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InsufficientData`] if the vec is too small and
    /// [`BufferError::AlignmentViolation`] if it is not aligned for the format.
    pub fn from_vec(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self, BufferError> {
        let pitch = format.aligned_pitch(width);
        let total = pitch
            .checked_mul(height as usize)
            .ok_or(BufferError::InvalidDimensions)?;
        if data.len() < total {
            return Err(BufferError::InsufficientData);
        }
        if !(data.as_ptr() as usize).is_multiple_of(format.min_alignment()) {
            return Err(BufferError::AlignmentViolation);
        }
        Ok(Self {
            data,
            offset: 0,
            width,
            height,
            pitch,
            format,
        })
    }

    /// Consume the buffer and return its rows as a `Vec<u8>`.
    ///
    /// The alignment prefix and trailing slack are cut off, so the vec holds
    /// exactly `pitch * height` bytes starting at row 0. Padding inside rows
    /// is kept.
    pub fn into_vec(mut self) -> Vec<u8> {
        let total = self.pitch * self.height as usize;
        self.data.truncate(self.offset + total);
        self.data.drain(..self.offset);
        self.data
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Byte distance between row starts.
    #[inline]
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Borrow the full buffer as an [`ImageView`].
    pub fn as_view(&self) -> ImageView<'_> {
        let total = self.pitch * self.height as usize;
        ImageView {
            data: &self.data[self.offset..self.offset + total],
            width: self.width,
            height: self.height,
            pitch: self.pitch,
            format: self.format,
        }
    }

    /// Borrow the full buffer as an [`ImageViewMut`].
    pub fn as_view_mut(&mut self) -> ImageViewMut<'_> {
        let total = self.pitch * self.height as usize;
        let offset = self.offset;
        ImageViewMut {
            data: &mut self.data[offset..offset + total],
            width: self.width,
            height: self.height,
            pitch: self.pitch,
            format: self.format,
        }
    }

    /// Pixel bytes for row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(
            y < self.height,
            "row index {y} out of bounds (height: {})",
            self.height
        );
        let start = self.offset + y as usize * self.pitch;
        let len = self.width as usize * self.format.bytes_per_pixel();
        &self.data[start..start + len]
    }

    /// Mutable pixel bytes for row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(
            y < self.height,
            "row index {y} out of bounds (height: {})",
            self.height
        );
        let start = self.offset + y as usize * self.pitch;
        let len = self.width as usize * self.format.bytes_per_pixel();
        &mut self.data[start..start + len]
    }

    /// Typed rows over this buffer's bytes.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ImageView::reinterpret`].
    pub fn typed<T: Pod>(&self) -> Result<TypedView<'_, T>, BufferError> {
        self.as_view().reinterpret()
    }

    /// Mutable typed rows over this buffer's bytes.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ImageView::reinterpret`].
    pub fn typed_mut<T: Pod>(&mut self) -> Result<TypedViewMut<'_, T>, BufferError> {
        self.as_view_mut().reinterpret_mut()
    }

    /// Overwrite this buffer's pixels from `src`, row by row. Padding bytes
    /// are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::FormatMismatch`] if dimensions or format differ.
    pub fn copy_from(&mut self, src: &ImageView<'_>) -> Result<(), BufferError> {
        if src.width != self.width || src.height != self.height || src.format != self.format {
            return Err(BufferError::FormatMismatch);
        }
        for y in 0..self.height {
            self.row_mut(y).copy_from_slice(src.row(y));
        }
        Ok(())
    }
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ImageBuffer({}x{}, {}, pitch {})",
            self.width, self.height, self.format, self.pitch
        )
    }
}

// ---------------------------------------------------------------------------
// ImgRef → ImageView (zero-copy From impls)
// ---------------------------------------------------------------------------

macro_rules! impl_from_imgref_pixels {
    ($pixel:ty, $format:expr) => {
        impl<'a> From<ImgRef<'a, $pixel>> for ImageView<'a> {
            fn from(img: ImgRef<'a, $pixel>) -> Self {
                use rgb::ComponentBytes;
                let bytes = img.buf().as_bytes();
                let pitch = img.stride() * core::mem::size_of::<$pixel>();
                ImageView {
                    data: bytes,
                    width: img.width() as u32,
                    height: img.height() as u32,
                    pitch,
                    format: $format,
                }
            }
        }
    };
}

macro_rules! impl_from_imgref_scalar {
    ($scalar:ty, $format:expr) => {
        impl<'a> From<ImgRef<'a, $scalar>> for ImageView<'a> {
            fn from(img: ImgRef<'a, $scalar>) -> Self {
                let bytes: &'a [u8] = bytemuck::cast_slice(img.buf());
                let pitch = img.stride() * core::mem::size_of::<$scalar>();
                ImageView {
                    data: bytes,
                    width: img.width() as u32,
                    height: img.height() as u32,
                    pitch,
                    format: $format,
                }
            }
        }
    };
}

impl_from_imgref_pixels!(Rgb<f32>, PixelFormat::RGB96F);
impl_from_imgref_pixels!(Rgba<f32>, PixelFormat::RGBA128F);
impl_from_imgref_pixels!(Rgb<u8>, PixelFormat::RGB24);
impl_from_imgref_pixels!(Rgba<u8>, PixelFormat::RGBA32);
impl_from_imgref_scalar!(f32, PixelFormat::GRAY32F);
impl_from_imgref_scalar!(u16, PixelFormat::GRAY16LE);
impl_from_imgref_scalar!(u8, PixelFormat::GRAY8);

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Compute the byte offset needed to align `ptr` to `align`.
fn align_offset(ptr: *const u8, align: usize) -> usize {
    let addr = ptr as usize;
    ((addr + align - 1) & !(align - 1)) - addr
}

fn row_bytes(width: u32, format: PixelFormat) -> Result<usize, BufferError> {
    (width as usize)
        .checked_mul(format.bytes_per_pixel())
        .ok_or(BufferError::InvalidDimensions)
}

/// Minimum bytes needed: `(rows - 1) * pitch + row_bytes`.
fn required_bytes(rows: u32, pitch: usize, row_bytes: usize) -> Result<usize, BufferError> {
    let preceding = (rows as usize - 1)
        .checked_mul(pitch)
        .ok_or(BufferError::InvalidDimensions)?;
    preceding
        .checked_add(row_bytes)
        .ok_or(BufferError::InvalidDimensions)
}

/// Bytes actually addressed by a validated view.
fn used_bytes(height: u32, pitch: usize, width: u32, format: PixelFormat) -> usize {
    if height == 0 {
        return 0;
    }
    (height as usize - 1) * pitch + width as usize * format.bytes_per_pixel()
}

/// Pitch and row length in elements of `T`.
fn element_layout<T>(
    width: u32,
    pitch: usize,
    format: PixelFormat,
) -> Result<(usize, usize), BufferError> {
    let size = core::mem::size_of::<T>();
    let row = width as usize * format.bytes_per_pixel();
    if size == 0 || !row.is_multiple_of(size) || !pitch.is_multiple_of(size) {
        return Err(BufferError::ElementSizeMismatch);
    }
    Ok((pitch / size, row / size))
}

fn cast_error(err: bytemuck::PodCastError) -> BufferError {
    match err {
        bytemuck::PodCastError::TargetAlignmentGreaterAndInputNotAligned => {
            BufferError::AlignmentViolation
        }
        _ => BufferError::ElementSizeMismatch,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_rows(buf: &mut ImageBuffer) {
        for y in 0..buf.height() {
            for (i, byte) in buf.row_mut(y).iter_mut().enumerate() {
                *byte = (y * 100 + i as u32) as u8;
            }
        }
    }

    #[test]
    fn new_buffer_is_tight_and_zeroed() {
        let buf = ImageBuffer::new(10, 5, PixelFormat::RGB96F);
        assert_eq!(buf.width(), 10);
        assert_eq!(buf.height(), 5);
        assert_eq!(buf.pitch(), 120);
        assert_eq!(buf.format(), PixelFormat::RGB96F);
        assert!(buf.row(4).iter().all(|&b| b == 0));
    }

    #[test]
    fn padded_pitch_rows_exclude_padding() {
        let mut buf = ImageBuffer::with_pitch(3, 2, 12, PixelFormat::RGB24).unwrap();
        assert_eq!(buf.pitch(), 12);
        assert_eq!(buf.row(0).len(), 9);
        buf.row_mut(1).fill(7);
        let view = buf.as_view();
        assert_eq!(view.row(1), &[7u8; 9]);
        assert_eq!(view.row(0), &[0u8; 9]);
    }

    #[test]
    fn with_pitch_validation() {
        assert_eq!(
            ImageBuffer::with_pitch(4, 1, 8, PixelFormat::RGB24).unwrap_err(),
            BufferError::StrideTooSmall
        );
        assert_eq!(
            ImageBuffer::with_pitch(1, 1, 14, PixelFormat::RGB96F).unwrap_err(),
            BufferError::AlignmentViolation
        );
    }

    #[test]
    fn from_vec_too_small() {
        let err = ImageBuffer::from_vec(vec![0u8; 10], 10, 5, PixelFormat::RGB24);
        assert_eq!(err.unwrap_err(), BufferError::InsufficientData);
    }

    #[test]
    fn from_vec_into_vec_round_trip() {
        let buf = ImageBuffer::from_vec(vec![3u8; 12], 2, 2, PixelFormat::RGB24).unwrap();
        assert_eq!(buf.row(1), &[3, 3, 3, 3, 3, 3]);
        assert_eq!(buf.into_vec().len(), 12);
    }

    #[test]
    fn into_vec_starts_at_first_row() {
        let mut buf = ImageBuffer::new(3, 2, PixelFormat::GRAY32F);
        fill_rows(&mut buf);
        let rows: Vec<u8> = (0..2).flat_map(|y| buf.row(y).to_vec()).collect();
        let data = buf.into_vec();
        assert_eq!(data, rows);

        let mut buf = ImageBuffer::new(2, 2, PixelFormat::RGB24);
        fill_rows(&mut buf);
        let data = buf.into_vec();
        let rebuilt = ImageBuffer::from_vec(data, 2, 2, PixelFormat::RGB24).unwrap();
        assert_eq!(rebuilt.row(0), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(rebuilt.row(1), &[100, 101, 102, 103, 104, 105]);
    }

    #[test]
    fn typed_views_are_debug() {
        let mut buf = ImageBuffer::new(2, 1, PixelFormat::GRAY16LE);
        let typed = buf.typed::<u16>().unwrap();
        assert_eq!(format!("{typed:?}"), "TypedView<u16>(2x1, pitch 2)");
        let typed = buf.typed_mut::<u16>().unwrap();
        assert_eq!(format!("{typed:?}"), "TypedViewMut<u16>(2x1, pitch 2)");
    }

    #[test]
    fn view_validation() {
        let data = [0u8; 100];
        assert_eq!(
            ImageView::new(&data, 10, 1, 2, PixelFormat::RGB24).unwrap_err(),
            BufferError::StrideTooSmall
        );
        assert_eq!(
            ImageView::new(&data[..10], 10, 1, 30, PixelFormat::RGB24).unwrap_err(),
            BufferError::InsufficientData
        );
        let empty = ImageView::new(&data[..0], 10, 0, 30, PixelFormat::RGB24).unwrap();
        assert_eq!(empty.height(), 0);
    }

    #[test]
    fn last_row_may_omit_padding() {
        // Two rows of 2 RGB24 pixels with pitch 8: 8 + 6 bytes suffice.
        let data = [1u8; 14];
        let view = ImageView::new(&data, 2, 2, 8, PixelFormat::RGB24).unwrap();
        assert_eq!(view.row(1).len(), 6);
    }

    #[test]
    fn pixel_access() {
        let mut buf = ImageBuffer::new(2, 2, PixelFormat::RGB24);
        fill_rows(&mut buf);
        let view = buf.as_view();
        assert_eq!(view.pixel(1, 1), &[103, 104, 105]);
    }

    #[test]
    fn reinterpret_as_f32() {
        let mut buf = ImageBuffer::new(2, 2, PixelFormat::RGB96F);
        {
            let mut typed = buf.typed_mut::<f32>().unwrap();
            typed.row_mut(1).copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        }
        let typed = buf.typed::<f32>().unwrap();
        assert_eq!(typed.width(), 2);
        assert_eq!(typed.row(0), &[0.0; 6]);
        assert_eq!(typed.row(1)[5], 6.0);
        assert_eq!(typed.rows().count(), 2);
    }

    #[test]
    fn reinterpret_respects_padding() {
        let mut buf = ImageBuffer::with_pitch(1, 3, 8, PixelFormat::GRAY32F).unwrap();
        {
            let mut typed = buf.typed_mut::<f32>().unwrap();
            for y in 0..3 {
                typed.row_mut(y)[0] = y as f32 + 0.5;
            }
        }
        let typed = buf.typed::<f32>().unwrap();
        let values: Vec<f32> = typed.rows().map(|r| r[0]).collect();
        assert_eq!(values, vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn reinterpret_rejects_partial_elements() {
        let buf = ImageBuffer::new(3, 1, PixelFormat::RGB24);
        assert_eq!(
            buf.typed::<u16>().unwrap_err(),
            BufferError::ElementSizeMismatch
        );
        assert!(buf.typed::<u8>().is_ok());
    }

    #[test]
    fn reinterpret_rejects_misaligned_storage() {
        let words = [0u32; 4];
        let bytes: &[u8] = bytemuck::cast_slice(&words);
        let view = ImageView::new(&bytes[1..], 1, 1, 4, PixelFormat::RGBA32).unwrap();
        assert_eq!(
            view.reinterpret::<u32>().unwrap_err(),
            BufferError::AlignmentViolation
        );
    }

    #[test]
    fn flipped_copy_reverses_rows() {
        let mut buf = ImageBuffer::with_pitch(2, 3, 8, PixelFormat::RGB24).unwrap();
        fill_rows(&mut buf);
        let flipped = buf.as_view().to_flipped();
        assert_eq!(flipped.pitch(), 6);
        assert_eq!(flipped.row(0), buf.row(2));
        assert_eq!(flipped.row(1), buf.row(1));
        assert_eq!(flipped.row(2), buf.row(0));
    }

    #[test]
    fn copy_from_overwrites_in_place() {
        let mut src = ImageBuffer::new(2, 2, PixelFormat::RGB24);
        fill_rows(&mut src);
        let mut dst = ImageBuffer::with_pitch(2, 2, 16, PixelFormat::RGB24).unwrap();
        dst.copy_from(&src.as_view()).unwrap();
        assert_eq!(dst.row(1), src.row(1));
        assert_eq!(dst.pitch(), 16);

        let mut other = ImageBuffer::new(2, 3, PixelFormat::RGB24);
        assert_eq!(
            other.copy_from(&src.as_view()).unwrap_err(),
            BufferError::FormatMismatch
        );
    }

    #[test]
    fn imgref_rgb_f32_with_stride() {
        let mut pixels = vec![Rgb::new(0.0f32, 0.0, 0.0); 6];
        pixels[0] = Rgb::new(1.0, 2.0, 3.0);
        pixels[4] = Rgb::new(4.0, 5.0, 6.0);
        let img = imgref::Img::new_stride(pixels.as_slice(), 2, 2, 3);
        let view: ImageView<'_> = img.into();
        assert_eq!(view.format(), PixelFormat::RGB96F);
        assert_eq!(view.pitch(), 36);
        let typed = view.reinterpret::<f32>().unwrap();
        assert_eq!(&typed.row(0)[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&typed.row(1)[3..], &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn imgref_gray16() {
        let pixels = vec![1000u16, 2000];
        let img = imgref::Img::new(pixels.as_slice(), 2, 1);
        let view: ImageView<'_> = img.into();
        assert_eq!(view.format(), PixelFormat::GRAY16LE);
        let row = view.row(0);
        assert_eq!(u16::from_ne_bytes([row[2], row[3]]), 2000);
    }

    #[test]
    fn debug_formats() {
        let mut buf = ImageBuffer::new(10, 5, PixelFormat::RGB96F);
        assert_eq!(format!("{buf:?}"), "ImageBuffer(10x5, RGB96F, pitch 120)");
        assert_eq!(
            format!("{:?}", buf.as_view()),
            "ImageView(10x5, RGB96F, pitch 120)"
        );
        assert_eq!(
            format!("{:?}", buf.as_view_mut()),
            "ImageViewMut(10x5, RGB96F, pitch 120)"
        );
    }

    #[test]
    fn zero_size_buffer() {
        let buf = ImageBuffer::new(0, 0, PixelFormat::RGB96F);
        assert_eq!(buf.as_view().height(), 0);
        assert_eq!(buf.as_view().to_flipped().height(), 0);
    }
}
