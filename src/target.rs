//! Off-screen render targets.
//!
//! A [`RenderTarget`] pairs a float color attachment with an f32 depth
//! renderbuffer. Drawing happens through a [`Pass`], obtained from
//! [`RenderTarget::bind`]; the pass borrows the target mutably, so only one
//! target is bound at a time and the binding ends when the pass is dropped,
//! on every exit path.
//!
//! Renderers address pixels in image coordinates (row 0 at the top). Each
//! target also has a storage [`RowOrder`]: a bottom-up target keeps its rows
//! the way a GL texture does, and [`RenderTarget::download`] hands them out
//! in storage order.

use glam::DVec2;
use log::debug;

use crate::buffer::{BufferError, ImageBuffer};
use crate::error::{RenderError, RenderResult};
use crate::orientation::RowOrder;
use crate::pixel::{ChannelKind, PixelFormat};

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// Winding order of front-facing triangles as seen by the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FrontFace {
    /// Counter-clockwise on screen.
    #[default]
    Ccw,
    /// Clockwise on screen.
    Cw,
}

impl FrontFace {
    /// The opposite winding, for passes rendered through a reflection.
    pub fn inverted(self) -> Self {
        match self {
            Self::Ccw => Self::Cw,
            Self::Cw => Self::Ccw,
        }
    }

    /// Whether a triangle with screen-space vertices `p0, p1, p2` (pixel
    /// coordinates, y down) faces the camera.
    pub fn is_front(self, p0: DVec2, p1: DVec2, p2: DVec2) -> bool {
        // Cross product with y flipped so positive means counter-clockwise
        // as displayed.
        let e1 = p1 - p0;
        let e2 = p2 - p0;
        let ccw_area = e2.x * e1.y - e1.x * e2.y;
        match self {
            Self::Ccw => ccw_area > 0.0,
            Self::Cw => ccw_area < 0.0,
        }
    }
}

/// Face culling state of a pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    #[default]
    Disabled,
    /// Discard triangles that are not front-facing.
    Back(FrontFace),
}

/// Region of the target that fragments may touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Viewport covering a whole `width x height` target.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }
}

// ---------------------------------------------------------------------------
// RenderTarget
// ---------------------------------------------------------------------------

/// Creation parameters for a [`RenderTarget`].
#[derive(Clone, Debug, PartialEq)]
pub struct TargetDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Color attachment format; must have 32-bit float channels.
    pub format: PixelFormat,
    pub row_order: RowOrder,
}

impl TargetDescriptor {
    pub fn new(label: impl Into<String>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
            row_order: RowOrder::TopLineFirst,
        }
    }

    pub fn with_row_order(mut self, row_order: RowOrder) -> Self {
        self.row_order = row_order;
        self
    }
}

/// Color attachment plus depth renderbuffer.
pub struct RenderTarget {
    label: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    row_order: RowOrder,
    color: Vec<f32>,
    depth: Vec<f32>,
}

impl RenderTarget {
    /// Allocate a target. Attachments start cleared.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnsupportedFormat`] unless every channel of the
    /// format is a 32-bit float, and [`RenderError::Buffer`] for zero or
    /// overflowing dimensions.
    pub fn new(desc: TargetDescriptor) -> RenderResult<Self> {
        let format = desc.format;
        let all_f32 = (0..format.channels()).all(|c| format.channel_bits(c) == 32);
        if format.kind() != ChannelKind::Float || !all_f32 {
            return Err(RenderError::UnsupportedFormat(format!(
                "render target {:?} needs 32-bit float channels, got {}",
                desc.label, format
            )));
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(BufferError::InvalidDimensions.into());
        }
        let pixels = (desc.width as usize)
            .checked_mul(desc.height as usize)
            .ok_or(BufferError::InvalidDimensions)?;
        let samples = pixels
            .checked_mul(format.channels())
            .ok_or(BufferError::InvalidDimensions)?;
        debug!(
            "created render target {:?} {}x{} {} ({:?})",
            desc.label, desc.width, desc.height, format, desc.row_order
        );
        Ok(Self {
            label: desc.label,
            width: desc.width,
            height: desc.height,
            format,
            row_order: desc.row_order,
            color: vec![0.0; samples],
            depth: vec![f32::INFINITY; pixels],
        })
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    /// Bind the target for drawing. The binding lasts as long as the pass.
    pub fn bind(&mut self, viewport: Viewport) -> Pass<'_> {
        debug!("bind {:?}", self.label);
        let viewport = Viewport {
            x: viewport.x.min(self.width),
            y: viewport.y.min(self.height),
            width: viewport.width.min(self.width - viewport.x.min(self.width)),
            height: viewport.height.min(self.height - viewport.y.min(self.height)),
        };
        Pass {
            target: self,
            viewport,
            cull: CullMode::Disabled,
        }
    }

    #[inline]
    fn pixel_index(&self, x: u32, y: u32) -> usize {
        let row = self.row_order.storage_row(y, self.height);
        row as usize * self.width as usize + x as usize
    }

    /// Color of the pixel at image coordinates `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the target.
    pub fn color_at(&self, x: u32, y: u32) -> &[f32] {
        assert!(x < self.width && y < self.height, "({x}, {y}) outside target");
        let channels = self.format.channels();
        let start = self.pixel_index(x, y) * channels;
        &self.color[start..start + channels]
    }

    /// Depth renderbuffer value at image coordinates `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is outside the target.
    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        assert!(x < self.width && y < self.height, "({x}, {y}) outside target");
        self.depth[self.pixel_index(x, y)]
    }

    /// Copy the color attachment into `out`, storage row 0 first.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Buffer`] if `out` differs in size or format.
    pub fn download(&self, out: &mut ImageBuffer) -> RenderResult<()> {
        if out.width() != self.width || out.height() != self.height || out.format() != self.format
        {
            return Err(BufferError::FormatMismatch.into());
        }
        let row_len = self.width as usize * self.format.channels();
        let mut rows = out.typed_mut::<f32>()?;
        for (y, src) in self.color.chunks_exact(row_len).enumerate() {
            rows.row_mut(y as u32).copy_from_slice(src);
        }
        debug!("downloaded {:?} ({:?})", self.label, self.row_order);
        Ok(())
    }
}

impl core::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "RenderTarget({:?}, {}x{}, {}, {:?})",
            self.label, self.width, self.height, self.format, self.row_order
        )
    }
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

/// A bound render target.
pub struct Pass<'t> {
    target: &'t mut RenderTarget,
    viewport: Viewport,
    cull: CullMode,
}

impl Pass<'_> {
    #[inline]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Channels per color sample of the bound target.
    #[inline]
    pub fn channels(&self) -> usize {
        self.target.format.channels()
    }

    pub fn label(&self) -> &str {
        &self.target.label
    }

    /// Clear color to zero and depth to +∞ inside the viewport.
    pub fn clear(&mut self) {
        let channels = self.channels();
        let vp = self.viewport;
        for y in vp.y..vp.y + vp.height {
            for x in vp.x..vp.x + vp.width {
                let i = self.target.pixel_index(x, y);
                self.target.depth[i] = f32::INFINITY;
                self.target.color[i * channels..(i + 1) * channels].fill(0.0);
            }
        }
    }

    pub fn enable_culling(&mut self, front_face: FrontFace) {
        self.cull = CullMode::Back(front_face);
    }

    pub fn disable_culling(&mut self) {
        self.cull = CullMode::Disabled;
    }

    #[inline]
    pub fn cull_mode(&self) -> CullMode {
        self.cull
    }

    /// Whether the triangle `p0, p1, p2` would be discarded by face culling.
    pub fn is_culled(&self, p0: DVec2, p1: DVec2, p2: DVec2) -> bool {
        match self.cull {
            CullMode::Disabled => false,
            CullMode::Back(front) => !front.is_front(p0, p1, p2),
        }
    }

    /// Depth-tested write. Returns `true` if the fragment landed.
    ///
    /// Fragments outside the viewport, or not strictly nearer than the
    /// stored depth, are discarded. Extra color components are ignored and
    /// missing ones left unchanged.
    pub fn write_fragment(&mut self, x: u32, y: u32, depth: f32, color: &[f32]) -> bool {
        if !self.viewport.contains(x, y) {
            return false;
        }
        let i = self.target.pixel_index(x, y);
        if !(depth < self.target.depth[i]) {
            return false;
        }
        self.target.depth[i] = depth;
        let channels = self.channels();
        let dst = &mut self.target.color[i * channels..(i + 1) * channels];
        for (d, &s) in dst.iter_mut().zip(color) {
            *d = s;
        }
        true
    }

    /// Alpha-blend `color` over the stored color, with no depth test.
    pub fn blend_fragment(&mut self, x: u32, y: u32, color: &[f32], alpha: f32) {
        if !self.viewport.contains(x, y) {
            return;
        }
        let i = self.target.pixel_index(x, y);
        let channels = self.channels();
        let dst = &mut self.target.color[i * channels..(i + 1) * channels];
        for (d, &s) in dst.iter_mut().zip(color) {
            *d = *d * (1.0 - alpha) + s * alpha;
        }
    }

    /// Stored depth at `(x, y)`.
    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.target.depth_at(x, y)
    }

    /// Stored color at `(x, y)`.
    pub fn color_at(&self, x: u32, y: u32) -> &[f32] {
        self.target.color_at(x, y)
    }
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        if self.cull != CullMode::Disabled {
            debug!("{:?}: culling still enabled at unbind", self.target.label);
        }
        debug!("unbind {:?}", self.target.label);
    }
}
