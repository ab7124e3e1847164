//! Run configuration.
//!
//! [`RenderConfig`] collects everything the frame pipeline needs besides its
//! collaborators. Build it with the `with_*` methods and call
//! [`RenderConfig::validate`] (the pipeline does) before allocating targets.

use std::path::{Path, PathBuf};

use crate::camera::Intrinsics;
use crate::error::{RenderError, RenderResult};
use crate::quantize::OverflowPolicy;
use crate::target::FrontFace;

/// Depth scale used when none is configured: 0.1 mm per depth unit.
pub const DEFAULT_DEPTH_SCALE: f32 = 65535.0 * 0.1;

/// Largest accepted target width or height when none is configured.
pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

/// Settings for one rendering run.
///
/// # Example
///
/// ```
/// use trajectory_render::{Intrinsics, RenderConfig};
///
/// let config = RenderConfig::new()
///     .with_intrinsics(Intrinsics::new(1280, 720, 600.0, 600.0, 640.0, 360.0))
///     .with_depth_scale(1000.0)
///     .with_output_dir("out");
/// assert_eq!(config.width(), 1280);
/// config.validate().unwrap();
/// ```
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct RenderConfig {
    /// Camera intrinsics; also fixes the target size.
    pub intrinsics: Intrinsics,
    /// Multiplier from camera-space depth to 16-bit depth units.
    pub depth_scale: f32,
    /// Whether to run the depth pass and write depth PNGs.
    pub render_depth: bool,
    /// Near clip distance.
    pub near: f64,
    /// Far clip distance.
    pub far: f64,
    /// Winding of front faces in the primary passes.
    pub front_face: FrontFace,
    /// Directory receiving the frame files.
    pub output_dir: PathBuf,
    /// What the quantizer does with depth beyond 65535.
    pub overflow: OverflowPolicy,
    /// Largest accepted width or height.
    pub max_dimension: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            intrinsics: Intrinsics::default(),
            depth_scale: DEFAULT_DEPTH_SCALE,
            render_depth: true,
            near: 0.1,
            far: 100.0,
            front_face: FrontFace::Ccw,
            output_dir: PathBuf::from("."),
            overflow: OverflowPolicy::Wrap,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intrinsics(mut self, intrinsics: Intrinsics) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    pub fn with_depth_scale(mut self, scale: f32) -> Self {
        self.depth_scale = scale;
        self
    }

    pub fn with_render_depth(mut self, enabled: bool) -> Self {
        self.render_depth = enabled;
        self
    }

    /// Set near and far clip distances.
    pub fn with_clip(mut self, near: f64, far: f64) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn with_front_face(mut self, front_face: FrontFace) -> Self {
        self.front_face = front_face;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }

    /// Target width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.intrinsics.width()
    }

    /// Target height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.intrinsics.height()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    // --- Validation ---

    /// Check `width x height` against `max_dimension`.
    ///
    /// # Errors
    ///
    /// [`RenderError::Config`] for a zero or oversize dimension.
    pub fn check_dimensions(&self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::Config(format!(
                "image size {width}x{height} is empty"
            )));
        }
        let max = self.max_dimension;
        if width > max {
            return Err(RenderError::Config(format!(
                "width {width} exceeds limit {max}"
            )));
        }
        if height > max {
            return Err(RenderError::Config(format!(
                "height {height} exceeds limit {max}"
            )));
        }
        Ok(())
    }

    /// Reject settings no run could succeed with.
    ///
    /// # Errors
    ///
    /// [`RenderError::Config`] naming the first offending setting.
    pub fn validate(&self) -> RenderResult<()> {
        self.check_dimensions(self.width(), self.height())?;
        if !(self.depth_scale.is_finite() && self.depth_scale > 0.0) {
            return Err(RenderError::Config(format!(
                "depth scale {} must be positive and finite",
                self.depth_scale
            )));
        }
        if !(self.near > 0.0 && self.far > self.near && self.far.is_finite()) {
            return Err(RenderError::Config(format!(
                "clip range [{}, {}] is invalid",
                self.near, self.far
            )));
        }
        Ok(())
    }
}
