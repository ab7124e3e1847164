//! Collaborator interfaces of the frame pipeline.
//!
//! The pipeline owns targets, buffers and file output; everything that puts
//! pixels into a target is behind one of these traits. Scene geometry comes
//! from a [`SceneRenderer`], reflective surfaces from a [`MirrorRenderer`],
//! and per-frame progress goes to a [`ProgressObserver`].

use std::io::{self, Write};

use crate::camera::Camera;
use crate::error::RenderResult;
use crate::target::{FrontFace, Pass};

/// Draws the scene into a bound target.
///
/// Implementations draw with the pass as they find it: the caller has set
/// the viewport, cleared the target and configured face culling. Renderers
/// that emit triangles must consult [`Pass::is_culled`].
pub trait SceneRenderer {
    /// Draw shaded color. Depth is tested and written as camera-space `z`.
    ///
    /// # Errors
    ///
    /// Implementation-defined; any error aborts the run.
    fn render(&self, pass: &mut Pass<'_>, camera: &Camera) -> RenderResult<()>;

    /// Draw depth only: the first color channel receives camera-space `z`
    /// multiplied by `depth_scale`, ready for quantization.
    ///
    /// # Errors
    ///
    /// Implementation-defined; any error aborts the run.
    fn render_depth(&self, pass: &mut Pass<'_>, camera: &Camera, depth_scale: f32)
    -> RenderResult<()>;
}

/// Planar reflections composited into the color pass.
///
/// Mirrors are addressed by index in list order. For each mirror the
/// pipeline first calls [`capture_reflection`](Self::capture_reflection),
/// which renders the scene from the mirrored viewpoint into storage owned by
/// the implementation, and then [`render`](Self::render) with the primary
/// color target bound.
pub trait MirrorRenderer {
    /// Number of mirror surfaces.
    fn mirror_count(&self) -> usize;

    /// Render the reflection seen in mirror `index`.
    ///
    /// `front_face` is the winding used by the primary pass; the reflected
    /// pass must invert it.
    ///
    /// # Errors
    ///
    /// Implementation-defined; any error aborts the run.
    fn capture_reflection(
        &mut self,
        index: usize,
        scene: &dyn SceneRenderer,
        camera: &Camera,
        front_face: FrontFace,
    ) -> RenderResult<()>;

    /// Composite the captured reflection of mirror `index` into `pass`,
    /// limited to the mirror's mask.
    ///
    /// # Errors
    ///
    /// Implementation-defined; any error aborts the run.
    fn render(&mut self, index: usize, pass: &mut Pass<'_>, camera: &Camera) -> RenderResult<()>;
}

/// A scene without mirrors.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMirrors;

impl MirrorRenderer for NoMirrors {
    fn mirror_count(&self) -> usize {
        0
    }

    fn capture_reflection(
        &mut self,
        _index: usize,
        _scene: &dyn SceneRenderer,
        _camera: &Camera,
        _front_face: FrontFace,
    ) -> RenderResult<()> {
        Ok(())
    }

    fn render(&mut self, _index: usize, _pass: &mut Pass<'_>, _camera: &Camera) -> RenderResult<()> {
        Ok(())
    }
}

/// Receives progress once per finished frame.
pub trait ProgressObserver {
    /// `completed` frames out of `total` are on disk.
    fn frame_done(&mut self, completed: usize, total: usize);

    /// Every frame has been written.
    fn finished(&mut self, total: usize);
}

/// Discards progress.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn frame_done(&mut self, _completed: usize, _total: usize) {}

    fn finished(&mut self, _total: usize) {}
}

/// Rewrites a single `Rendering frame i/N... ` line.
#[derive(Debug)]
pub struct ConsoleProgress<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleProgress {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressObserver for ConsoleProgress<W> {
    // Console write failures are ignored.
    fn frame_done(&mut self, completed: usize, total: usize) {
        let _ = write!(self.out, "\rRendering frame {completed}/{total}... ");
        let _ = self.out.flush();
    }

    fn finished(&mut self, total: usize) {
        let _ = writeln!(self.out, "\rRendering frame {total}/{total}... done");
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_progress_format() {
        let mut progress = ConsoleProgress::new(Vec::new());
        progress.frame_done(1, 2);
        progress.frame_done(2, 2);
        progress.finished(2);
        let text = String::from_utf8(progress.into_inner()).unwrap();
        assert_eq!(
            text,
            "\rRendering frame 1/2... \rRendering frame 2/2... \rRendering frame 2/2... done\n"
        );
    }

    #[test]
    fn no_mirrors_is_empty() {
        assert_eq!(NoMirrors.mirror_count(), 0);
    }
}
