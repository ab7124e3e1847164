//! Frame orchestration.
//!
//! [`FrameOrchestrator`] owns the render targets and download buffers and
//! drives one frame per trajectory pose:
//!
//! 1. color pass: clear, cull, scene, uncull
//! 2. per mirror, in list order: capture the reflection, then composite it
//!    into the color target
//! 3. download color and write `frameNNNNNN.exr` (RGB96F, top line first)
//! 4. depth pass into the bottom-up depth target, download, quantize and
//!    write `depthNNNNNN.png` flipped with a gAMA of 34
//! 5. report progress
//!
//! Any error stops the run. Frames completed before it stay on disk.

use std::path::Path;

use glam::DVec3;
use log::{debug, info};

use crate::buffer::ImageBuffer;
use crate::camera::{Camera, CameraPose};
use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::exr_write::export_exr;
use crate::format::{OutputFormat, frame_path};
use crate::orientation::RowOrder;
use crate::output::{FrameOutputs, RunSummary};
use crate::pixel::PixelFormat;
use crate::png_write::{DEPTH_PNG_GAMMA, write_gray16_png};
use crate::quantize::DepthQuantizer;
use crate::target::{RenderTarget, TargetDescriptor, Viewport};
use crate::traits::{MirrorRenderer, ProgressObserver, SceneRenderer};

/// Renders a trajectory to color and depth images.
pub struct FrameOrchestrator<S, M, P> {
    config: RenderConfig,
    scene: S,
    mirrors: M,
    progress: P,
    quantizer: DepthQuantizer,
    color_target: RenderTarget,
    depth_target: RenderTarget,
    color: ImageBuffer,
    depth: ImageBuffer,
    depth16: ImageBuffer,
}

impl<S, M, P> FrameOrchestrator<S, M, P>
where
    S: SceneRenderer,
    M: MirrorRenderer,
    P: ProgressObserver,
{
    /// Validate `config` and allocate targets and buffers for the whole run.
    ///
    /// # Errors
    ///
    /// [`RenderError::Config`] if the configuration is rejected, or any
    /// target allocation failure.
    pub fn new(config: RenderConfig, scene: S, mirrors: M, progress: P) -> RenderResult<Self> {
        config.validate()?;
        let (width, height) = (config.width(), config.height());

        let color_target = RenderTarget::new(TargetDescriptor::new(
            "color",
            width,
            height,
            PixelFormat::RGB96F,
        ))?;
        let depth_target = RenderTarget::new(
            TargetDescriptor::new("depth", width, height, PixelFormat::GRAY32F)
                .with_row_order(RowOrder::BottomLineFirst),
        )?;
        info!(
            "created {width}x{height} color and depth targets, {} mirrors",
            mirrors.mirror_count()
        );

        Ok(Self {
            quantizer: DepthQuantizer::new(config.overflow),
            color: ImageBuffer::new(width, height, PixelFormat::RGB96F),
            depth: ImageBuffer::new(width, height, PixelFormat::GRAY32F),
            depth16: ImageBuffer::new(width, height, PixelFormat::GRAY16LE),
            config,
            scene,
            mirrors,
            progress,
            color_target,
            depth_target,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn mirrors(&self) -> &M {
        &self.mirrors
    }

    pub fn progress(&self) -> &P {
        &self.progress
    }

    /// Render `frame_count` frames, one per pose.
    ///
    /// # Errors
    ///
    /// - [`RenderError::MalformedTrajectory`] if `poses` yields an error or
    ///   ends before `frame_count` poses; no file of that frame is written.
    /// - [`RenderError::Io`] if the output directory or a frame file cannot
    ///   be written.
    /// - Any error from the scene or mirror renderer.
    pub fn run<I>(&mut self, frame_count: usize, poses: I) -> RenderResult<RunSummary>
    where
        I: IntoIterator<Item = RenderResult<CameraPose>>,
    {
        let dir = self.config.output_dir.clone();
        std::fs::create_dir_all(&dir).map_err(|err| RenderError::io(&dir, err))?;
        info!("rendering {frame_count} frames into {}", dir.display());

        let mut poses = poses.into_iter();
        let mut summary = RunSummary::new();
        for index in 0..frame_count {
            let pose = poses.next().ok_or_else(|| {
                RenderError::MalformedTrajectory(format!(
                    "trajectory ended after {index} of {frame_count} frames"
                ))
            })??;
            summary.push(self.render_frame(index, &pose, &dir)?);
            self.progress.frame_done(index + 1, frame_count);
        }
        self.progress.finished(frame_count);
        Ok(summary)
    }

    /// Render and serialize one frame.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), minus trajectory errors.
    pub fn render_frame(
        &mut self,
        index: usize,
        pose: &CameraPose,
        dir: &Path,
    ) -> RenderResult<FrameOutputs> {
        let camera = Camera::new(
            self.config.intrinsics,
            pose.view_matrix(),
            self.config.near,
            self.config.far,
        );
        debug!("frame {index}: camera at {}", display_vec(pose.eye));

        self.color_pass(&camera)?;
        self.mirror_passes(&camera)?;

        self.color_target.download(&mut self.color)?;
        let color_path = frame_path(dir, OutputFormat::Exr, index);
        export_exr(&self.color.as_view(), &PixelFormat::RGB96F, &color_path, true)?;
        let mut outputs = FrameOutputs::new(index, color_path);

        if self.config.render_depth {
            self.depth_pass(&camera)?;
            self.depth_target.download(&mut self.depth)?;
            // Depth was scaled by the renderer; quantize as is.
            self.quantizer
                .quantize_into(&self.depth.as_view(), 1.0, &mut self.depth16)?;
            let depth_path = frame_path(dir, OutputFormat::Png, index);
            write_gray16_png(
                &self.depth16.as_view(),
                &depth_path,
                false,
                Some(DEPTH_PNG_GAMMA),
            )?;
            outputs = outputs.with_depth(depth_path);
        }
        Ok(outputs)
    }

    fn color_pass(&mut self, camera: &Camera) -> RenderResult<()> {
        let viewport = Viewport::full(self.config.width(), self.config.height());
        let mut pass = self.color_target.bind(viewport);
        pass.clear();
        pass.enable_culling(self.config.front_face);
        self.scene.render(&mut pass, camera)?;
        pass.disable_culling();
        Ok(())
    }

    fn mirror_passes(&mut self, camera: &Camera) -> RenderResult<()> {
        let viewport = Viewport::full(self.config.width(), self.config.height());
        for i in 0..self.mirrors.mirror_count() {
            self.mirrors
                .capture_reflection(i, &self.scene, camera, self.config.front_face)?;
            let mut pass = self.color_target.bind(viewport);
            self.mirrors.render(i, &mut pass, camera)?;
        }
        Ok(())
    }

    fn depth_pass(&mut self, camera: &Camera) -> RenderResult<()> {
        let viewport = Viewport::full(self.config.width(), self.config.height());
        let mut pass = self.depth_target.bind(viewport);
        pass.clear();
        pass.enable_culling(self.config.front_face);
        self.scene
            .render_depth(&mut pass, camera, self.config.depth_scale)?;
        pass.disable_culling();
        Ok(())
    }
}

fn display_vec(v: DVec3) -> String {
    format!("({:.3}, {:.3}, {:.3})", v.x, v.y, v.z)
}
