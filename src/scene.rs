//! Trivial scene renderers.

use crate::camera::Camera;
use crate::error::RenderResult;
use crate::target::Pass;
use crate::traits::SceneRenderer;

/// Fills the viewport with one color at a fixed depth, whatever the camera.
///
/// Useful as a background layer and for checking the output path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolidScene {
    pub color: [f32; 3],
    /// Camera-space depth of every fragment.
    pub depth: f32,
}

impl SolidScene {
    pub fn new(color: [f32; 3], depth: f32) -> Self {
        Self { color, depth }
    }

    fn fill(&self, pass: &mut Pass<'_>, color: &[f32]) {
        let vp = pass.viewport();
        for y in vp.y..vp.y + vp.height {
            for x in vp.x..vp.x + vp.width {
                pass.write_fragment(x, y, self.depth, color);
            }
        }
    }
}

impl SceneRenderer for SolidScene {
    fn render(&self, pass: &mut Pass<'_>, _camera: &Camera) -> RenderResult<()> {
        self.fill(pass, &self.color);
        Ok(())
    }

    fn render_depth(
        &self,
        pass: &mut Pass<'_>,
        _camera: &Camera,
        depth_scale: f32,
    ) -> RenderResult<()> {
        self.fill(pass, &[self.depth * depth_scale]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraPose, Intrinsics};
    use crate::pixel::PixelFormat;
    use crate::target::{RenderTarget, TargetDescriptor, Viewport};

    fn camera() -> Camera {
        Camera::new(Intrinsics::default(), CameraPose::DEFAULT.view_matrix(), 0.1, 100.0)
    }

    #[test]
    fn fills_color_and_depth() {
        let scene = SolidScene::new([0.25, 0.5, 4.0], 2.0);
        let mut target =
            RenderTarget::new(TargetDescriptor::new("color", 3, 2, PixelFormat::RGB96F)).unwrap();
        {
            let mut pass = target.bind(Viewport::full(3, 2));
            pass.clear();
            scene.render(&mut pass, &camera()).unwrap();
        }
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(target.color_at(x, y), &[0.25, 0.5, 4.0]);
                assert_eq!(target.depth_at(x, y), 2.0);
            }
        }
    }

    #[test]
    fn depth_pass_scales_depth() {
        let scene = SolidScene::new([1.0; 3], 1.5);
        let mut target =
            RenderTarget::new(TargetDescriptor::new("depth", 2, 2, PixelFormat::GRAY32F)).unwrap();
        {
            let mut pass = target.bind(Viewport::full(2, 2));
            pass.clear();
            scene.render_depth(&mut pass, &camera(), 1000.0).unwrap();
        }
        assert_eq!(target.color_at(1, 1), &[1500.0]);
    }
}
