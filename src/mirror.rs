//! Mirror surfaces and planar reflections.
//!
//! The mirror file is a JSON array. The pipeline keeps each element as an
//! opaque [`MirrorSurface`]; only [`PlanarMirror::from_surface`] looks
//! inside, reading:
//!
//! - `equation`: `[a, b, c, d]` for the plane `a*x + b*y + c*z + d = 0`
//! - `points`: polygon outline, at least three `[x, y, z]` triples
//! - `reflectivity`: optional blend weight in `[0, 1]`, default 1

use std::path::Path;

use glam::{DVec4, Vec3};
use log::{debug, info};
use serde_json::Value;

use crate::camera::Camera;
use crate::error::{RenderError, RenderResult};
use crate::mesh::{DEFAULT_VERTEX_COLOR, Mesh, MeshRenderer};
use crate::pixel::PixelFormat;
use crate::target::{FrontFace, Pass, RenderTarget, TargetDescriptor, Viewport};
use crate::traits::{MirrorRenderer, SceneRenderer};

/// Relative slack when comparing a mirror's depth with the scene depth
/// already in the target.
const MIRROR_DEPTH_TOLERANCE: f32 = 1e-3;

/// One element of the mirror file, uninterpreted.
#[derive(Clone, Debug, PartialEq)]
pub struct MirrorSurface {
    json: Value,
}

impl MirrorSurface {
    pub fn new(json: Value) -> Self {
        Self { json }
    }

    pub fn json(&self) -> &Value {
        &self.json
    }
}

/// Parse mirror file contents.
///
/// # Errors
///
/// Returns [`RenderError::MirrorFile`] unless `text` is a JSON array.
pub fn parse_mirror_surfaces(text: &str) -> RenderResult<Vec<MirrorSurface>> {
    let json: Value =
        serde_json::from_str(text).map_err(|err| RenderError::MirrorFile(err.to_string()))?;
    match json {
        Value::Array(items) => Ok(items.into_iter().map(MirrorSurface::new).collect()),
        other => Err(RenderError::MirrorFile(format!(
            "expected an array of surfaces, found {}",
            json_kind(&other)
        ))),
    }
}

/// Read a mirror file.
///
/// # Errors
///
/// [`RenderError::Io`] if the file cannot be read, otherwise as
/// [`parse_mirror_surfaces`].
pub fn load_mirror_surfaces(path: &Path) -> RenderResult<Vec<MirrorSurface>> {
    let text = std::fs::read_to_string(path).map_err(|err| RenderError::io(path, err))?;
    let surfaces = parse_mirror_surfaces(&text)?;
    info!("Loaded {} mirrors", surfaces.len());
    Ok(surfaces)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// PlanarMirror
// ---------------------------------------------------------------------------

/// A flat polygonal mirror.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanarMirror {
    pub plane: DVec4,
    pub outline: Vec<Vec3>,
    pub reflectivity: f32,
}

impl PlanarMirror {
    /// Interpret a mirror file element.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MirrorFile`] if `equation` or `points` is
    /// missing or malformed, or `reflectivity` is outside `[0, 1]`.
    pub fn from_surface(surface: &MirrorSurface) -> RenderResult<Self> {
        let json = surface.json();
        let equation = numbers(json.get("equation"), "equation")?;
        let [a, b, c, d] = equation[..] else {
            return Err(RenderError::MirrorFile(format!(
                "equation has {} values, expected 4",
                equation.len()
            )));
        };
        if a == 0.0 && b == 0.0 && c == 0.0 {
            return Err(RenderError::MirrorFile("equation has a zero normal".into()));
        }

        let points = json
            .get("points")
            .and_then(Value::as_array)
            .ok_or_else(|| RenderError::MirrorFile("missing points array".into()))?;
        let outline = points
            .iter()
            .map(|p| match numbers(Some(p), "point")?[..] {
                [x, y, z] => Ok(Vec3::new(x as f32, y as f32, z as f32)),
                _ => Err(RenderError::MirrorFile("point needs 3 coordinates".into())),
            })
            .collect::<RenderResult<Vec<_>>>()?;
        if outline.len() < 3 {
            return Err(RenderError::MirrorFile(format!(
                "mirror outline has {} points, expected at least 3",
                outline.len()
            )));
        }

        let reflectivity = match json.get("reflectivity") {
            None => 1.0,
            Some(value) => value
                .as_f64()
                .filter(|r| (0.0..=1.0).contains(r))
                .ok_or_else(|| {
                    RenderError::MirrorFile(format!("reflectivity {value} not in [0, 1]"))
                })? as f32,
        };

        Ok(Self {
            plane: DVec4::new(a, b, c, d),
            outline,
            reflectivity,
        })
    }

    /// The outline as a triangle fan.
    fn to_mesh(&self) -> Mesh {
        let n = self.outline.len() as u32;
        Mesh {
            positions: self.outline.clone(),
            colors: vec![DEFAULT_VERTEX_COLOR; self.outline.len()],
            triangles: (1..n.saturating_sub(1)).map(|k| [0, k, k + 1]).collect(),
        }
    }
}

fn numbers(value: Option<&Value>, what: &str) -> RenderResult<Vec<f64>> {
    value
        .and_then(Value::as_array)
        .and_then(|items| items.iter().map(Value::as_f64).collect::<Option<Vec<f64>>>())
        .ok_or_else(|| RenderError::MirrorFile(format!("{what} must be an array of numbers")))
}

// ---------------------------------------------------------------------------
// PlanarMirrorRenderer
// ---------------------------------------------------------------------------

/// Renders planar mirrors by re-rendering the scene through each plane.
///
/// Capture renders the scene with the reflected camera into a private color
/// target, and draws the mirror outline into that mirror's mask target,
/// whose depth attachment then holds the mirror's depth where it covers the
/// screen. Compositing blends the reflection into the bound target wherever
/// the mask is set and the mirror is not hidden behind scene geometry.
///
/// Geometry between the viewer and the plane is not clipped from the
/// reflection.
pub struct PlanarMirrorRenderer {
    mirrors: Vec<PlanarMirror>,
    outlines: Vec<MeshRenderer>,
    reflection: RenderTarget,
    masks: Vec<RenderTarget>,
}

impl PlanarMirrorRenderer {
    /// Allocate reflection and mask targets of `width x height`.
    ///
    /// # Errors
    ///
    /// Propagates target creation failures.
    pub fn new(mirrors: Vec<PlanarMirror>, width: u32, height: u32) -> RenderResult<Self> {
        let reflection = RenderTarget::new(TargetDescriptor::new(
            "mirror reflection",
            width,
            height,
            PixelFormat::RGB96F,
        ))?;
        let masks = (0..mirrors.len())
            .map(|i| {
                RenderTarget::new(TargetDescriptor::new(
                    format!("mirror mask {i}"),
                    width,
                    height,
                    PixelFormat::GRAY32F,
                ))
            })
            .collect::<RenderResult<Vec<_>>>()?;
        let outlines = mirrors.iter().map(|m| MeshRenderer::new(m.to_mesh())).collect();
        Ok(Self {
            mirrors,
            outlines,
            reflection,
            masks,
        })
    }

    /// Interpret every surface and allocate targets.
    ///
    /// # Errors
    ///
    /// As [`PlanarMirror::from_surface`] and [`new`](Self::new).
    pub fn from_surfaces(surfaces: &[MirrorSurface], width: u32, height: u32) -> RenderResult<Self> {
        let mirrors = surfaces
            .iter()
            .map(PlanarMirror::from_surface)
            .collect::<RenderResult<Vec<_>>>()?;
        Self::new(mirrors, width, height)
    }

    pub fn mirrors(&self) -> &[PlanarMirror] {
        &self.mirrors
    }

    /// Mask target of mirror `index`; its depth is finite where the mirror
    /// covers the screen.
    pub fn mask(&self, index: usize) -> &RenderTarget {
        &self.masks[index]
    }
}

impl MirrorRenderer for PlanarMirrorRenderer {
    fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    fn capture_reflection(
        &mut self,
        index: usize,
        scene: &dyn SceneRenderer,
        camera: &Camera,
        front_face: FrontFace,
    ) -> RenderResult<()> {
        let mirror = &self.mirrors[index];
        let viewport = Viewport::full(self.reflection.width(), self.reflection.height());

        let reflected = camera.reflected(mirror.plane);
        {
            let mut pass = self.reflection.bind(viewport);
            pass.clear();
            pass.enable_culling(front_face.inverted());
            scene.render(&mut pass, &reflected)?;
            pass.disable_culling();
        }

        let mut pass = self.masks[index].bind(viewport);
        pass.clear();
        self.outlines[index].render_depth(&mut pass, camera, 1.0)?;
        debug!("captured reflection for mirror {index}");
        Ok(())
    }

    fn render(&mut self, index: usize, pass: &mut Pass<'_>, _camera: &Camera) -> RenderResult<()> {
        let reflectivity = self.mirrors[index].reflectivity;
        let mask = &self.masks[index];
        let vp = pass.viewport();
        for y in vp.y..vp.y + vp.height {
            for x in vp.x..vp.x + vp.width {
                let mirror_z = mask.depth_at(x, y);
                if !mirror_z.is_finite() {
                    continue;
                }
                let scene_z = pass.depth_at(x, y);
                if mirror_z > scene_z * (1.0 + MIRROR_DEPTH_TOLERANCE) {
                    continue;
                }
                pass.blend_fragment(x, y, self.reflection.color_at(x, y), reflectivity);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraPose, Intrinsics};
    use crate::test_util::TempDir;
    use glam::DVec3;
    use serde_json::json;

    /// Paints every pixel with the camera's world x coordinate as red.
    struct CameraProbe {
        depth: f32,
    }

    impl SceneRenderer for CameraProbe {
        fn render(&self, pass: &mut Pass<'_>, camera: &Camera) -> RenderResult<()> {
            let red = camera.position().x as f32;
            let vp = pass.viewport();
            for y in vp.y..vp.y + vp.height {
                for x in vp.x..vp.x + vp.width {
                    pass.write_fragment(x, y, self.depth, &[red, 0.0, 0.0]);
                }
            }
            Ok(())
        }

        fn render_depth(&self, _: &mut Pass<'_>, _: &Camera, _: f32) -> RenderResult<()> {
            Ok(())
        }
    }

    /// Camera at the origin looking along +x with +z up, 8x8 pixels.
    fn camera() -> Camera {
        let pose = CameraPose::new(DVec3::ZERO, DVec3::X, DVec3::Z);
        Camera::new(Intrinsics::new(8, 8, 4.0, 4.0, 4.0, 4.0), pose.view_matrix(), 0.1, 100.0)
    }

    /// Square mirror in the plane x = `at`, facing the camera, covering
    /// the whole view.
    fn wall(at: f64, reflectivity: f64) -> MirrorSurface {
        let s = at * 2.0;
        MirrorSurface::new(json!({
            "equation": [-1.0, 0.0, 0.0, at],
            "points": [[at, -s, -s], [at, s, -s], [at, s, s], [at, -s, s]],
            "reflectivity": reflectivity,
        }))
    }

    fn composite(renderer: &mut PlanarMirrorRenderer, order: &[usize]) -> RenderTarget {
        let cam = camera();
        let scene = CameraProbe { depth: 50.0 };
        let mut target =
            RenderTarget::new(TargetDescriptor::new("color", 8, 8, PixelFormat::RGB96F)).unwrap();
        {
            let mut pass = target.bind(Viewport::full(8, 8));
            pass.clear();
            scene.render(&mut pass, &cam).unwrap();
        }
        for &i in order {
            renderer
                .capture_reflection(i, &scene, &cam, FrontFace::Ccw)
                .unwrap();
            let mut pass = target.bind(Viewport::full(8, 8));
            renderer.render(i, &mut pass, &cam).unwrap();
        }
        target
    }

    #[test]
    fn surfaces_stay_opaque() {
        let surfaces = parse_mirror_surfaces(r#"[{"anything": 1}, {"equation": [0, 0, 1, 0]}]"#)
            .unwrap();
        assert_eq!(surfaces.len(), 2);
        assert_eq!(surfaces[0].json()["anything"], 1);
        assert!(parse_mirror_surfaces("[]").unwrap().is_empty());
    }

    #[test]
    fn mirror_file_must_be_an_array() {
        let err = parse_mirror_surfaces(r#"{"equation": []}"#).unwrap_err();
        assert!(matches!(err, RenderError::MirrorFile(ref m) if m.contains("an object")));
        assert!(parse_mirror_surfaces("not json").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = TempDir::new("mirror-file");
        let path = dir.path().join("mirrors.json");
        std::fs::write(&path, r#"[{"equation": [0, 0, 1, 0]}]"#).unwrap();
        assert_eq!(load_mirror_surfaces(&path).unwrap().len(), 1);
        assert!(load_mirror_surfaces(&dir.path().join("none.json")).unwrap_err().is_io());
    }

    #[test]
    fn planar_mirror_fields() {
        let mirror = PlanarMirror::from_surface(&wall(2.0, 0.5)).unwrap();
        assert_eq!(mirror.plane, DVec4::new(-1.0, 0.0, 0.0, 2.0));
        assert_eq!(mirror.outline.len(), 4);
        assert_eq!(mirror.reflectivity, 0.5);
        assert_eq!(mirror.to_mesh().triangles, vec![[0, 1, 2], [0, 2, 3]]);

        let default = MirrorSurface::new(json!({
            "equation": [0, 0, 1, 0],
            "points": [[0, 0, 0], [1, 0, 0], [0, 1, 0]],
        }));
        assert_eq!(PlanarMirror::from_surface(&default).unwrap().reflectivity, 1.0);
    }

    #[test]
    fn planar_mirror_rejects_malformed() {
        for bad in [
            json!({"points": [[0, 0, 0], [1, 0, 0], [0, 1, 0]]}),
            json!({"equation": [0, 0, 1], "points": [[0, 0, 0], [1, 0, 0], [0, 1, 0]]}),
            json!({"equation": [0, 0, 0, 1], "points": [[0, 0, 0], [1, 0, 0], [0, 1, 0]]}),
            json!({"equation": [0, 0, 1, 0], "points": [[0, 0, 0], [1, 0, 0]]}),
            json!({"equation": [0, 0, 1, 0], "points": [[0, 0], [1, 0, 0], [0, 1, 0]]}),
            json!({"equation": [0, 0, 1, 0], "points": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "reflectivity": 2}),
        ] {
            let err = PlanarMirror::from_surface(&MirrorSurface::new(bad.clone())).unwrap_err();
            assert!(matches!(err, RenderError::MirrorFile(_)), "{bad}");
        }
    }

    #[test]
    fn reflection_is_seen_through_the_mask() {
        let mut renderer = PlanarMirrorRenderer::from_surfaces(&[wall(2.0, 1.0)], 8, 8).unwrap();
        let target = composite(&mut renderer, &[0]);
        // The reflected camera sits at x = 4.
        assert!((target.color_at(4, 4)[0] - 4.0).abs() < 1e-5);
        assert!(renderer.mask(0).depth_at(4, 4).is_finite());
        // Scene depth is untouched by compositing.
        assert_eq!(target.depth_at(4, 4), 50.0);
    }

    #[test]
    fn mirror_behind_scene_is_hidden() {
        let mut renderer = PlanarMirrorRenderer::from_surfaces(&[wall(60.0, 1.0)], 8, 8).unwrap();
        let target = composite(&mut renderer, &[0]);
        assert_eq!(target.color_at(4, 4), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn compositing_order_is_observable() {
        let surfaces = [wall(2.0, 0.5), wall(3.0, 0.5)];
        let mut renderer = PlanarMirrorRenderer::from_surfaces(&surfaces, 8, 8).unwrap();
        let forward = composite(&mut renderer, &[0, 1]);
        let backward = composite(&mut renderer, &[1, 0]);
        // 0 -> 0.5*0 + 0.5*4 = 2 -> 0.5*2 + 0.5*6 = 4
        assert!((forward.color_at(3, 3)[0] - 4.0).abs() < 1e-5);
        // 0 -> 0.5*0 + 0.5*6 = 3 -> 0.5*3 + 0.5*4 = 3.5
        assert!((backward.color_at(3, 3)[0] - 3.5).abs() < 1e-5);
    }
}
