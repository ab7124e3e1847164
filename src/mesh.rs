//! Triangle meshes from PLY files and a scanline rasterizer for them.
//!
//! The reader handles `ascii` and `binary_little_endian` PLY. Vertices need
//! `x`, `y` and `z`; `red`, `green` and `blue` are used when present. Faces
//! come from a `vertex_indices` (or `vertex_index`) list and polygons are
//! triangulated as fans. Other elements and properties are skipped.

use std::path::Path;

use glam::{DVec2, DVec3, Vec3};
use log::info;

use crate::camera::Camera;
use crate::error::{RenderError, RenderResult};
use crate::target::Pass;
use crate::trajectory::TokenReader;
use crate::traits::SceneRenderer;

/// Color of vertices in files without color properties.
pub const DEFAULT_VERTEX_COLOR: [f32; 3] = [0.8, 0.8, 0.8];

// ---------------------------------------------------------------------------
// Mesh
// ---------------------------------------------------------------------------

/// Indexed triangle mesh with per-vertex colors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub colors: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// Load a PLY file.
    ///
    /// # Errors
    ///
    /// [`RenderError::Io`] if the file cannot be read, [`RenderError::Mesh`]
    /// if it is not a PLY file this reader understands.
    pub fn load(path: &Path) -> RenderResult<Self> {
        let bytes = std::fs::read(path).map_err(|err| RenderError::io(path, err))?;
        let mesh = Self::from_ply_bytes(&bytes)?;
        info!(
            "loaded {}: {} vertices, {} triangles",
            path.display(),
            mesh.positions.len(),
            mesh.triangles.len()
        );
        Ok(mesh)
    }

    /// Parse PLY data held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Mesh`] for malformed headers or bodies, missing
    /// coordinates and out-of-range face indices.
    pub fn from_ply_bytes(bytes: &[u8]) -> RenderResult<Self> {
        let (header, body_start) = parse_header(bytes)?;
        let mut body = match header.encoding {
            Encoding::Ascii => {
                let text = std::str::from_utf8(&bytes[body_start..])
                    .map_err(|_| mesh_error("ascii body is not valid UTF-8"))?;
                Body::Ascii(TokenReader::new(text))
            }
            Encoding::BinaryLittleEndian => Body::Binary {
                data: &bytes[body_start..],
                pos: 0,
            },
        };

        let mut mesh = Mesh::default();
        for element in &header.elements {
            match element.name.as_str() {
                "vertex" => read_vertices(&mut body, element, &mut mesh)?,
                "face" => read_faces(&mut body, element, &mut mesh)?,
                _ => {
                    for _ in 0..element.count {
                        for property in &element.properties {
                            body.skip_property(property)?;
                        }
                    }
                }
            }
        }

        let vertex_count = mesh.positions.len();
        if let Some(bad) = mesh
            .triangles
            .iter()
            .flatten()
            .find(|&&i| i as usize >= vertex_count)
        {
            return Err(mesh_error(format!(
                "face index {bad} out of range for {vertex_count} vertices"
            )));
        }
        Ok(mesh)
    }
}

fn mesh_error(msg: impl Into<String>) -> RenderError {
    RenderError::Mesh(msg.into())
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encoding {
    Ascii,
    BinaryLittleEndian,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Scalar {
    fn parse(name: &str) -> RenderResult<Self> {
        Ok(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            other => return Err(mesh_error(format!("unknown property type {other:?}"))),
        })
    }

    fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Property {
    Scalar { name: String, ty: Scalar },
    List { name: String, count: Scalar, item: Scalar },
}

impl Property {
    fn name(&self) -> &str {
        match self {
            Property::Scalar { name, .. } | Property::List { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Clone, Debug)]
struct Header {
    encoding: Encoding,
    elements: Vec<Element>,
}

/// Parse the header and return it with the offset of the first body byte.
fn parse_header(bytes: &[u8]) -> RenderResult<(Header, usize)> {
    let mut pos = 0;
    if next_line(bytes, &mut pos)?.trim() != "ply" {
        return Err(mesh_error("missing ply magic"));
    }

    let mut encoding = None;
    let mut elements: Vec<Element> = Vec::new();
    loop {
        let line = next_line(bytes, &mut pos)?;
        let mut words = line.split_whitespace();
        match words.next() {
            Some("end_header") => break,
            Some("comment") | Some("obj_info") | None => {}
            Some("format") => {
                encoding = Some(match words.next() {
                    Some("ascii") => Encoding::Ascii,
                    Some("binary_little_endian") => Encoding::BinaryLittleEndian,
                    other => {
                        return Err(mesh_error(format!("unsupported format {other:?}")));
                    }
                });
            }
            Some("element") => {
                let name = words.next().ok_or_else(|| mesh_error("element without name"))?;
                let count = words
                    .next()
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| mesh_error(format!("element {name} has no count")))?;
                elements.push(Element {
                    name: name.to_string(),
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| mesh_error("property before any element"))?;
                let words: Vec<&str> = words.collect();
                let property = match words.as_slice() {
                    ["list", count, item, name] => Property::List {
                        name: name.to_string(),
                        count: Scalar::parse(count)?,
                        item: Scalar::parse(item)?,
                    },
                    [ty, name] => Property::Scalar {
                        name: name.to_string(),
                        ty: Scalar::parse(ty)?,
                    },
                    _ => return Err(mesh_error(format!("malformed property line {line:?}"))),
                };
                element.properties.push(property);
            }
            Some(other) => return Err(mesh_error(format!("unknown header keyword {other:?}"))),
        }
    }

    let encoding = encoding.ok_or_else(|| mesh_error("missing format line"))?;
    Ok((Header { encoding, elements }, pos))
}

fn next_line<'a>(bytes: &'a [u8], pos: &mut usize) -> RenderResult<&'a str> {
    let rest = &bytes[*pos..];
    let end = rest
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| mesh_error("header is not terminated by end_header"))?;
    *pos += end + 1;
    std::str::from_utf8(&rest[..end])
        .map(|line| line.trim_end_matches('\r'))
        .map_err(|_| mesh_error("header is not ASCII"))
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

enum Body<'a> {
    Ascii(TokenReader<'a>),
    Binary { data: &'a [u8], pos: usize },
}

impl Body<'_> {
    fn read(&mut self, ty: Scalar) -> RenderResult<f64> {
        match self {
            Body::Ascii(tokens) => tokens
                .parse_f64()
                .map_err(|err| mesh_error(format!("body: {err}"))),
            Body::Binary { data, pos } => {
                let size = ty.size();
                let bytes = data
                    .get(*pos..*pos + size)
                    .ok_or_else(|| mesh_error("binary body ends early"))?;
                *pos += size;
                let mut raw = [0u8; 8];
                raw[..size].copy_from_slice(bytes);
                Ok(match ty {
                    Scalar::I8 => i8::from_le_bytes([raw[0]]) as f64,
                    Scalar::U8 => raw[0] as f64,
                    Scalar::I16 => i16::from_le_bytes([raw[0], raw[1]]) as f64,
                    Scalar::U16 => u16::from_le_bytes([raw[0], raw[1]]) as f64,
                    Scalar::I32 => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
                    Scalar::U32 => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
                    Scalar::F32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
                    Scalar::F64 => f64::from_le_bytes(raw),
                })
            }
        }
    }

    fn read_count(&mut self, ty: Scalar) -> RenderResult<usize> {
        let value = self.read(ty)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(mesh_error(format!("invalid list length {value}")));
        }
        Ok(value as usize)
    }

    fn skip_property(&mut self, property: &Property) -> RenderResult<()> {
        match property {
            Property::Scalar { ty, .. } => {
                self.read(*ty)?;
            }
            Property::List { count, item, .. } => {
                for _ in 0..self.read_count(*count)? {
                    self.read(*item)?;
                }
            }
        }
        Ok(())
    }
}

fn read_vertices(body: &mut Body<'_>, element: &Element, mesh: &mut Mesh) -> RenderResult<()> {
    let slot = |name: &str| element.properties.iter().position(|p| p.name() == name);
    let (Some(x), Some(y), Some(z)) = (slot("x"), slot("y"), slot("z")) else {
        return Err(mesh_error("vertex element lacks x/y/z"));
    };
    let rgb = [slot("red"), slot("green"), slot("blue")];

    mesh.positions.reserve(element.count);
    mesh.colors.reserve(element.count);
    let mut values = vec![0.0f64; element.properties.len()];
    for _ in 0..element.count {
        for (value, property) in values.iter_mut().zip(&element.properties) {
            match property {
                Property::Scalar { ty, .. } => *value = body.read(*ty)?,
                Property::List { .. } => body.skip_property(property)?,
            }
        }
        mesh.positions
            .push(Vec3::new(values[x] as f32, values[y] as f32, values[z] as f32));
        let mut color = DEFAULT_VERTEX_COLOR;
        for (c, index) in color.iter_mut().zip(rgb) {
            if let Some(i) = index {
                let integer = matches!(
                    element.properties[i],
                    Property::Scalar {
                        ty: Scalar::U8,
                        ..
                    }
                );
                *c = if integer {
                    values[i] as f32 / 255.0
                } else {
                    values[i] as f32
                };
            }
        }
        mesh.colors.push(color);
    }
    Ok(())
}

fn read_faces(body: &mut Body<'_>, element: &Element, mesh: &mut Mesh) -> RenderResult<()> {
    let indices_slot = element
        .properties
        .iter()
        .position(|p| {
            matches!(p, Property::List { name, .. } if name == "vertex_indices" || name == "vertex_index")
        })
        .ok_or_else(|| mesh_error("face element lacks vertex_indices"))?;

    let mut polygon: Vec<u32> = Vec::new();
    for _ in 0..element.count {
        for (i, property) in element.properties.iter().enumerate() {
            match property {
                Property::List { count, item, .. } if i == indices_slot => {
                    polygon.clear();
                    for _ in 0..body.read_count(*count)? {
                        let index = body.read(*item)?;
                        if index < 0.0 || index > u32::MAX as f64 {
                            return Err(mesh_error(format!("invalid vertex index {index}")));
                        }
                        polygon.push(index as u32);
                    }
                    for k in 1..polygon.len().saturating_sub(1) {
                        mesh.triangles.push([polygon[0], polygon[k], polygon[k + 1]]);
                    }
                }
                other => body.skip_property(other)?,
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rasterizer
// ---------------------------------------------------------------------------

/// Draws a [`Mesh`] with per-vertex colors.
///
/// Triangles with a vertex in front of the near plane are dropped rather
/// than clipped; fragments past the far plane are discarded. Colors and
/// depth are interpolated perspective-correctly and depth is camera-space z.
#[derive(Clone, Debug)]
pub struct MeshRenderer {
    mesh: Mesh,
}

/// A triangle vertex after projection.
#[derive(Clone, Copy)]
struct ScreenVertex {
    pixel: DVec2,
    inv_z: f64,
    color: [f32; 3],
}

impl MeshRenderer {
    pub fn new(mesh: Mesh) -> Self {
        Self { mesh }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    fn draw(&self, pass: &mut Pass<'_>, camera: &Camera, depth_scale: Option<f32>) {
        for tri in &self.mesh.triangles {
            let Some(verts) = self.project_triangle(tri, camera) else {
                continue;
            };
            if pass.is_culled(verts[0].pixel, verts[1].pixel, verts[2].pixel) {
                continue;
            }
            rasterize(pass, &verts, camera.far, depth_scale);
        }
    }

    fn project_triangle(&self, tri: &[u32; 3], camera: &Camera) -> Option<[ScreenVertex; 3]> {
        let mut out = [ScreenVertex {
            pixel: DVec2::ZERO,
            inv_z: 0.0,
            color: [0.0; 3],
        }; 3];
        for (v, &index) in out.iter_mut().zip(tri) {
            let p: DVec3 = camera.to_camera(self.mesh.positions[index as usize].as_dvec3());
            if p.z < camera.near {
                return None;
            }
            *v = ScreenVertex {
                pixel: camera.intrinsics.project(p),
                inv_z: 1.0 / p.z,
                color: self.mesh.colors[index as usize],
            };
        }
        Some(out)
    }
}

#[inline]
fn edge(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn rasterize(pass: &mut Pass<'_>, v: &[ScreenVertex; 3], far: f64, depth_scale: Option<f32>) {
    let area = edge(v[0].pixel, v[1].pixel, v[2].pixel);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    let vp = pass.viewport();
    if vp.width == 0 || vp.height == 0 {
        return;
    }
    let min = v[0].pixel.min(v[1].pixel).min(v[2].pixel);
    let max = v[0].pixel.max(v[1].pixel).max(v[2].pixel);
    let x0 = (min.x.floor().max(vp.x as f64)) as u32;
    let y0 = (min.y.floor().max(vp.y as f64)) as u32;
    let x1 = (max.x.ceil().min((vp.x + vp.width) as f64)) as u32;
    let y1 = (max.y.ceil().min((vp.y + vp.height) as f64)) as u32;

    for y in y0..y1 {
        for x in x0..x1 {
            let p = DVec2::new(x as f64 + 0.5, y as f64 + 0.5);
            let b = [
                edge(v[1].pixel, v[2].pixel, p) / area,
                edge(v[2].pixel, v[0].pixel, p) / area,
                edge(v[0].pixel, v[1].pixel, p) / area,
            ];
            if b.iter().any(|&w| w < 0.0) {
                continue;
            }
            let inv_z: f64 = (0..3).map(|i| b[i] * v[i].inv_z).sum();
            let z = 1.0 / inv_z;
            if z > far {
                continue;
            }
            match depth_scale {
                Some(scale) => {
                    pass.write_fragment(x, y, z as f32, &[z as f32 * scale]);
                }
                None => {
                    let mut color = [0.0f32; 3];
                    for (c, channel) in color.iter_mut().enumerate() {
                        let weighted: f64 = (0..3)
                            .map(|i| b[i] * v[i].inv_z * v[i].color[c] as f64)
                            .sum();
                        *channel = (weighted * z) as f32;
                    }
                    pass.write_fragment(x, y, z as f32, &color);
                }
            }
        }
    }
}

impl SceneRenderer for MeshRenderer {
    fn render(&self, pass: &mut Pass<'_>, camera: &Camera) -> RenderResult<()> {
        self.draw(pass, camera, None);
        Ok(())
    }

    fn render_depth(
        &self,
        pass: &mut Pass<'_>,
        camera: &Camera,
        depth_scale: f32,
    ) -> RenderResult<()> {
        self.draw(pass, camera, Some(depth_scale));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraPose, Intrinsics};
    use crate::pixel::PixelFormat;
    use crate::target::{FrontFace, RenderTarget, TargetDescriptor, Viewport};
    use crate::test_util::TempDir;

    const QUAD_ASCII: &str = "ply
format ascii 1.0
comment unit quad two units in front of the camera
element vertex 4
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
element face 1
property list uchar int vertex_indices
end_header
-1 1 2 255 0 0
1 1 2 255 0 0
1 -1 2 255 0 0
-1 -1 2 255 0 0
4 0 1 2 3
";

    fn camera() -> Camera {
        let pose = CameraPose::new(DVec3::ZERO, DVec3::Z, DVec3::new(0.0, -1.0, 0.0));
        Camera::new(Intrinsics::new(8, 8, 4.0, 4.0, 4.0, 4.0), pose.view_matrix(), 0.1, 100.0)
    }

    fn render(mesh: Mesh, cull: Option<FrontFace>) -> RenderTarget {
        let mut target =
            RenderTarget::new(TargetDescriptor::new("mesh", 8, 8, PixelFormat::RGB96F)).unwrap();
        {
            let mut pass = target.bind(Viewport::full(8, 8));
            pass.clear();
            if let Some(front) = cull {
                pass.enable_culling(front);
            }
            MeshRenderer::new(mesh).render(&mut pass, &camera()).unwrap();
        }
        target
    }

    fn covered(target: &RenderTarget) -> usize {
        (0..8)
            .flat_map(|y| (0..8).map(move |x| (x, y)))
            .filter(|&(x, y)| target.depth_at(x, y).is_finite())
            .count()
    }

    #[test]
    fn parses_ascii_quad_as_fan() {
        let mesh = Mesh::from_ply_bytes(QUAD_ASCII.as_bytes()).unwrap();
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.positions[2], Vec3::new(1.0, -1.0, 2.0));
        assert_eq!(mesh.colors[0], [1.0, 0.0, 0.0]);
        assert_eq!(mesh.triangles, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn parses_binary_little_endian() {
        let mut bytes = b"ply\r\nformat binary_little_endian 1.0\r\nelement vertex 3\r\n\
property double x\r\nproperty double y\r\nproperty double z\r\n\
element face 1\r\nproperty uchar flags\r\nproperty list uchar uint vertex_indices\r\n\
end_header\r\n"
            .to_vec();
        for v in [[0.0f64, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.5]] {
            for c in v {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        bytes.push(7);
        bytes.push(3);
        for i in [2u32, 1, 0] {
            bytes.extend_from_slice(&i.to_le_bytes());
        }
        let mesh = Mesh::from_ply_bytes(&bytes).unwrap();
        assert_eq!(mesh.positions[2], Vec3::new(0.0, 1.0, 1.5));
        assert_eq!(mesh.colors[1], DEFAULT_VERTEX_COLOR);
        assert_eq!(mesh.triangles, vec![[2, 1, 0]]);
    }

    #[test]
    fn rejects_bad_files() {
        assert!(Mesh::from_ply_bytes(b"obj\n").is_err());
        assert!(Mesh::from_ply_bytes(b"ply\nformat ascii 1.0\n").is_err());
        let bad_index = QUAD_ASCII.replace("4 0 1 2 3", "3 0 1 9");
        let err = Mesh::from_ply_bytes(bad_index.as_bytes()).unwrap_err();
        assert!(matches!(err, RenderError::Mesh(ref m) if m.contains("out of range")));
        let short = QUAD_ASCII.replace("4 0 1 2 3\n", "");
        assert!(Mesh::from_ply_bytes(short.as_bytes()).is_err());
        let big_endian = QUAD_ASCII.replace("ascii", "binary_big_endian");
        assert!(Mesh::from_ply_bytes(big_endian.as_bytes()).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = TempDir::new("mesh-load");
        let path = dir.path().join("quad.ply");
        std::fs::write(&path, QUAD_ASCII).unwrap();
        assert_eq!(Mesh::load(&path).unwrap().triangles.len(), 2);
        assert!(Mesh::load(&dir.path().join("none.ply")).unwrap_err().is_io());
    }

    #[test]
    fn rasterizes_quad_with_depth() {
        let mesh = Mesh::from_ply_bytes(QUAD_ASCII.as_bytes()).unwrap();
        let target = render(mesh, Some(FrontFace::Ccw));
        // The quad projects to pixels [2, 6) on both axes.
        assert_eq!(covered(&target), 16);
        assert_eq!(target.color_at(3, 3), &[1.0, 0.0, 0.0]);
        assert!((target.depth_at(2, 5) - 2.0).abs() < 1e-5);
        assert_eq!(target.depth_at(1, 3), f32::INFINITY);
        assert_eq!(target.depth_at(6, 3), f32::INFINITY);
    }

    #[test]
    fn back_faces_are_culled() {
        let mut mesh = Mesh::from_ply_bytes(QUAD_ASCII.as_bytes()).unwrap();
        for tri in &mut mesh.triangles {
            tri.swap(1, 2);
        }
        assert_eq!(covered(&render(mesh.clone(), Some(FrontFace::Ccw))), 0);
        assert_eq!(covered(&render(mesh.clone(), Some(FrontFace::Cw))), 16);
        assert_eq!(covered(&render(mesh, None)), 16);
    }

    #[test]
    fn near_plane_drops_triangles() {
        let text = QUAD_ASCII.replace(" 2 255", " 0.05 255");
        let mesh = Mesh::from_ply_bytes(text.as_bytes()).unwrap();
        assert_eq!(covered(&render(mesh, None)), 0);
    }

    #[test]
    fn depth_pass_writes_scaled_depth() {
        let mesh = Mesh::from_ply_bytes(QUAD_ASCII.as_bytes()).unwrap();
        let mut target =
            RenderTarget::new(TargetDescriptor::new("depth", 8, 8, PixelFormat::GRAY32F)).unwrap();
        {
            let mut pass = target.bind(Viewport::full(8, 8));
            pass.clear();
            MeshRenderer::new(mesh)
                .render_depth(&mut pass, &camera(), 100.0)
                .unwrap();
        }
        assert!((target.color_at(4, 4)[0] - 200.0).abs() < 1e-3);
        assert_eq!(target.color_at(0, 0), &[0.0]);
    }
}
