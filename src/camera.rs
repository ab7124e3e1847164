//! Pinhole camera model.
//!
//! Cameras use the right-down-forward (RDF) convention of computer vision:
//! +x points right in the image, +y points down, +z points into the scene.
//! Pixel coordinates put the origin at the top-left corner, so a projected
//! `v` is a row index counted from the top.

use glam::{DMat3, DMat4, DVec2, DVec3, DVec4};
use log::warn;

// ---------------------------------------------------------------------------
// Intrinsics
// ---------------------------------------------------------------------------

/// Image size plus the 3x3 intrinsic matrix `K`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intrinsics {
    width: u32,
    height: u32,
    k: DMat3,
}

impl Intrinsics {
    /// Build from the rows of `K`, as they appear in an intrinsics file.
    pub fn from_rows(width: u32, height: u32, rows: [[f64; 3]; 3]) -> Self {
        let k = DMat3::from_cols(
            DVec3::new(rows[0][0], rows[1][0], rows[2][0]),
            DVec3::new(rows[0][1], rows[1][1], rows[2][1]),
            DVec3::new(rows[0][2], rows[1][2], rows[2][2]),
        );
        Self { width, height, k }
    }

    /// Zero-skew intrinsics.
    pub fn new(width: u32, height: u32, fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self::from_rows(width, height, [[fx, 0.0, cx], [0.0, fy, cy], [0.0, 0.0, 1.0]])
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The intrinsic matrix.
    #[inline]
    pub fn matrix(&self) -> DMat3 {
        self.k
    }

    /// Focal length along x in pixels, `K[0][0]`.
    #[inline]
    pub fn fx(&self) -> f64 {
        self.k.x_axis.x
    }

    /// Focal length along y in pixels, `K[1][1]`.
    #[inline]
    pub fn fy(&self) -> f64 {
        self.k.y_axis.y
    }

    /// Principal point x, `K[0][2]`.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.k.z_axis.x
    }

    /// Principal point y, `K[1][2]`.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.k.z_axis.y
    }

    /// Skew, `K[0][1]`.
    #[inline]
    pub fn skew(&self) -> f64 {
        self.k.y_axis.x
    }

    /// Project a camera-space point with `z > 0` to pixel coordinates.
    #[inline]
    pub fn project(&self, p: DVec3) -> DVec2 {
        let h = self.k * (p / p.z);
        DVec2::new(h.x, h.y)
    }
}

impl Default for Intrinsics {
    /// 640x480 with a 90 degree horizontal field of view.
    fn default() -> Self {
        Self::new(640, 480, 320.0, 320.0, 320.0, 240.0)
    }
}

// ---------------------------------------------------------------------------
// Pose
// ---------------------------------------------------------------------------

/// One trajectory sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub eye: DVec3,
    pub look_at: DVec3,
    pub up: DVec3,
}

impl CameraPose {
    /// Pose used when no trajectory file is given.
    pub const DEFAULT: Self = Self {
        eye: DVec3::new(-0.336, 2.372, 0.004),
        look_at: DVec3::new(-0.336 + 0.9074, 2.372 - 0.1819, 0.004 - 0.3788),
        up: DVec3::new(0.371, -0.074, 0.925),
    };

    pub fn new(eye: DVec3, look_at: DVec3, up: DVec3) -> Self {
        Self { eye, look_at, up }
    }

    /// World-to-camera transform in RDF convention.
    ///
    /// Returns `None` if `eye == look_at` or `up` is parallel to the viewing
    /// direction.
    pub fn view_matrix_rdf(&self) -> Option<DMat4> {
        let z = (self.look_at - self.eye).try_normalize()?;
        let x = z.cross(self.up).try_normalize()?;
        Some(rdf_view(self.eye, x, z))
    }

    /// Like [`view_matrix_rdf`](Self::view_matrix_rdf) but never fails: a
    /// degenerate `up` is replaced by an arbitrary perpendicular vector and a
    /// zero viewing direction keeps the identity orientation.
    pub fn view_matrix(&self) -> DMat4 {
        if let Some(view) = self.view_matrix_rdf() {
            return view;
        }
        match (self.look_at - self.eye).try_normalize() {
            Some(z) => {
                warn!("up vector {:?} is parallel to the view direction", self.up);
                let x = z.any_orthonormal_vector();
                rdf_view(self.eye, x, z)
            }
            None => {
                warn!("eye and look-at coincide at {:?}", self.eye);
                DMat4::from_translation(-self.eye)
            }
        }
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Rows x, y = z × x, z; translation `-R * eye`.
fn rdf_view(eye: DVec3, x: DVec3, z: DVec3) -> DMat4 {
    let y = z.cross(x);
    let rotation = DMat3::from_cols(x, y, z).transpose();
    let t = -(rotation * eye);
    DMat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        t.extend(1.0),
    )
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Everything a pass needs to place the scene on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub intrinsics: Intrinsics,
    /// World to camera.
    pub view: DMat4,
    pub near: f64,
    pub far: f64,
}

impl Camera {
    pub fn new(intrinsics: Intrinsics, view: DMat4, near: f64, far: f64) -> Self {
        Self {
            intrinsics,
            view,
            near,
            far,
        }
    }

    /// Transform a world point into camera space.
    #[inline]
    pub fn to_camera(&self, world: DVec3) -> DVec3 {
        self.view.transform_point3(world)
    }

    /// Camera centre in world coordinates.
    pub fn position(&self) -> DVec3 {
        self.view.inverse().transform_point3(DVec3::ZERO)
    }

    /// Project a world point to `(u, v, z)`, or `None` outside `[near, far]`.
    pub fn project(&self, world: DVec3) -> Option<DVec3> {
        let p = self.to_camera(world);
        if p.z < self.near || p.z > self.far {
            return None;
        }
        let uv = self.intrinsics.project(p);
        Some(uv.extend(p.z))
    }

    /// The same camera looking at the scene mirrored in `plane`.
    pub fn reflected(&self, plane: DVec4) -> Self {
        Self {
            view: self.view * reflection_matrix(plane),
            ..*self
        }
    }
}

/// Householder reflection across the plane `a*x + b*y + c*z + d = 0`.
///
/// The plane is normalized first; a zero normal yields the identity.
pub fn reflection_matrix(plane: DVec4) -> DMat4 {
    let normal = plane.truncate();
    let len = normal.length();
    if len == 0.0 || !len.is_finite() {
        return DMat4::IDENTITY;
    }
    let n = normal / len;
    let d = plane.w / len;
    let linear = DMat3::IDENTITY - 2.0 * outer(n, n);
    DMat4::from_cols(
        linear.x_axis.extend(0.0),
        linear.y_axis.extend(0.0),
        linear.z_axis.extend(0.0),
        (-2.0 * d * n).extend(1.0),
    )
}

fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}
