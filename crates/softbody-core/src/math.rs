use glam::{Mat3, Vec3};

/// Smallest rest length a distance constraint may carry.
pub const MIN_REST_LENGTH: f32 = 1.0e-4;

/// Smallest absolute rest volume a tetrahedron may carry.
pub const MIN_REST_VOLUME: f32 = 1.0e-8;

/// True when all three components are finite.
#[inline]
pub fn is_finite_vec(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

/// Scale `v` down so its length does not exceed `max`. Non-positive `max` disables the clamp.
#[inline]
pub fn clamp_length(v: Vec3, max: f32) -> Vec3 {
    if max <= 0.0 {
        return v;
    }
    let len_sq = v.length_squared();
    if len_sq > max * max {
        v * (max / len_sq.sqrt())
    } else {
        v
    }
}

/// Signed volume of the tetrahedron `(p0, p1, p2, p3)`.
///
/// Positive when `p3` lies on the side of triangle `(p0, p1, p2)` its
/// counter-clockwise normal points to.
#[inline]
pub fn tetrahedron_volume(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> f32 {
    (p1 - p0).cross(p2 - p0).dot(p3 - p0) / 6.0
}

/// Clamp a signed rest volume away from zero, keeping its sign.
#[inline]
pub fn clamp_rest_volume(volume: f32) -> f32 {
    if volume.abs() < MIN_REST_VOLUME {
        if volume < 0.0 {
            -MIN_REST_VOLUME
        } else {
            MIN_REST_VOLUME
        }
    } else {
        volume
    }
}

/// Outer product of two `Vec3`: returns a `Mat3` where M = a * b^T.
#[inline]
pub fn mat3_outer(a: Vec3, b: Vec3) -> Mat3 {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}

/// Iterative polar decomposition: extract rotation from A = R * S.
///
/// Uses 10 iterations of: R_{k+1} = 0.5 * (R_k + R_k^{-T})
///
/// If the matrix is singular, returns identity.
pub fn polar_rotation(a: Mat3) -> Mat3 {
    let mut r = a;
    for _ in 0..10 {
        let det = r.determinant();
        if det.abs() < 1e-10 {
            return Mat3::IDENTITY;
        }
        let r_inv_t = r.inverse().transpose();
        r = (r + r_inv_t) * 0.5;
    }
    r
}

/// Smooth interpolation - GLSL smoothstep
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
