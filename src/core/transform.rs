use nalgebra::Matrix4;
use crate::core::cortex::*;
use crate::core::geometry::{Point3f, Vector3f};
use crate::core::geometry::bounds::Bounds3f;
use super::quaternion::Quaternion;
use std::fmt::{self, Display, Formatter};
use std::ops::Mul;
use log::warn;

pub type Matrix4x4 = Matrix4<Float>;

/// A 4x4 affine matrix stored alongside its inverse. Points are column
/// vectors, so `a * b` applies `b` first.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Transform {
    pub m       : Matrix4x4,
    pub m_inv   : Matrix4x4
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            m: Matrix4::identity(),
            m_inv: Matrix4::identity()
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Singular matrices are accepted; their stored inverse is zero.
    pub fn from_matrix(m: &Matrix4x4) -> Self {
        let m_inv = m.try_inverse().unwrap_or_else(|| {
            warn!("Singular matrix in Transform::from_matrix; inverse set to zero");
            Matrix4::zeros()
        });

        Self { m: *m, m_inv }
    }

    pub fn from_row_slice(m: &[Float]) -> Self {
        Self::from_matrix(&Matrix4::from_row_slice(m))
    }

    pub fn from_matrices(m: &Matrix4x4, m_inv: &Matrix4x4) -> Self {
        Self { m: *m, m_inv: *m_inv }
    }

    pub fn inverse(&self) -> Self {
        Self { m: self.m_inv, m_inv: self.m }
    }

    pub fn is_identity(&self) -> bool {
        self.m.is_identity(1e-6)
    }

    pub fn translate(delta: &Vector3f) -> Self {
        let m = Matrix4::new_translation(delta);
        let m_inv = Matrix4::new_translation(&(-*delta));

        Self { m, m_inv }
    }

    pub fn scale(x: Float, y: Float, z: Float) -> Self {
        Self::from_matrix(&Matrix4::new_nonuniform_scaling(&Vector3f::new(x, y, z)))
    }

    pub fn rotate_x(theta: Float) -> Self {
        let (sin_theta, cos_theta) = radians(theta).sin_cos();

        let m = Matrix4::from_row_slice(&[
            1.0, 0.0, 0.0, 0.0,
            0.0, cos_theta, -sin_theta, 0.0,
            0.0, sin_theta, cos_theta, 0.0,
            0.0, 0.0, 0.0, 1.0
        ]);

        Self { m, m_inv: m.transpose() }
    }

    pub fn rotate_y(theta: Float) -> Self {
        let (sin_theta, cos_theta) = radians(theta).sin_cos();

        let m = Matrix4::from_row_slice(&[
            cos_theta, 0.0, sin_theta, 0.0,
            0.0, 1.0, 0.0, 0.0,
            -sin_theta, 0.0, cos_theta, 0.0,
            0.0, 0.0, 0.0, 1.0
        ]);

        Self { m, m_inv: m.transpose() }
    }

    pub fn rotate_z(theta: Float) -> Self {
        let (sin_theta, cos_theta) = radians(theta).sin_cos();

        let m = Matrix4::from_row_slice(&[
            cos_theta, -sin_theta, 0.0, 0.0,
            sin_theta, cos_theta, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0
        ]);

        Self { m, m_inv: m.transpose() }
    }

    /// Rotation of `theta` degrees about an arbitrary axis.
    pub fn rotate(theta: Float, axis: &Vector3f) -> Self {
        let a = axis.normalize();
        let (sin_theta, cos_theta) = radians(theta).sin_cos();
        let mut m: Matrix4x4 = Matrix4::identity();

        m[(0, 0)] = a.x * a.x + (1.0 - a.x * a.x) * cos_theta;
        m[(0, 1)] = a.x * a.y * (1.0 - cos_theta) - a.z * sin_theta;
        m[(0, 2)] = a.x * a.z * (1.0 - cos_theta) + a.y * sin_theta;

        m[(1, 0)] = a.x * a.y * (1.0 - cos_theta) + a.z * sin_theta;
        m[(1, 1)] = a.y * a.y + (1.0 - a.y * a.y) * cos_theta;
        m[(1, 2)] = a.y * a.z * (1.0 - cos_theta) - a.x * sin_theta;

        m[(2, 0)] = a.x * a.z * (1.0 - cos_theta) - a.y * sin_theta;
        m[(2, 1)] = a.y * a.z * (1.0 - cos_theta) + a.x * sin_theta;
        m[(2, 2)] = a.z * a.z + (1.0 - a.z * a.z) * cos_theta;

        Self { m, m_inv: m.transpose() }
    }

    pub fn transform_point(&self, p: &Point3f) -> Point3f {
        let h = self.m * p.to_homogeneous();

        if h.w == 1.0 || h.w == 0.0 {
            Point3f::new(h.x, h.y, h.z)
        } else {
            Point3f::new(h.x / h.w, h.y / h.w, h.z / h.w)
        }
    }

    pub fn transform_vector(&self, v: &Vector3f) -> Vector3f {
        self.m.fixed_slice::<nalgebra::U3, nalgebra::U3>(0, 0) * v
    }

    pub fn transform_bounds(&self, b: &Bounds3f) -> Bounds3f {
        if b.is_empty() { return *b; }

        (0..8).fold(Bounds3f::empty(), |ret, c| {
            ret.union_point(&self.transform_point(&b.corner(c)))
        })
    }

    pub fn translation(&self) -> Vector3f {
        Vector3f::new(self.m[(0, 3)], self.m[(1, 3)], self.m[(2, 3)])
    }

    /// Splits the matrix into translation, rotation and a residual
    /// scale/shear matrix so that `m = T * R * S`. Returns `None` when the
    /// upper 3x3 is singular.
    pub fn decompose(&self) -> Option<Decomposed> {
        let t = self.translation();

        let mut new_m = self.m;
        for i in 0..3 {
            new_m[(i, 3)] = 0.0;
            new_m[(3, i)] = 0.0;
        }
        new_m[(3, 3)] = 1.0;

        // Polar decomposition: average R with its inverse transpose until it
        // converges to the closest rotation.
        let mut r = new_m;
        for _ in 0..100 {
            let r_it = r.transpose().try_inverse()?;
            let rnext = (r + r_it) * 0.5;

            let mut norm: Float = 0.0;
            for i in 0..3 {
                let n = (r[(i, 0)] - rnext[(i, 0)]).abs() +
                        (r[(i, 1)] - rnext[(i, 1)]).abs() +
                        (r[(i, 2)] - rnext[(i, 2)]).abs();
                norm = norm.max(n);
            }

            r = rnext;
            if norm <= 0.0001 { break; }
        }

        // Keep R a proper rotation; a mirror ends up in S
        if r.determinant() < 0.0 {
            for i in 0..3 {
                for j in 0..3 {
                    r[(i, j)] = -r[(i, j)];
                }
            }
        }

        let s = r.try_inverse()? * new_m;

        Some(Decomposed { t, r: Quaternion::from_rotation(&r), s })
    }

    /// Interpolates between two transforms component-wise: translation and
    /// scale linearly, rotation by slerp. Falls back to a plain matrix lerp
    /// when either end cannot be decomposed.
    pub fn interpolate(t0: &Transform, t1: &Transform, dt: Float) -> Transform {
        match (t0.decompose(), t1.decompose()) {
            (Some(d0), Some(d1)) => d0.interpolate(&d1, dt),
            _ => {
                warn!("Degenerate motion sample; falling back to matrix interpolation");
                Transform::from_matrix(&lerp(dt, t0.m, t1.m))
            }
        }
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, other: Self) -> Self::Output {
        Transform {
            m: self.m * other.m,
            m_inv: other.m_inv * self.m_inv
        }
    }
}

impl Display for Transform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for i in 0..4 {
            for j in 0..4 {
                write!(f, " {}", self.m[(i, j)])?;
            }
        }
        write!(f, " ]")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Decomposed {
    pub t: Vector3f,
    pub r: Quaternion,
    pub s: Matrix4x4
}

impl Decomposed {
    pub fn interpolate(&self, other: &Decomposed, dt: Float) -> Transform {
        let trans = self.t * (1.0 - dt) + other.t * dt;

        // Take the short way round
        let r1 = if self.r.dot(&other.r) < 0.0 { -other.r } else { other.r };
        let rotate = self.r.slerp(&r1, dt);

        let mut scale = Matrix4x4::identity();
        for i in 0..3 {
            for j in 0..3 {
                scale[(i, j)] = lerp(dt, self.s[(i, j)], other.s[(i, j)]);
            }
        }

        let r = rotate.to_matrix();

        Transform::translate(&trans) *
            Transform::from_matrices(&r, &r.transpose()) *
            Transform::from_matrix(&scale)
    }
}
