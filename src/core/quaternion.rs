use crate::core::geometry::Vector3f;
use crate::core::cortex::{Float, clamp};
use nalgebra::Matrix4;
use std::ops::{Add, Sub, Mul, Neg, Div};

/// Unit quaternion used for the rotational part of motion interpolation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quaternion {
    pub v: Vector3f,
    pub w: Float
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    pub fn identity() -> Self {
        Self {
            v: Vector3f::zeros(),
            w: 1.0
        }
    }

    pub fn dot(&self, q: &Self) -> Float {
        self.v.dot(&q.v) + self.w * q.w
    }

    pub fn normalize(&self) -> Self {
        *self / self.dot(self).sqrt()
    }

    /// Extracts the rotation held in the upper 3x3 of `m`, which must be
    /// orthonormal.
    pub fn from_rotation(m: &Matrix4<Float>) -> Self {
        let trace = m[(0, 0)] + m[(1, 1)] + m[(2, 2)];

        if trace > 0.0 {
            let s = (trace + 1.0).sqrt();
            let w = s / 2.0;
            let s = 0.5 / s;

            let q = Self {
                v: Vector3f::new(
                    (m[(2, 1)] - m[(1, 2)]) * s,
                    (m[(0, 2)] - m[(2, 0)]) * s,
                    (m[(1, 0)] - m[(0, 1)]) * s),
                w
            };

            return q.normalize();
        }

        // Pick the largest diagonal term for stability
        let next = [1usize, 2, 0];
        let mut q = [0.0 as Float; 3];
        let mut i = if m[(1, 1)] > m[(0, 0)] { 1 } else { 0 };
        if m[(2, 2)] > m[(i, i)] { i = 2; }
        let j = next[i];
        let k = next[j];

        let mut s = ((m[(i, i)] - (m[(j, j)] + m[(k, k)])) + 1.0).sqrt();
        q[i] = s * 0.5;
        if s != 0.0 { s = 0.5 / s; }
        let w = (m[(k, j)] - m[(j, k)]) * s;
        q[j] = (m[(j, i)] + m[(i, j)]) * s;
        q[k] = (m[(k, i)] + m[(i, k)]) * s;

        Self { v: Vector3f::new(q[0], q[1], q[2]), w }.normalize()
    }

    pub fn to_matrix(&self) -> Matrix4<Float> {
        let (x, y, z, w) = (self.v.x, self.v.y, self.v.z, self.w);
        let mut m = Matrix4::identity();

        m[(0, 0)] = 1.0 - 2.0 * (y * y + z * z);
        m[(0, 1)] = 2.0 * (x * y - z * w);
        m[(0, 2)] = 2.0 * (x * z + y * w);
        m[(1, 0)] = 2.0 * (x * y + z * w);
        m[(1, 1)] = 1.0 - 2.0 * (x * x + z * z);
        m[(1, 2)] = 2.0 * (y * z - x * w);
        m[(2, 0)] = 2.0 * (x * z - y * w);
        m[(2, 1)] = 2.0 * (y * z + x * w);
        m[(2, 2)] = 1.0 - 2.0 * (x * x + y * y);

        m
    }

    pub fn slerp(&self, q: &Self, t: Float) -> Self {
        let cos_theta = self.dot(q);

        if cos_theta > 0.9995 {
            return (*self * (1.0 - t) + *q * t).normalize();
        }

        let theta = clamp(cos_theta, -1.0, 1.0).acos();
        let thetap = theta * t;
        let qperp = (*q - *self * cos_theta).normalize();

        *self * thetap.cos() + qperp * thetap.sin()
    }
}

impl Add for Quaternion {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self { v: self.v + other.v, w: self.w + other.w }
    }
}

impl Sub for Quaternion {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self { v: self.v - other.v, w: self.w - other.w }
    }
}

impl Neg for Quaternion {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self { v: -self.v, w: -self.w }
    }
}

impl Mul<Float> for Quaternion {
    type Output = Self;

    fn mul(self, f: Float) -> Self::Output {
        Self { v: self.v * f, w: self.w * f }
    }
}

impl Div<Float> for Quaternion {
    type Output = Self;

    fn div(self, f: Float) -> Self::Output {
        Self { v: self.v / f, w: self.w / f }
    }
}
