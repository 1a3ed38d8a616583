use super::{Point3f, Vector3f};
use crate::core::cortex::Float;
use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};

/// Axis-aligned box. The default box is empty: its minimum lies above its
/// maximum on every axis, so any union with it yields the other operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3f {
    pub p_min: Point3f,
    pub p_max: Point3f
}

impl Default for Bounds3f {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds3f {
    pub fn empty() -> Self {
        Self {
            p_min: Point3f::new(Float::MAX, Float::MAX, Float::MAX),
            p_max: Point3f::new(Float::MIN, Float::MIN, Float::MIN)
        }
    }

    pub fn from_point(p: &Point3f) -> Self {
        Self {
            p_min: *p,
            p_max: *p
        }
    }

    pub fn from_points(p1: Point3f, p2: Point3f) -> Self {
        Self {
            p_min: Point3f::new(p1.x.min(p2.x), p1.y.min(p2.y), p1.z.min(p2.z)),
            p_max: Point3f::new(p1.x.max(p2.x), p1.y.max(p2.y), p1.z.max(p2.z))
        }
    }

    /// Cube of half-extent `r` centred on the origin.
    pub fn from_radius(r: Float) -> Self {
        Self {
            p_min: Point3f::new(-r, -r, -r),
            p_max: Point3f::new(r, r, r)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.p_max.x < self.p_min.x ||
        self.p_max.y < self.p_min.y ||
        self.p_max.z < self.p_min.z
    }

    pub fn corner(&self, c: usize) -> Point3f {
        Point3f::new(
            self[c & 1].x,
            self[if c & 2 != 0 { 1 } else { 0 }].y,
            self[if c & 4 != 0 { 1 } else { 0 }].z)
    }

    pub fn diagonal(&self) -> Vector3f {
        if self.is_empty() {
            return Vector3f::zeros();
        }

        self.p_max - self.p_min
    }

    pub fn center(&self) -> Point3f {
        Point3f::new(
            (self.p_min.x + self.p_max.x) * 0.5,
            (self.p_min.y + self.p_max.y) * 0.5,
            (self.p_min.z + self.p_max.z) * 0.5)
    }

    pub fn union_point(&self, p: &Point3f) -> Self {
        Self {
            p_min: Point3f::new(self.p_min.x.min(p.x), self.p_min.y.min(p.y), self.p_min.z.min(p.z)),
            p_max: Point3f::new(self.p_max.x.max(p.x), self.p_max.y.max(p.y), self.p_max.z.max(p.z))
        }
    }

    pub fn union_bounds(&self, b: &Self) -> Self {
        if b.is_empty() { return *self; }
        if self.is_empty() { return *b; }

        self.union_point(&b.p_min).union_point(&b.p_max)
    }

    pub fn intersect(&self, b: &Self) -> Self {
        Self {
            p_min: Point3f::new(self.p_min.x.max(b.p_min.x), self.p_min.y.max(b.p_min.y), self.p_min.z.max(b.p_min.z)),
            p_max: Point3f::new(self.p_max.x.min(b.p_max.x), self.p_max.y.min(b.p_max.y), self.p_max.z.min(b.p_max.z))
        }
    }

    pub fn overlaps(&self, b: &Self) -> bool {
        if self.is_empty() || b.is_empty() { return false; }

        let x = self.p_max.x >= b.p_min.x && self.p_min.x <= b.p_max.x;
        let y = self.p_max.y >= b.p_min.y && self.p_min.y <= b.p_max.y;
        let z = self.p_max.z >= b.p_min.z && self.p_min.z <= b.p_max.z;

        x && y && z
    }

    pub fn inside(&self, p: &Point3f) -> bool {
        p.x >= self.p_min.x && p.x <= self.p_max.x &&
        p.y >= self.p_min.y && p.y <= self.p_max.y &&
        p.z >= self.p_min.z && p.z <= self.p_max.z
    }

    pub fn expand(&self, delta: Float) -> Self {
        if self.is_empty() { return *self; }

        let d = Vector3f::new(delta, delta, delta);

        Self {
            p_min: self.p_min - d,
            p_max: self.p_max + d
        }
    }
}

impl Index<usize> for Bounds3f {
    type Output = Point3f;

    fn index(&self, i: usize) -> &Self::Output {
        assert!(i == 0 || i == 1);

        if i == 0 { &self.p_min } else { &self.p_max }
    }
}

impl IndexMut<usize> for Bounds3f {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        assert!(i == 0 || i == 1);

        if i == 0 { &mut self.p_min } else { &mut self.p_max }
    }
}

impl Display for Bounds3f {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "[ empty ]");
        }

        write!(
            f, "[ {} {} {} - {} {} {} ]",
            self.p_min.x, self.p_min.y, self.p_min.z,
            self.p_max.x, self.p_max.y, self.p_max.z)
    }
}
