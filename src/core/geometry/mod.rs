use nalgebra::{Point3, Vector3};
use crate::core::cortex::Float;

pub mod bounds;

pub type Point3f = Point3<Float>;
pub type Vector3f = Vector3<Float>;
pub type Color3f = Vector3<Float>;
