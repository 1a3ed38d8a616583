use std::ops::{Add, Mul, Sub};
use num::One;

pub type Float = f32;

pub const PI: Float = std::f32::consts::PI;

#[inline]
pub fn lerp<T, S>(t: S, x: T, y: T) -> T
    where
        S: Copy + One + Sub<S, Output=S>,
        T: Add<T, Output=T> + Mul<S, Output=T>
{
    let one: S = One::one();

    x * (one - t) + y * t
}

#[inline]
pub fn radians(deg: Float) -> Float {
    (PI / 180.0) * deg
}

pub fn clamp<T>(val: T, low: T, high: T) -> T
where T: PartialOrd
{
    if val < low {
        low
    } else if val > high {
        high
    } else {
        val
    }
}
