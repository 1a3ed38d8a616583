pub mod cortex;
pub mod error;
pub mod geometry;
pub mod quaternion;
pub mod transform;
#[macro_use]
pub mod data;
pub mod primitive;
pub mod renderer;
pub mod state;
pub mod group;
pub mod statestack;
pub mod parameter;
pub mod parameterised;
pub mod registry;
pub mod fileutil;
