use crate::core::cortex::Float;
use crate::core::data::{CompoundData, Data};
use crate::core::error::Result;
use crate::core::geometry::bounds::Bounds3f;
use crate::core::primitive::{CubicBasis, PrimitiveVariableMap};
use crate::core::transform::Transform;
use std::sync::Arc;

/// Deferred unit of scene content. A renderer may ask for the bound first,
/// then call `render` at most once, later, possibly on another thread.
pub trait Procedural: Send + Sync {
    fn bound(&self) -> Result<Bounds3f>;

    fn render(&self, renderer: &mut dyn Renderer) -> Result<()>;
}

/// The sink that groups, primitives and procedurals render into.
///
/// Every backend follows the same state machine: options and camera are
/// accepted before `world_begin`, everything else only between
/// `world_begin` and `world_end`. Attribute, transform and motion blocks
/// nest with stack discipline; an unmatched end or a block left open at
/// `world_end` is a fatal `Error::State`.
pub trait Renderer {
    fn set_option(&mut self, name: &str, value: &Data) -> Result<()>;
    fn get_option(&self, name: &str) -> Option<Data>;

    fn camera(&mut self, name: &str, parameters: &CompoundData) -> Result<()>;
    fn display(&mut self, name: &str, kind: &str, mode: &str, parameters: &CompoundData) -> Result<()>;

    fn world_begin(&mut self) -> Result<()>;
    fn world_end(&mut self) -> Result<()>;

    fn transform_begin(&mut self) -> Result<()>;
    fn transform_end(&mut self) -> Result<()>;
    fn set_transform(&mut self, m: &Transform) -> Result<()>;
    /// Replaces the current transform with a frame registered earlier
    /// through `coordinate_system`.
    fn set_transform_from(&mut self, coordinate_system: &str) -> Result<()>;
    fn get_transform(&self) -> Result<Transform>;
    fn get_named_transform(&self, coordinate_system: &str) -> Result<Transform>;
    fn concat_transform(&mut self, m: &Transform) -> Result<()>;
    fn coordinate_system(&mut self, name: &str) -> Result<()>;

    fn attribute_begin(&mut self) -> Result<()>;
    fn attribute_end(&mut self) -> Result<()>;
    fn set_attribute(&mut self, name: &str, value: &Data) -> Result<()>;
    fn get_attribute(&self, name: &str) -> Option<Data>;

    fn shader(&mut self, kind: &str, name: &str, parameters: &CompoundData) -> Result<()>;
    fn light(&mut self, name: &str, handle: &str, parameters: &CompoundData) -> Result<()>;
    fn illuminate(&mut self, handle: &str, on: bool) -> Result<()>;

    fn motion_begin(&mut self, times: &[Float]) -> Result<()>;
    fn motion_end(&mut self) -> Result<()>;

    fn points(&mut self, num_points: usize, vars: &PrimitiveVariableMap) -> Result<()>;
    fn sphere(&mut self, radius: Float, z_min: Float, z_max: Float, theta_max: Float,
              vars: &PrimitiveVariableMap) -> Result<()>;
    fn mesh(&mut self, verts_per_face: &[i32], vert_ids: &[i32], interpolation: &str,
            vars: &PrimitiveVariableMap) -> Result<()>;
    fn curves(&mut self, basis: CubicBasis, periodic: bool, num_vertices: &[i32],
              vars: &PrimitiveVariableMap) -> Result<()>;
    fn geometry(&mut self, kind: &str, topology: &CompoundData, vars: &PrimitiveVariableMap) -> Result<()>;

    fn procedural(&mut self, procedural: Arc<dyn Procedural>) -> Result<()>;
}

/// Runs `f` inside an attribute block. The block is closed even when `f`
/// fails; the first error wins.
pub fn with_attribute_block<F>(renderer: &mut dyn Renderer, f: F) -> Result<()>
where F: FnOnce(&mut dyn Renderer) -> Result<()>
{
    renderer.attribute_begin()?;
    let res = f(renderer);
    let end = renderer.attribute_end();

    res.and(end)
}

pub fn with_transform_block<F>(renderer: &mut dyn Renderer, f: F) -> Result<()>
where F: FnOnce(&mut dyn Renderer) -> Result<()>
{
    renderer.transform_begin()?;
    let res = f(renderer);
    let end = renderer.transform_end();

    res.and(end)
}
