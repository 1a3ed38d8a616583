use crate::core::cortex::Float;
use crate::core::data::{CompoundData, Data};
use crate::core::error::{Error, Result};
use crate::core::geometry::Vector3f;
use crate::core::geometry::bounds::Bounds3f;
use crate::core::parameter::{CompoundParameter, Parameter};
use crate::core::parameterised::{self, ParameterisedProcedural, RenderFlags};
use crate::core::primitive::PrimitiveVariableMap;
use crate::core::renderer::{Renderer, with_attribute_block};
use crate::core::transform::Transform;
use std::sync::Arc;

const CHILDREN: [(&str, [Float; 3]); 6] = [
    ("px", [1.0, 0.0, 0.0]),
    ("nx", [-1.0, 0.0, 0.0]),
    ("py", [0.0, 1.0, 0.0]),
    ("ny", [0.0, -1.0, 0.0]),
    ("pz", [0.0, 0.0, 1.0]),
    ("nz", [0.0, 0.0, -1.0])
];

/// A sphere with six smaller copies of itself on its axes, recursing to
/// a fixed depth. Each copy is its own procedural, so a renderer can cull
/// and defer every level independently.
pub struct SphereFlakeProcedural {
    parameters: CompoundParameter
}

impl SphereFlakeProcedural {
    pub fn new() -> Result<Self> {
        let parameters = CompoundParameter::new("sphereFlake", "Recursive sphere flake.")
            .with(Parameter::new("radius", "Radius of the root sphere.", 1.0 as Float)
                .with_range(Some(0.0), None))?
            .with(Parameter::new("levels", "Number of recursion levels below the root.", 2)
                .with_range(Some(0.0), Some(8.0)))?
            .with(Parameter::new("scale", "Child radius as a fraction of its parent's.", 1.0 as Float / 3.0)
                .with_range(Some(0.0), Some(1.0)))?
            .with(Parameter::new("name", "Value of the name attribute at the root.", "/flake"))?;

        Ok(Self { parameters })
    }

    /// Half-extent of the flake: the root radius plus, per level, the
    /// offset to the child and the child's own extent.
    pub fn extent(radius: Float, scale: Float, levels: i32) -> Float {
        if levels <= 0 {
            return radius;
        }

        radius * (1.0 + scale) + Self::extent(radius * scale, scale, levels - 1)
    }
}

struct Args {
    radius : Float,
    levels : i32,
    scale  : Float,
    name   : String
}

fn args(data: &CompoundData) -> Result<Args> {
    let get = |n: &str| data.get(n).ok_or_else(|| Error::not_found(format!("argument \"{}\"", n)));

    Ok(Args {
        radius : get("radius")?.as_float().unwrap_or(1.0),
        levels : get("levels")?.as_int().unwrap_or(0),
        scale  : get("scale")?.as_float().unwrap_or(0.0),
        name   : get("name")?.as_string().unwrap_or_default()
    })
}

impl ParameterisedProcedural for SphereFlakeProcedural {
    fn parameters(&self) -> &CompoundParameter {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut CompoundParameter {
        &mut self.parameters
    }

    fn do_bound(&self, data: &CompoundData) -> Result<Bounds3f> {
        let a = args(data)?;

        Ok(Bounds3f::from_radius(Self::extent(a.radius, a.scale, a.levels)))
    }

    fn do_render_state(&self, renderer: &mut dyn Renderer, data: &CompoundData) -> Result<()> {
        let a = args(data)?;

        renderer.set_attribute("name", &Data::String(a.name))
    }

    fn do_render(&self, renderer: &mut dyn Renderer, data: &CompoundData) -> Result<()> {
        let a = args(data)?;

        renderer.sphere(a.radius, -1.0, 1.0, 360.0, &PrimitiveVariableMap::new())?;

        if a.levels <= 0 {
            return Ok(());
        }

        let child_radius = a.radius * a.scale;
        let offset = a.radius + child_radius;

        for (suffix, dir) in CHILDREN.iter() {
            let mut child = SphereFlakeProcedural::new()?;
            {
                let p = child.parameters_mut();
                p.set_value("radius", child_radius)?;
                p.set_value("levels", a.levels - 1)?;
                p.set_value("scale", a.scale)?;
                p.set_value("name", format!("{}/{}", a.name, suffix))?;
            }
            let child: Arc<dyn ParameterisedProcedural> = Arc::new(child);

            let d = Vector3f::new(dir[0], dir[1], dir[2]) * offset;
            with_attribute_block(renderer, |r| {
                r.concat_transform(&Transform::translate(&d))?;
                parameterised::render(&child, r, &RenderFlags { in_attribute_block: false, ..Default::default() })
            })?;
        }

        Ok(())
    }
}
