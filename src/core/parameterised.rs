use crate::core::data::CompoundData;
use crate::core::error::Result;
use crate::core::geometry::bounds::Bounds3f;
use crate::core::parameter::CompoundParameter;
use crate::core::renderer::{Procedural, Renderer, with_attribute_block};
use std::sync::Arc;

/// User extension point: a parameter schema plus the two halves of the
/// bound/render contract.
///
/// `do_bound` must enclose everything `do_render` emits for the same
/// arguments. Both receive the validated parameter values; neither may
/// change state that the other observes, so `bound` stays idempotent.
pub trait ParameterisedProcedural: Send + Sync {
    fn parameters(&self) -> &CompoundParameter;

    fn parameters_mut(&mut self) -> &mut CompoundParameter;

    fn do_bound(&self, args: &CompoundData) -> Result<Bounds3f>;

    /// Attributes and shaders that belong to the procedural rather than to
    /// its geometry.
    fn do_render_state(&self, _renderer: &mut dyn Renderer, _args: &CompoundData) -> Result<()> {
        Ok(())
    }

    fn do_render(&self, renderer: &mut dyn Renderer, args: &CompoundData) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderFlags {
    pub in_attribute_block : bool,
    pub with_state         : bool,
    pub with_geometry      : bool,
    /// Call `do_render` directly instead of handing the renderer a
    /// procedural it may bound, cull or defer.
    pub immediate_geometry : bool
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            in_attribute_block: true,
            with_state: true,
            with_geometry: true,
            immediate_geometry: false
        }
    }
}

/// Validated bound of `procedural` for its current parameter values.
pub fn bound(procedural: &dyn ParameterisedProcedural) -> Result<Bounds3f> {
    let args = procedural.parameters().validated_value()?;

    procedural.do_bound(&args)
}

/// Validates the parameters, then renders state and geometry according to
/// `flags`. Invalid parameters fail before anything reaches the renderer.
pub fn render(
    procedural: &Arc<dyn ParameterisedProcedural>,
    renderer: &mut dyn Renderer,
    flags: &RenderFlags) -> Result<()> {
    let args = procedural.parameters().validated_value()?;

    let body = |r: &mut dyn Renderer| -> Result<()> {
        if flags.with_state {
            procedural.do_render_state(r, &args)?;
        }

        if flags.with_geometry {
            if flags.immediate_geometry {
                procedural.do_render(r, &args)?;
            } else {
                let forwarder = Forwarder {
                    procedural: procedural.clone(),
                    args: args.clone()
                };
                r.procedural(Arc::new(forwarder))?;
            }
        }

        Ok(())
    };

    if flags.in_attribute_block {
        with_attribute_block(renderer, body)
    } else {
        body(renderer)
    }
}

/// Hands a parameterised procedural to a renderer with its arguments
/// frozen at the call site.
struct Forwarder {
    procedural : Arc<dyn ParameterisedProcedural>,
    args       : CompoundData
}

impl Procedural for Forwarder {
    fn bound(&self) -> Result<Bounds3f> {
        self.procedural.do_bound(&self.args)
    }

    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        self.procedural.do_render(renderer, &self.args)
    }
}
