use crate::core::cortex::Float;
use crate::core::data::{CompoundData, Data};
use crate::core::error::{Error, Result};
use crate::core::geometry::bounds::Bounds3f;
use crate::core::primitive::{Primitive, Primitives};
use crate::core::state::{Light, MatrixMotionTransform, Shader};
use crate::core::transform::Transform;
use std::collections::{BTreeMap, HashMap};
use std::mem::discriminant;

/// Option holding a world-space `Box3f`; procedurals outside it are culled.
pub const CULL_REGION: &str = "cull:region";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    World,
    Finished
}

impl Default for RendererState {
    fn default() -> Self {
        RendererState::Uninitialized
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Attribute,
    Transform
}

/// Everything an attribute block saves and restores apart from the
/// transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphicsState {
    pub attributes : CompoundData,
    pub shaders    : Vec<Shader>,
    pub lights     : BTreeMap<String, bool>
}

#[derive(Debug, Clone)]
pub enum MotionSample {
    Concat(Transform),
    Set(Transform),
    Primitive(Primitives)
}

#[derive(Debug)]
struct MotionBlock {
    times   : Vec<Float>,
    samples : Vec<MotionSample>
}

#[derive(Debug, Clone)]
struct Frame {
    kind           : BlockKind,
    graphics_state : GraphicsState,
    transform      : MatrixMotionTransform
}

/// The state visible at a call site, used to seed the context a deferred
/// procedural renders into.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub graphics_state          : GraphicsState,
    pub transform               : MatrixMotionTransform,
    pub named_coordinate_system : HashMap<String, MatrixMotionTransform>,
    pub options                 : CompoundData
}

/// Block discipline shared by every backend: the world state machine, the
/// attribute and transform stacks, motion blocks and named frames.
#[derive(Debug, Default)]
pub struct StateStack {
    current_state           : RendererState,
    graphics_state          : GraphicsState,
    transform               : MatrixMotionTransform,
    pushed                  : Vec<Frame>,
    motion                  : Option<MotionBlock>,
    named_coordinate_system : HashMap<String, MatrixMotionTransform>,
    options                 : CompoundData
}

impl StateStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context already inside the world, at depth zero, holding the
    /// state captured in `snapshot`.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            current_state           : RendererState::World,
            graphics_state          : snapshot.graphics_state,
            transform               : snapshot.transform,
            pushed                  : Vec::new(),
            motion                  : None,
            named_coordinate_system : snapshot.named_coordinate_system,
            options                 : snapshot.options
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            graphics_state          : self.graphics_state.clone(),
            transform               : self.transform.clone(),
            named_coordinate_system : self.named_coordinate_system.clone(),
            options                 : self.options.clone()
        }
    }

    pub fn state(&self) -> RendererState {
        self.current_state
    }

    pub fn depth(&self) -> usize {
        self.pushed.len()
    }

    pub fn in_motion(&self) -> bool {
        self.motion.is_some()
    }

    pub fn graphics_state(&self) -> &GraphicsState {
        &self.graphics_state
    }

    pub fn current_transform(&self) -> &MatrixMotionTransform {
        &self.transform
    }

    pub fn options(&self) -> &CompoundData {
        &self.options
    }

    pub fn verify_options(&self, call: &str) -> Result<()> {
        match self.current_state {
            RendererState::Uninitialized => Ok(()),
            RendererState::World => Err(Error::state(call, "options cannot be set inside the world block")),
            RendererState::Finished => Err(Error::state(call, "renderer has already finished"))
        }
    }

    /// Calls that may appear inside a motion block use this check.
    pub fn verify_world_motion(&self, call: &str) -> Result<()> {
        match self.current_state {
            RendererState::World => Ok(()),
            RendererState::Uninitialized => Err(Error::state(call, "must be inside the world block")),
            RendererState::Finished => Err(Error::state(call, "renderer has already finished"))
        }
    }

    pub fn verify_world(&self, call: &str) -> Result<()> {
        self.verify_world_motion(call)?;

        if self.motion.is_some() {
            return Err(Error::state(call, "not allowed inside a motion block"));
        }

        Ok(())
    }

    /// Fails unless every block opened in this context has been closed.
    pub fn verify_balanced(&self, call: &str) -> Result<()> {
        self.verify_world_motion(call)?;

        if self.motion.is_some() {
            return Err(Error::state(call, "unclosed motion block"));
        }

        if let Some(frame) = self.pushed.last() {
            let kind = match frame.kind {
                BlockKind::Attribute => "attribute",
                BlockKind::Transform => "transform"
            };
            return Err(Error::state(call, format!("{} unclosed block(s), innermost is a {} block",
                                                  self.pushed.len(), kind)));
        }

        Ok(())
    }

    pub fn set_option(&mut self, name: &str, value: &Data) -> Result<()> {
        self.verify_options("set_option")?;
        self.options.insert(name.to_owned(), value.clone());

        Ok(())
    }

    pub fn get_option(&self, name: &str) -> Option<Data> {
        self.options.get(name).cloned()
    }

    pub fn world_begin(&mut self) -> Result<()> {
        match self.current_state {
            RendererState::Uninitialized => (),
            RendererState::World => return Err(Error::state("world_begin", "already inside the world block")),
            RendererState::Finished => return Err(Error::state("world_begin", "renderer has already finished"))
        }

        self.current_state = RendererState::World;
        self.transform = MatrixMotionTransform::new();
        self.named_coordinate_system.insert("world".to_owned(), self.transform.clone());

        Ok(())
    }

    pub fn world_end(&mut self) -> Result<()> {
        self.verify_balanced("world_end")?;
        self.current_state = RendererState::Finished;

        Ok(())
    }

    pub fn attribute_begin(&mut self) -> Result<()> {
        self.verify_world("attribute_begin")?;
        self.pushed.push(Frame {
            kind: BlockKind::Attribute,
            graphics_state: self.graphics_state.clone(),
            transform: self.transform.clone()
        });

        Ok(())
    }

    pub fn attribute_end(&mut self) -> Result<()> {
        self.verify_world("attribute_end")?;

        match self.pushed.last() {
            Some(f) if f.kind == BlockKind::Attribute => (),
            Some(_) => return Err(Error::state("attribute_end", "innermost open block is a transform block")),
            None => return Err(Error::state("attribute_end", "unmatched attribute_end"))
        }

        if let Some(f) = self.pushed.pop() {
            self.graphics_state = f.graphics_state;
            self.transform = f.transform;
        }

        Ok(())
    }

    pub fn transform_begin(&mut self) -> Result<()> {
        self.verify_world("transform_begin")?;
        self.pushed.push(Frame {
            kind: BlockKind::Transform,
            graphics_state: GraphicsState::default(),
            transform: self.transform.clone()
        });

        Ok(())
    }

    pub fn transform_end(&mut self) -> Result<()> {
        self.verify_world("transform_end")?;

        match self.pushed.last() {
            Some(f) if f.kind == BlockKind::Transform => (),
            Some(_) => return Err(Error::state("transform_end", "innermost open block is an attribute block")),
            None => return Err(Error::state("transform_end", "unmatched transform_end"))
        }

        if let Some(f) = self.pushed.pop() {
            self.transform = f.transform;
        }

        Ok(())
    }

    /// Pops frames until `depth` remain and drops any open motion block.
    /// Used to restore a call site after a procedural fails midway.
    pub fn unwind_to(&mut self, depth: usize) {
        self.motion = None;

        while self.pushed.len() > depth {
            if let Some(f) = self.pushed.pop() {
                if f.kind == BlockKind::Attribute {
                    self.graphics_state = f.graphics_state;
                }
                self.transform = f.transform;
            }
        }
    }

    fn push_motion_sample(&mut self, call: &str, sample: MotionSample) -> Result<bool> {
        let block = match self.motion.as_mut() {
            Some(b) => b,
            None => return Ok(false)
        };

        if block.samples.len() >= block.times.len() {
            return Err(Error::topology(format!(
                "\"{}\": motion block declared {} times but received more samples",
                call, block.times.len())));
        }

        if let Some(first) = block.samples.first() {
            if discriminant(first) != discriminant(&sample) {
                return Err(Error::topology(format!(
                    "\"{}\": motion block samples must all be the same call", call)));
            }

            if let (MotionSample::Primitive(a), MotionSample::Primitive(b)) = (first, &sample) {
                if a.topology() != b.topology() {
                    return Err(Error::topology(format!(
                        "\"{}\": expected {}, got {}", call, a.topology(), b.topology())));
                }
            }
        }

        block.samples.push(sample);
        Ok(true)
    }

    pub fn concat_transform(&mut self, m: &Transform) -> Result<()> {
        self.verify_world_motion("concat_transform")?;

        if !self.push_motion_sample("concat_transform", MotionSample::Concat(*m))? {
            self.transform = self.transform.concat(m);
        }

        Ok(())
    }

    pub fn set_transform(&mut self, m: &Transform) -> Result<()> {
        self.verify_world_motion("set_transform")?;

        if !self.push_motion_sample("set_transform", MotionSample::Set(*m))? {
            self.transform = (*m).into();
        }

        Ok(())
    }

    pub fn set_transform_from(&mut self, coordinate_system: &str) -> Result<()> {
        self.verify_world("set_transform")?;

        self.transform = self.named_coordinate_system
            .get(coordinate_system)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("coordinate system \"{}\"", coordinate_system)))?;

        Ok(())
    }

    /// The current transform at its first motion sample.
    pub fn get_transform(&self) -> Transform {
        self.transform.first()
    }

    pub fn get_named_transform(&self, coordinate_system: &str) -> Result<Transform> {
        self.named_coordinate_system
            .get(coordinate_system)
            .map(|t| t.first())
            .ok_or_else(|| Error::not_found(format!("coordinate system \"{}\"", coordinate_system)))
    }

    pub fn coordinate_system(&mut self, name: &str) -> Result<()> {
        self.verify_world("coordinate_system")?;
        self.named_coordinate_system.insert(name.to_owned(), self.transform.clone());

        Ok(())
    }

    pub fn set_attribute(&mut self, name: &str, value: &Data) -> Result<()> {
        self.verify_world("set_attribute")?;
        self.graphics_state.attributes.insert(name.to_owned(), value.clone());

        Ok(())
    }

    pub fn get_attribute(&self, name: &str) -> Option<Data> {
        self.graphics_state.attributes.get(name).cloned()
    }

    /// A shader replaces any earlier one of the same kind.
    pub fn shader(&mut self, shader: Shader) -> Result<()> {
        self.verify_world("shader")?;

        let shaders = &mut self.graphics_state.shaders;
        match shaders.iter_mut().find(|s| s.kind == shader.kind) {
            Some(s) => *s = shader,
            None => shaders.push(shader)
        }

        Ok(())
    }

    pub fn light(&mut self, light: &Light) -> Result<()> {
        self.verify_world("light")?;
        self.graphics_state.lights.insert(light.handle.clone(), true);

        Ok(())
    }

    pub fn illuminate(&mut self, handle: &str, on: bool) -> Result<()> {
        self.verify_world("illuminate")?;

        match self.graphics_state.lights.get_mut(handle) {
            Some(state) => { *state = on; Ok(()) }
            None => Err(Error::not_found(format!("light \"{}\"", handle)))
        }
    }

    pub fn motion_begin(&mut self, times: &[Float]) -> Result<()> {
        self.verify_world_motion("motion_begin")?;

        if self.motion.is_some() {
            return Err(Error::state("motion_begin", "motion blocks cannot be nested"));
        }

        if times.is_empty() {
            return Err(Error::invalid("motion_begin needs at least one sample time"));
        }

        if times.iter().any(|t| t.is_nan()) || times.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(Error::invalid("motion sample times must be strictly increasing"));
        }

        self.motion = Some(MotionBlock { times: times.to_vec(), samples: Vec::new() });
        Ok(())
    }

    /// Closes the motion block. Transform samples are folded into the
    /// current transform here; geometry samples are handed back so the
    /// backend can emit them as one motion primitive.
    pub fn motion_end(&mut self) -> Result<Option<(Vec<Float>, Vec<Primitives>)>> {
        self.verify_world_motion("motion_end")?;

        let block = self.motion
            .take()
            .ok_or_else(|| Error::state("motion_end", "unmatched motion_end"))?;

        if block.samples.len() != block.times.len() {
            return Err(Error::topology(format!(
                "motion block declared {} times but received {} samples",
                block.times.len(), block.samples.len())));
        }

        let mut local = MatrixMotionTransform::new();
        let mut set = false;
        let mut primitives = Vec::new();

        for (time, sample) in block.times.iter().zip(block.samples.into_iter()) {
            match sample {
                MotionSample::Concat(m) => local.add_snapshot(*time, m)?,
                MotionSample::Set(m) => { set = true; local.add_snapshot(*time, m)? }
                MotionSample::Primitive(p) => primitives.push(p)
            }
        }

        if !primitives.is_empty() {
            return Ok(Some((block.times, primitives)));
        }

        self.transform = if set { local } else { self.transform.compose(&local) };
        Ok(None)
    }

    /// Routes geometry through an open motion block. Returns the primitive
    /// back when it should be emitted right away.
    pub fn emit(&mut self, call: &str, primitive: Primitives) -> Result<Option<Primitives>> {
        self.verify_world_motion(call)?;

        if self.motion.is_some() {
            self.push_motion_sample(call, MotionSample::Primitive(primitive))?;
            return Ok(None);
        }

        Ok(Some(primitive))
    }

    /// World-space box swept by `bound` over every sample of the current
    /// transform.
    pub fn world_bound(&self, bound: &Bounds3f) -> Bounds3f {
        if self.transform.is_empty() {
            return *bound;
        }

        self.transform
            .samples()
            .fold(Bounds3f::empty(), |acc, (_, t)| acc.union_bounds(&t.transform_bounds(bound)))
    }

    /// True for empty bounds, and for bounds that miss the `cull:region`
    /// option at every motion sample.
    pub fn culled(&self, bound: &Bounds3f) -> bool {
        if bound.is_empty() { return true; }

        match self.options.get(CULL_REGION) {
            Some(Data::Box3f(region)) => !self.world_bound(bound).overlaps(region),
            _ => false
        }
    }
}
