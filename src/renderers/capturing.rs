use crate::core::cortex::Float;
use crate::core::data::{CompoundData, Data};
use crate::core::error::{Error, Result};
use crate::core::geometry::bounds::Bounds3f;
use crate::core::group::Group;
use crate::core::primitive::*;
use crate::core::renderer::{Procedural, Renderer};
use crate::core::state::{AttributeState, Light, MatrixMotionTransform, Shader, Transforms};
use crate::core::statestack::{GraphicsState, Snapshot, StateStack};
use crate::core::transform::Transform;
use rayon::prelude::*;
use regex::Regex;
use std::sync::Arc;
use log::{debug, error};

/// StringVector option of name patterns; when set, only objects whose
/// "name" attribute matches, or could be an ancestor of a match, are kept.
pub const OBJECT_FILTER: &str = "cp:objectFilter";

/// Bool attribute; false makes the capture expand a procedural inline
/// instead of on a worker thread.
pub const PROCEDURAL_REENTRANT: &str = "cp:procedural:reentrant";

/// One `/`-separated name pattern. Each component is a shell-style glob.
#[derive(Debug, Clone)]
struct NamePattern {
    components : Vec<Regex>,
    source     : Vec<String>
}

impl NamePattern {
    fn new(pattern: &str) -> Result<Self> {
        let source: Vec<String> = pattern
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_owned())
            .collect();

        let components = source
            .iter()
            .map(|c| glob_to_regex(c))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { components, source })
    }

    /// The name matches the pattern exactly, or lies below a pattern that
    /// ends in `*`.
    fn matches(&self, name: &[&str]) -> bool {
        if self.components.len() > name.len() { return false; }

        for (i, (re, n)) in self.components.iter().zip(name.iter()).enumerate() {
            if !re.is_match(n) { return false; }

            if i + 1 == self.components.len() && self.source[i] == "*" {
                return true;
            }
        }

        self.components.len() == name.len()
    }

    /// The name is a strict ancestor of something the pattern could match.
    fn matches_parents(&self, name: &[&str]) -> bool {
        if name.len() >= self.components.len() { return false; }

        self.components
            .iter()
            .zip(name.iter())
            .all(|(re, n)| re.is_match(n))
    }
}

fn glob_to_regex(glob: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let mut in_class = false;

    for c in glob.chars() {
        match c {
            '*' if !in_class => re.push_str(".*"),
            '?' if !in_class => re.push('.'),
            '[' if !in_class => { in_class = true; re.push('[') }
            ']' if in_class  => { in_class = false; re.push(']') }
            '!' if in_class && re.ends_with('[') => re.push('^'),
            c if in_class    => re.push(c),
            c                => re.push_str(&regex::escape(&c.to_string()))
        }
    }

    re.push('$');

    Regex::new(&re).map_err(|e| Error::invalid(format!("bad object filter \"{}\": {}", glob, e)))
}

#[derive(Debug, Clone, Default)]
struct ObjectFilter {
    patterns: Vec<NamePattern>
}

impl ObjectFilter {
    fn from_options(options: &CompoundData) -> Result<Option<Self>> {
        let patterns = match options.get(OBJECT_FILTER) {
            Some(Data::StringVector(p)) => p,
            Some(d) => return Err(Error::type_error("StringVectorData", d.type_name())),
            None => return Ok(None)
        };

        let patterns = patterns
            .iter()
            .map(|p| NamePattern::new(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self { patterns }))
    }

    fn accepts(&self, name: &str) -> bool {
        let name: Vec<&str> = name.split('/').filter(|c| !c.is_empty()).collect();

        self.patterns
            .iter()
            .any(|p| p.matches(&name) || p.matches_parents(&name))
    }
}

/// Where captured content goes at one block depth, and the state that
/// group already carries.
#[derive(Debug, Clone)]
struct Frame {
    group          : Arc<Group>,
    graphics_state : GraphicsState,
    transform      : MatrixMotionTransform,
    lights         : Vec<Light>
}

/// A procedural waiting for `world_end`, together with the group its
/// output lands in.
struct Pending {
    snapshot    : Snapshot,
    placeholder : Arc<Group>,
    procedural  : Arc<dyn Procedural>
}

impl Pending {
    fn expand(self) -> Result<()> {
        let mut sub = CapturingRenderer::from_snapshot(self.snapshot, self.placeholder.clone())?;

        let res = self.procedural
            .render(&mut sub)
            .and_then(|_| sub.stack.verify_balanced("procedural"))
            .and_then(|_| sub.flush());

        match res {
            Err(e) if !e.is_fatal() => {
                error!("Procedural failed, capturing it as empty: {}", e);
                self.placeholder.clear_children();
                Ok(())
            }
            res => res
        }
    }
}

/// Backend that turns the call stream back into a Group hierarchy.
///
/// Each attribute block becomes a group. Geometry emitted after a state
/// change inside a block is wrapped in its own group carrying that state,
/// so state never applies to earlier siblings. Procedurals are expanded
/// in parallel at `world_end`, each into the group reserved for it at the
/// call site; the resulting tree is identical from run to run.
pub struct CapturingRenderer {
    stack   : StateStack,
    frames  : Vec<Frame>,
    root    : Option<Arc<Group>>,
    filter  : Option<ObjectFilter>,
    pending : Vec<Pending>
}

impl Default for CapturingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturingRenderer {
    pub fn new() -> Self {
        Self {
            stack   : StateStack::new(),
            frames  : Vec::new(),
            root    : None,
            filter  : None,
            pending : Vec::new()
        }
    }

    fn from_snapshot(snapshot: Snapshot, root: Arc<Group>) -> Result<Self> {
        let filter = ObjectFilter::from_options(&snapshot.options)?;
        let frame = Frame {
            group          : root.clone(),
            graphics_state : snapshot.graphics_state.clone(),
            transform      : snapshot.transform.clone(),
            lights         : Vec::new()
        };

        Ok(Self {
            stack   : StateStack::from_snapshot(snapshot),
            frames  : vec![frame],
            root    : Some(root),
            filter,
            pending : Vec::new()
        })
    }

    /// The captured world; `None` before `world_begin`.
    pub fn world(&self) -> Option<Arc<Group>> {
        self.root.clone()
    }

    fn frame(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| Error::state("capture", "no open world block"))
    }

    fn frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::state("capture", "no open world block"))
    }

    fn accepts_current_name(&self) -> bool {
        let filter = match self.filter {
            Some(ref f) => f,
            None => return true
        };

        match self.stack.get_attribute("name") {
            Some(Data::String(name)) => filter.accepts(&name),
            _ => true
        }
    }

    /// The transform between the frame's group and the current state,
    /// sampled at every time either one is keyed at.
    fn local_transform(&self, frame: &Frame) -> Result<Option<Transforms>> {
        let current = self.stack.current_transform();
        if *current == frame.transform { return Ok(None); }

        let times = frame.transform.sample_times(current);

        if times.is_empty() {
            let local = frame.transform.first().inverse() * current.first();
            return Ok(if local.is_identity() { None } else { Some(local.into()) });
        }

        let samples = times.into_iter().map(|t| {
            (t, frame.transform.transform(t).inverse() * current.transform(t))
        });

        Ok(Some(MatrixMotionTransform::from_samples(samples)?.into()))
    }

    /// A fresh group holding whatever state was set in the current frame
    /// since its group was made, or `None` when nothing changed.
    fn state_group(&self) -> Result<Option<Arc<Group>>> {
        let frame = self.frame()?;
        let base = &frame.graphics_state;
        let current = self.stack.graphics_state();

        let attributes: CompoundData = current.attributes
            .iter()
            .filter(|(k, v)| base.attributes.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let shaders: Vec<&Shader> = current.shaders
            .iter()
            .filter(|s| !base.shaders.contains(s))
            .collect();

        let transform = self.local_transform(frame)?;

        if attributes.is_empty() && shaders.is_empty() && frame.lights.is_empty() && transform.is_none() {
            return Ok(None);
        }

        let group = Group::new();
        group.set_transform(transform);

        if !attributes.is_empty() {
            group.add_state(AttributeState::new(attributes))?;
        }

        for s in shaders {
            group.add_state(s.clone())?;
        }

        for l in frame.lights.iter() {
            group.add_state(l.clone())?;
        }

        Ok(Some(group))
    }

    fn add_primitive(&mut self, primitive: Primitives) -> Result<()> {
        if !self.accepts_current_name() {
            debug!("Object filter rejected {}", primitive.topology());
            return Ok(());
        }

        let parent = self.frame()?.group.clone();

        match self.state_group()? {
            Some(wrapper) => {
                wrapper.add_child(primitive)?;
                parent.add_child(wrapper)
            }
            None => parent.add_child(primitive)
        }
    }

    fn emit(&mut self, call: &str, primitive: Primitives) -> Result<()> {
        match self.stack.emit(call, primitive)? {
            Some(p) => self.add_primitive(p),
            None => Ok(())
        }
    }

    /// Opens a child group carrying the current frame's local state and
    /// makes it the target of everything emitted until the matching end.
    fn push_group(&mut self) -> Result<Arc<Group>> {
        let group = match self.state_group()? {
            Some(g) => g,
            None => Group::new()
        };

        self.frame()?.group.add_child(group.clone())?;

        self.frames.push(Frame {
            group          : group.clone(),
            graphics_state : self.stack.graphics_state().clone(),
            transform      : self.stack.current_transform().clone(),
            lights         : Vec::new()
        });

        Ok(group)
    }

    fn unwind_to(&mut self, depth: usize) {
        self.stack.unwind_to(depth);
        self.frames.truncate(depth + 1);
    }

    /// Expands the queued procedurals in parallel. Each expansion queues
    /// and expands its own nested procedurals before returning.
    fn flush(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() { return Ok(()); }

        debug!("Expanding {} procedurals", pending.len());

        pending
            .into_par_iter()
            .map(Pending::expand)
            .collect::<Vec<Result<()>>>()
            .into_iter()
            .collect()
    }
}

impl Renderer for CapturingRenderer {
    fn set_option(&mut self, name: &str, value: &Data) -> Result<()> {
        if name == OBJECT_FILTER {
            let mut options = CompoundData::new();
            options.insert(name.to_owned(), value.clone());
            ObjectFilter::from_options(&options)?;
        }

        self.stack.set_option(name, value)
    }

    fn get_option(&self, name: &str) -> Option<Data> {
        self.stack.get_option(name)
    }

    fn camera(&mut self, name: &str, _parameters: &CompoundData) -> Result<()> {
        self.stack.verify_options("camera")?;
        debug!("Ignoring camera \"{}\"", name);
        Ok(())
    }

    fn display(&mut self, name: &str, _kind: &str, _mode: &str, _parameters: &CompoundData) -> Result<()> {
        self.stack.verify_options("display")?;
        debug!("Ignoring display \"{}\"", name);
        Ok(())
    }

    fn world_begin(&mut self) -> Result<()> {
        self.stack.world_begin()?;
        self.filter = ObjectFilter::from_options(self.stack.options())?;

        let root = Group::new();
        self.frames.push(Frame {
            group          : root.clone(),
            graphics_state : self.stack.graphics_state().clone(),
            transform      : self.stack.current_transform().clone(),
            lights         : Vec::new()
        });
        self.root = Some(root);

        Ok(())
    }

    fn world_end(&mut self) -> Result<()> {
        self.stack.verify_balanced("world_end")?;
        self.flush()?;
        self.frames.clear();

        self.stack.world_end()
    }

    fn transform_begin(&mut self) -> Result<()> {
        self.stack.transform_begin()?;

        let frame = self.frame()?.clone();
        self.frames.push(frame);
        Ok(())
    }

    fn transform_end(&mut self) -> Result<()> {
        self.stack.transform_end()?;

        // Lights outlive a transform block, like the rest of the state.
        if let Some(frame) = self.frames.pop() {
            self.frame_mut()?.lights = frame.lights;
        }

        Ok(())
    }

    fn set_transform(&mut self, m: &Transform) -> Result<()> {
        self.stack.set_transform(m)
    }

    fn set_transform_from(&mut self, coordinate_system: &str) -> Result<()> {
        self.stack.set_transform_from(coordinate_system)
    }

    fn get_transform(&self) -> Result<Transform> {
        self.stack.verify_world_motion("get_transform")?;
        Ok(self.stack.get_transform())
    }

    fn get_named_transform(&self, coordinate_system: &str) -> Result<Transform> {
        self.stack.get_named_transform(coordinate_system)
    }

    fn concat_transform(&mut self, m: &Transform) -> Result<()> {
        self.stack.concat_transform(m)
    }

    fn coordinate_system(&mut self, name: &str) -> Result<()> {
        self.stack.coordinate_system(name)
    }

    fn attribute_begin(&mut self) -> Result<()> {
        self.stack.attribute_begin()?;
        self.push_group().map(|_| ())
    }

    fn attribute_end(&mut self) -> Result<()> {
        self.stack.attribute_end()?;
        self.frames.pop();
        Ok(())
    }

    fn set_attribute(&mut self, name: &str, value: &Data) -> Result<()> {
        self.stack.set_attribute(name, value)
    }

    fn get_attribute(&self, name: &str) -> Option<Data> {
        self.stack.get_attribute(name)
    }

    fn shader(&mut self, kind: &str, name: &str, parameters: &CompoundData) -> Result<()> {
        self.stack.shader(Shader::new(kind, name, parameters.clone()))
    }

    fn light(&mut self, name: &str, handle: &str, parameters: &CompoundData) -> Result<()> {
        let light = Light::new(name, handle, parameters.clone());
        self.stack.light(&light)?;
        self.frame_mut()?.lights.push(light);
        Ok(())
    }

    fn illuminate(&mut self, handle: &str, on: bool) -> Result<()> {
        self.stack.illuminate(handle, on)?;
        debug!("Illuminate \"{}\" {} is not captured", handle, on);
        Ok(())
    }

    fn motion_begin(&mut self, times: &[Float]) -> Result<()> {
        self.stack.motion_begin(times)
    }

    fn motion_end(&mut self) -> Result<()> {
        match self.stack.motion_end()? {
            Some((times, samples)) => {
                let p = MotionPrimitive::new(&times, samples)?;
                self.add_primitive(p.into())
            }
            None => Ok(())
        }
    }

    fn points(&mut self, num_points: usize, vars: &PrimitiveVariableMap) -> Result<()> {
        let p = PointsPrimitive::new(num_points, vars.clone())?;
        self.emit("points", p.into())
    }

    fn sphere(&mut self, radius: Float, z_min: Float, z_max: Float, theta_max: Float,
              vars: &PrimitiveVariableMap) -> Result<()> {
        let p = SpherePrimitive::new(radius, z_min, z_max, theta_max, vars.clone());
        self.emit("sphere", p.into())
    }

    fn mesh(&mut self, verts_per_face: &[i32], vert_ids: &[i32], interpolation: &str,
            vars: &PrimitiveVariableMap) -> Result<()> {
        let p = MeshPrimitive::new(verts_per_face.to_vec(), vert_ids.to_vec(), interpolation, vars.clone())?;
        self.emit("mesh", p.into())
    }

    fn curves(&mut self, basis: CubicBasis, periodic: bool, num_vertices: &[i32],
              vars: &PrimitiveVariableMap) -> Result<()> {
        let p = CurvesPrimitive::new(basis, periodic, num_vertices.to_vec(), vars.clone())?;
        self.emit("curves", p.into())
    }

    fn geometry(&mut self, kind: &str, topology: &CompoundData, vars: &PrimitiveVariableMap) -> Result<()> {
        let p = GenericPrimitive::new(kind, topology.clone(), vars.clone());
        self.emit("geometry", p.into())
    }

    fn procedural(&mut self, procedural: Arc<dyn Procedural>) -> Result<()> {
        self.stack.verify_world("procedural")?;

        if !self.accepts_current_name() {
            debug!("Object filter rejected a procedural");
            return Ok(());
        }

        let bound = match procedural.bound() {
            Ok(b) => b,
            Err(e) if !e.is_fatal() => {
                error!("Procedural bound failed, culling it: {}", e);
                Bounds3f::empty()
            }
            Err(e) => return Err(e)
        };

        if self.stack.culled(&bound) {
            debug!("Culling procedural with bound {}", bound);
            return Ok(());
        }

        let reentrant = match self.stack.get_attribute(PROCEDURAL_REENTRANT) {
            Some(Data::Bool(b)) => b,
            _ => true
        };

        let depth = self.stack.depth();
        self.stack.attribute_begin()?;
        let placeholder = self.push_group()?;

        if reentrant {
            self.pending.push(Pending {
                snapshot: self.stack.snapshot(),
                placeholder,
                procedural
            });
            self.unwind_to(depth);
            return Ok(());
        }

        let res = procedural
            .render(self)
            .and_then(|_| {
                if self.stack.depth() != depth + 1 || self.stack.in_motion() {
                    return Err(Error::state("procedural", "procedural left a block open"));
                }
                Ok(())
            });

        self.unwind_to(depth);

        match res {
            Err(e) if !e.is_fatal() => {
                error!("Procedural failed, capturing it as empty: {}", e);
                placeholder.clear_children();
                Ok(())
            }
            res => res
        }
    }
}
