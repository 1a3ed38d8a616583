use crate::core::cortex::Float;
use crate::core::data::{CompoundData, Data};
use crate::core::error::{Error, Result};
use crate::core::geometry::bounds::Bounds3f;
use crate::core::primitive::*;
use crate::core::renderer::{Procedural, Renderer};
use crate::core::state::{Light, Shader};
use crate::core::statestack::{Snapshot, StateStack};
use crate::core::transform::Transform;
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use log::{debug, error};

/// One accepted renderer call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetOption(String, Data),
    Camera(String, CompoundData),
    Display(String, String, String, CompoundData),
    WorldBegin,
    WorldEnd,
    TransformBegin,
    TransformEnd,
    SetTransform(Transform),
    SetTransformFrom(String),
    ConcatTransform(Transform),
    CoordinateSystem(String),
    AttributeBegin,
    AttributeEnd,
    SetAttribute(String, Data),
    Shader(String, String, CompoundData),
    Light(String, String, CompoundData),
    Illuminate(String, bool),
    MotionBegin(Vec<Float>),
    MotionEnd,
    Points { num_points: usize },
    Sphere { radius: Float, z_min: Float, z_max: Float, theta_max: Float },
    Mesh { verts_per_face: Vec<i32>, vert_ids: Vec<i32>, interpolation: String },
    Curves { basis: CubicBasis, periodic: bool, num_vertices: Vec<i32> },
    Geometry { kind: String },
    ProceduralCulled(Bounds3f),
    ProceduralDeferred(Bounds3f),
    ProceduralBegin(Bounds3f),
    ProceduralEnd
}

impl Call {
    fn opens(&self) -> bool {
        matches!(self,
            Call::WorldBegin | Call::TransformBegin | Call::AttributeBegin |
            Call::MotionBegin(_) | Call::ProceduralBegin(_))
    }

    fn closes(&self) -> bool {
        matches!(self,
            Call::WorldEnd | Call::TransformEnd | Call::AttributeEnd |
            Call::MotionEnd | Call::ProceduralEnd)
    }
}

fn write_params(f: &mut Formatter<'_>, params: &CompoundData) -> fmt::Result {
    for (k, v) in params {
        write!(f, " \"{}\" {}", k, v)?;
    }

    Ok(())
}

impl Display for Call {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Call::SetOption(n, v)          => write!(f, "Option \"{}\" {}", n, v),
            Call::Camera(n, p)             => { write!(f, "Camera \"{}\"", n)?; write_params(f, p) }
            Call::Display(n, t, m, p)      => { write!(f, "Display \"{}\" \"{}\" \"{}\"", n, t, m)?; write_params(f, p) }
            Call::WorldBegin               => write!(f, "WorldBegin"),
            Call::WorldEnd                 => write!(f, "WorldEnd"),
            Call::TransformBegin           => write!(f, "TransformBegin"),
            Call::TransformEnd             => write!(f, "TransformEnd"),
            Call::SetTransform(t)          => write!(f, "Transform {}", t),
            Call::SetTransformFrom(n)      => write!(f, "CoordSysTransform \"{}\"", n),
            Call::ConcatTransform(t)       => write!(f, "ConcatTransform {}", t),
            Call::CoordinateSystem(n)      => write!(f, "CoordinateSystem \"{}\"", n),
            Call::AttributeBegin           => write!(f, "AttributeBegin"),
            Call::AttributeEnd             => write!(f, "AttributeEnd"),
            Call::SetAttribute(n, v)       => write!(f, "Attribute \"{}\" {}", n, v),
            Call::Shader(t, n, p)          => { write!(f, "Shader \"{}\" \"{}\"", t, n)?; write_params(f, p) }
            Call::Light(n, h, p)           => { write!(f, "Light \"{}\" \"{}\"", n, h)?; write_params(f, p) }
            Call::Illuminate(h, on)        => write!(f, "Illuminate \"{}\" {}", h, on),
            Call::MotionBegin(times)       => write!(f, "MotionBegin {:?}", times),
            Call::MotionEnd                => write!(f, "MotionEnd"),
            Call::Points { num_points }    => write!(f, "Points {}", num_points),
            Call::Sphere { radius, z_min, z_max, theta_max } =>
                write!(f, "Sphere {} {} {} {}", radius, z_min, z_max, theta_max),
            Call::Mesh { verts_per_face, interpolation, .. } =>
                write!(f, "Mesh \"{}\" {} faces", interpolation, verts_per_face.len()),
            Call::Curves { basis, periodic, num_vertices } =>
                write!(f, "Curves \"{}\" {} {} curves", basis, periodic, num_vertices.len()),
            Call::Geometry { kind }        => write!(f, "Geometry \"{}\"", kind),
            Call::ProceduralCulled(b)      => write!(f, "Procedural culled {}", b),
            Call::ProceduralDeferred(b)    => write!(f, "Procedural deferred {}", b),
            Call::ProceduralBegin(b)       => write!(f, "ProceduralBegin {}", b),
            Call::ProceduralEnd            => write!(f, "ProceduralEnd")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProceduralMode {
    /// Bound, cull and render at the call site.
    Immediate,
    /// Bound and cull at the call site, render in call order at `world_end`.
    Deferred
}

/// Backend that checks the renderer contract and keeps a log of every
/// call it accepted. Printing it gives an indented scene listing.
pub struct RecordingRenderer {
    stack   : StateStack,
    calls   : Vec<Call>,
    mode    : ProceduralMode,
    pending : VecDeque<(Snapshot, Bounds3f, Arc<dyn Procedural>)>
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new(ProceduralMode::Immediate)
    }
}

impl RecordingRenderer {
    pub fn new(mode: ProceduralMode) -> Self {
        Self {
            stack: StateStack::new(),
            calls: Vec::new(),
            mode,
            pending: VecDeque::new()
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn stack(&self) -> &StateStack {
        &self.stack
    }

    fn emit(&mut self, call: &str, primitive: Primitives, record: Call) -> Result<()> {
        self.stack.emit(call, primitive)?;
        self.calls.push(record);

        Ok(())
    }

    /// Renders one procedural inside an implicit attribute block. Non-fatal
    /// failures discard whatever the procedural emitted.
    fn render_procedural(&mut self, bound: Bounds3f, procedural: &Arc<dyn Procedural>) -> Result<()> {
        let start = self.calls.len();
        let depth = self.stack.depth();

        self.calls.push(Call::ProceduralBegin(bound));
        self.stack.attribute_begin()?;

        let res = procedural.render(self).and_then(|_| {
            if self.stack.depth() != depth + 1 || self.stack.in_motion() {
                return Err(Error::state("procedural", "procedural left a block open"));
            }
            Ok(())
        });

        self.stack.unwind_to(depth);

        match res {
            Err(e) if !e.is_fatal() => {
                error!("Procedural failed, rendering it as empty: {}", e);
                self.calls.truncate(start + 1);
            }
            Err(e) => return Err(e),
            Ok(()) => ()
        }

        self.calls.push(Call::ProceduralEnd);
        Ok(())
    }

    fn flush_deferred(&mut self) -> Result<()> {
        while let Some((snapshot, bound, procedural)) = self.pending.pop_front() {
            let saved = std::mem::replace(&mut self.stack, StateStack::from_snapshot(snapshot));
            let res = self.render_procedural(bound, &procedural);
            self.stack = saved;
            res?;
        }

        Ok(())
    }
}

impl Renderer for RecordingRenderer {
    fn set_option(&mut self, name: &str, value: &Data) -> Result<()> {
        self.stack.set_option(name, value)?;
        self.calls.push(Call::SetOption(name.to_owned(), value.clone()));
        Ok(())
    }

    fn get_option(&self, name: &str) -> Option<Data> {
        self.stack.get_option(name)
    }

    fn camera(&mut self, name: &str, parameters: &CompoundData) -> Result<()> {
        self.stack.verify_options("camera")?;
        self.calls.push(Call::Camera(name.to_owned(), parameters.clone()));
        Ok(())
    }

    fn display(&mut self, name: &str, kind: &str, mode: &str, parameters: &CompoundData) -> Result<()> {
        self.stack.verify_options("display")?;
        self.calls.push(Call::Display(name.to_owned(), kind.to_owned(), mode.to_owned(), parameters.clone()));
        Ok(())
    }

    fn world_begin(&mut self) -> Result<()> {
        self.stack.world_begin()?;
        self.calls.push(Call::WorldBegin);
        Ok(())
    }

    fn world_end(&mut self) -> Result<()> {
        self.stack.verify_balanced("world_end")?;
        self.flush_deferred()?;
        self.stack.world_end()?;
        self.calls.push(Call::WorldEnd);
        Ok(())
    }

    fn transform_begin(&mut self) -> Result<()> {
        self.stack.transform_begin()?;
        self.calls.push(Call::TransformBegin);
        Ok(())
    }

    fn transform_end(&mut self) -> Result<()> {
        self.stack.transform_end()?;
        self.calls.push(Call::TransformEnd);
        Ok(())
    }

    fn set_transform(&mut self, m: &Transform) -> Result<()> {
        self.stack.set_transform(m)?;
        self.calls.push(Call::SetTransform(*m));
        Ok(())
    }

    fn set_transform_from(&mut self, coordinate_system: &str) -> Result<()> {
        self.stack.set_transform_from(coordinate_system)?;
        self.calls.push(Call::SetTransformFrom(coordinate_system.to_owned()));
        Ok(())
    }

    fn get_transform(&self) -> Result<Transform> {
        self.stack.verify_world_motion("get_transform")?;
        Ok(self.stack.get_transform())
    }

    fn get_named_transform(&self, coordinate_system: &str) -> Result<Transform> {
        self.stack.get_named_transform(coordinate_system)
    }

    fn concat_transform(&mut self, m: &Transform) -> Result<()> {
        self.stack.concat_transform(m)?;
        self.calls.push(Call::ConcatTransform(*m));
        Ok(())
    }

    fn coordinate_system(&mut self, name: &str) -> Result<()> {
        self.stack.coordinate_system(name)?;
        self.calls.push(Call::CoordinateSystem(name.to_owned()));
        Ok(())
    }

    fn attribute_begin(&mut self) -> Result<()> {
        self.stack.attribute_begin()?;
        self.calls.push(Call::AttributeBegin);
        Ok(())
    }

    fn attribute_end(&mut self) -> Result<()> {
        self.stack.attribute_end()?;
        self.calls.push(Call::AttributeEnd);
        Ok(())
    }

    fn set_attribute(&mut self, name: &str, value: &Data) -> Result<()> {
        self.stack.set_attribute(name, value)?;
        self.calls.push(Call::SetAttribute(name.to_owned(), value.clone()));
        Ok(())
    }

    fn get_attribute(&self, name: &str) -> Option<Data> {
        self.stack.get_attribute(name)
    }

    fn shader(&mut self, kind: &str, name: &str, parameters: &CompoundData) -> Result<()> {
        self.stack.shader(Shader::new(kind, name, parameters.clone()))?;
        self.calls.push(Call::Shader(kind.to_owned(), name.to_owned(), parameters.clone()));
        Ok(())
    }

    fn light(&mut self, name: &str, handle: &str, parameters: &CompoundData) -> Result<()> {
        self.stack.light(&Light::new(name, handle, parameters.clone()))?;
        self.calls.push(Call::Light(name.to_owned(), handle.to_owned(), parameters.clone()));
        Ok(())
    }

    fn illuminate(&mut self, handle: &str, on: bool) -> Result<()> {
        self.stack.illuminate(handle, on)?;
        self.calls.push(Call::Illuminate(handle.to_owned(), on));
        Ok(())
    }

    fn motion_begin(&mut self, times: &[Float]) -> Result<()> {
        self.stack.motion_begin(times)?;
        self.calls.push(Call::MotionBegin(times.to_vec()));
        Ok(())
    }

    fn motion_end(&mut self) -> Result<()> {
        self.stack.motion_end()?;
        self.calls.push(Call::MotionEnd);
        Ok(())
    }

    fn points(&mut self, num_points: usize, vars: &PrimitiveVariableMap) -> Result<()> {
        let p = PointsPrimitive::new(num_points, vars.clone())?;
        self.emit("points", p.into(), Call::Points { num_points })
    }

    fn sphere(&mut self, radius: Float, z_min: Float, z_max: Float, theta_max: Float,
              vars: &PrimitiveVariableMap) -> Result<()> {
        let p = SpherePrimitive::new(radius, z_min, z_max, theta_max, vars.clone());
        self.emit("sphere", p.into(), Call::Sphere { radius, z_min, z_max, theta_max })
    }

    fn mesh(&mut self, verts_per_face: &[i32], vert_ids: &[i32], interpolation: &str,
            vars: &PrimitiveVariableMap) -> Result<()> {
        let p = MeshPrimitive::new(verts_per_face.to_vec(), vert_ids.to_vec(), interpolation, vars.clone())?;
        let record = Call::Mesh {
            verts_per_face: verts_per_face.to_vec(),
            vert_ids: vert_ids.to_vec(),
            interpolation: interpolation.to_owned()
        };
        self.emit("mesh", p.into(), record)
    }

    fn curves(&mut self, basis: CubicBasis, periodic: bool, num_vertices: &[i32],
              vars: &PrimitiveVariableMap) -> Result<()> {
        let p = CurvesPrimitive::new(basis, periodic, num_vertices.to_vec(), vars.clone())?;
        self.emit("curves", p.into(), Call::Curves { basis, periodic, num_vertices: num_vertices.to_vec() })
    }

    fn geometry(&mut self, kind: &str, topology: &CompoundData, vars: &PrimitiveVariableMap) -> Result<()> {
        let p = GenericPrimitive::new(kind, topology.clone(), vars.clone());
        self.emit("geometry", p.into(), Call::Geometry { kind: kind.to_owned() })
    }

    fn procedural(&mut self, procedural: Arc<dyn Procedural>) -> Result<()> {
        self.stack.verify_world("procedural")?;

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
            self.calls.push(Call::ProceduralCulled(bound));
            return Ok(());
        }

        match self.mode {
            ProceduralMode::Immediate => self.render_procedural(bound, &procedural),
            ProceduralMode::Deferred => {
                self.calls.push(Call::ProceduralDeferred(bound));
                self.pending.push_back((self.stack.snapshot(), bound, procedural));
                Ok(())
            }
        }
    }
}

impl Display for RecordingRenderer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut indent: usize = 0;

        for c in self.calls.iter() {
            if c.closes() {
                indent = indent.saturating_sub(4);
            }

            writeln!(f, "{:indent$}{}", "", c, indent = indent)?;

            if c.opens() {
                indent += 4;
            }
        }

        Ok(())
    }
}
