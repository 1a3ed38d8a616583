use crate::core::cortex::Float;
use crate::core::data::{CompoundData, Data};
use crate::core::error::{Error, Result};
use crate::core::geometry::{Point3f, Vector3f};
use crate::core::geometry::bounds::Bounds3f;
use crate::core::renderer::Renderer;
use enum_dispatch::enum_dispatch;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Constant,
    Uniform,
    Vertex,
    Varying,
    FaceVarying
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveVariable {
    pub interpolation : Interpolation,
    pub data          : Data
}

impl PrimitiveVariable {
    pub fn new(interpolation: Interpolation, data: impl Into<Data>) -> Self {
        Self { interpolation, data: data.into() }
    }
}

pub type PrimitiveVariableMap = BTreeMap<String, PrimitiveVariable>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubicBasis {
    Linear,
    Bezier,
    BSpline,
    CatmullRom
}

impl Display for CubicBasis {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            CubicBasis::Linear     => "linear",
            CubicBasis::Bezier     => "bezier",
            CubicBasis::BSpline    => "bSpline",
            CubicBasis::CatmullRom => "catmullRom"
        };

        write!(f, "{}", name)
    }
}

/// What must stay identical across the samples of a motion block: the kind
/// of primitive plus its element counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub kind   : String,
    pub counts : Vec<i32>
}

impl Display for Topology {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.counts)
    }
}

#[enum_dispatch]
pub trait Primitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()>;

    fn bound(&self) -> Bounds3f;

    fn topology(&self) -> Topology;

    fn variables(&self) -> &PrimitiveVariableMap;
}

#[enum_dispatch(Primitive)]
#[derive(Debug, Clone, PartialEq)]
pub enum Primitives {
    SpherePrimitive,
    PointsPrimitive,
    MeshPrimitive,
    CurvesPrimitive,
    GenericPrimitive,
    MotionPrimitive
}

fn positions(vars: &PrimitiveVariableMap) -> Option<&Vec<Vector3f>> {
    match vars.get("P").map(|v| &v.data) {
        Some(Data::V3fVector(p)) => Some(p),
        _ => None
    }
}

fn position_count(vars: &PrimitiveVariableMap) -> usize {
    positions(vars).map(|p| p.len()).unwrap_or(0)
}

/// Union of "P" grown by half the constant "width", if any.
fn position_bound(vars: &PrimitiveVariableMap) -> Bounds3f {
    let b = positions(vars)
        .map(|p| p.iter().fold(Bounds3f::empty(), |b, v| b.union_point(&Point3f::new(v.x, v.y, v.z))))
        .unwrap_or_default();

    let width = vars
        .get("width")
        .filter(|v| v.interpolation == Interpolation::Constant)
        .and_then(|v| v.data.as_float())
        .unwrap_or(0.0);

    b.expand(width / 2.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpherePrimitive {
    pub radius    : Float,
    pub z_min     : Float,
    pub z_max     : Float,
    pub theta_max : Float,
    pub variables : PrimitiveVariableMap
}

impl SpherePrimitive {
    pub fn new(radius: Float, z_min: Float, z_max: Float, theta_max: Float, variables: PrimitiveVariableMap) -> Self {
        Self { radius, z_min, z_max, theta_max, variables }
    }
}

impl Default for SpherePrimitive {
    fn default() -> Self {
        Self::new(1.0, -1.0, 1.0, 360.0, PrimitiveVariableMap::new())
    }
}

impl Primitive for SpherePrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.sphere(self.radius, self.z_min, self.z_max, self.theta_max, &self.variables)
    }

    fn bound(&self) -> Bounds3f {
        let r = self.radius.abs();

        Bounds3f::from_points(
            Point3f::new(-r, -r, self.z_min * r),
            Point3f::new(r, r, self.z_max * r))
    }

    fn topology(&self) -> Topology {
        Topology { kind: "sphere".to_owned(), counts: vec![] }
    }

    fn variables(&self) -> &PrimitiveVariableMap {
        &self.variables
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointsPrimitive {
    pub num_points : usize,
    pub variables  : PrimitiveVariableMap
}

impl PointsPrimitive {
    pub fn new(num_points: usize, variables: PrimitiveVariableMap) -> Result<Self> {
        let n = position_count(&variables);
        if n != 0 && n != num_points {
            return Err(Error::invalid(format!("points: {} positions given for {} points", n, num_points)));
        }

        Ok(Self { num_points, variables })
    }

    pub fn from_positions(p: Vec<Vector3f>) -> Self {
        let mut variables = PrimitiveVariableMap::new();
        let num_points = p.len();
        variables.insert("P".to_owned(), PrimitiveVariable::new(Interpolation::Vertex, p));

        Self { num_points, variables }
    }
}

impl Primitive for PointsPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.points(self.num_points, &self.variables)
    }

    fn bound(&self) -> Bounds3f {
        let b = position_bound(&self.variables);
        if self.variables.contains_key("width") { b } else { b.expand(0.5) }
    }

    fn topology(&self) -> Topology {
        Topology { kind: "points".to_owned(), counts: vec![self.num_points as i32] }
    }

    fn variables(&self) -> &PrimitiveVariableMap {
        &self.variables
    }
}

/// Polygon mesh with arbitrary face sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPrimitive {
    pub verts_per_face : Vec<i32>,
    pub vert_ids       : Vec<i32>,
    pub interpolation  : String,
    pub variables      : PrimitiveVariableMap
}

impl MeshPrimitive {
    pub fn new(verts_per_face: Vec<i32>, vert_ids: Vec<i32>, interpolation: &str,
               variables: PrimitiveVariableMap) -> Result<Self> {
        if verts_per_face.iter().any(|&n| n < 3) {
            return Err(Error::invalid("mesh: faces need at least 3 vertices"));
        }

        let expected: i32 = verts_per_face.iter().sum();
        if expected as usize != vert_ids.len() {
            return Err(Error::invalid(format!(
                "mesh: verticesPerFace sums to {} but {} vertex ids given",
                expected, vert_ids.len())));
        }

        let n = position_count(&variables) as i32;
        if n > 0 && vert_ids.iter().any(|&i| i < 0 || i >= n) {
            return Err(Error::invalid("mesh: vertex id out of range"));
        }

        Ok(Self {
            verts_per_face,
            vert_ids,
            interpolation: interpolation.to_owned(),
            variables
        })
    }

    pub fn num_faces(&self) -> usize {
        self.verts_per_face.len()
    }
}

impl Primitive for MeshPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.mesh(&self.verts_per_face, &self.vert_ids, &self.interpolation, &self.variables)
    }

    fn bound(&self) -> Bounds3f {
        position_bound(&self.variables)
    }

    fn topology(&self) -> Topology {
        let mut counts = self.verts_per_face.clone();
        counts.push(-1);
        counts.extend_from_slice(&self.vert_ids);

        Topology { kind: "mesh".to_owned(), counts }
    }

    fn variables(&self) -> &PrimitiveVariableMap {
        &self.variables
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurvesPrimitive {
    pub basis        : CubicBasis,
    pub periodic     : bool,
    pub num_vertices : Vec<i32>,
    pub variables    : PrimitiveVariableMap
}

impl CurvesPrimitive {
    pub fn new(basis: CubicBasis, periodic: bool, num_vertices: Vec<i32>,
               variables: PrimitiveVariableMap) -> Result<Self> {
        let expected: i32 = num_vertices.iter().sum();
        let n = position_count(&variables);
        if n != 0 && n != expected as usize {
            return Err(Error::invalid(format!(
                "curves: {} positions given for {} vertices", n, expected)));
        }

        Ok(Self { basis, periodic, num_vertices, variables })
    }
}

impl Primitive for CurvesPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.curves(self.basis, self.periodic, &self.num_vertices, &self.variables)
    }

    fn bound(&self) -> Bounds3f {
        position_bound(&self.variables)
    }

    fn topology(&self) -> Topology {
        let mut counts = vec![self.basis as i32, self.periodic as i32];
        counts.extend_from_slice(&self.num_vertices);

        Topology { kind: "curves".to_owned(), counts }
    }

    fn variables(&self) -> &PrimitiveVariableMap {
        &self.variables
    }
}

/// Geometry the core has no typed call for, passed through by kind.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericPrimitive {
    pub kind      : String,
    pub topology  : CompoundData,
    pub variables : PrimitiveVariableMap
}

impl GenericPrimitive {
    pub fn new(kind: &str, topology: CompoundData, variables: PrimitiveVariableMap) -> Self {
        Self { kind: kind.to_owned(), topology, variables }
    }
}

impl Primitive for GenericPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.geometry(&self.kind, &self.topology, &self.variables)
    }

    fn bound(&self) -> Bounds3f {
        position_bound(&self.variables)
    }

    fn topology(&self) -> Topology {
        let counts = self.topology
            .values()
            .flat_map(|d| match d {
                Data::Int(i) => vec![*i],
                Data::IntVector(v) => v.clone(),
                _ => vec![]
            })
            .collect();

        Topology { kind: self.kind.clone(), counts }
    }

    fn variables(&self) -> &PrimitiveVariableMap {
        &self.variables
    }
}

/// The same primitive sampled at several times. Samples are stored in
/// ascending time order and share a topology.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPrimitive {
    samples   : Vec<(Float, Primitives)>,
    variables : PrimitiveVariableMap
}

impl MotionPrimitive {
    pub fn new(times: &[Float], samples: Vec<Primitives>) -> Result<Self> {
        if times.len() != samples.len() || samples.is_empty() {
            return Err(Error::topology(format!(
                "{} times given for {} samples", times.len(), samples.len())));
        }

        if times.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(Error::invalid("motion times must be strictly increasing"));
        }

        let topology = samples[0].topology();
        for s in samples.iter() {
            if let Primitives::MotionPrimitive(_) = s {
                return Err(Error::invalid("motion primitives cannot be nested"));
            }

            if s.topology() != topology {
                return Err(Error::topology(format!("expected {}, got {}", topology, s.topology())));
            }
        }

        Ok(Self {
            samples: times.iter().cloned().zip(samples.into_iter()).collect(),
            variables: PrimitiveVariableMap::new()
        })
    }

    pub fn times(&self) -> Vec<Float> {
        self.samples.iter().map(|(t, _)| *t).collect()
    }

    pub fn samples(&self) -> impl Iterator<Item = &(Float, Primitives)> {
        self.samples.iter()
    }
}

impl Primitive for MotionPrimitive {
    fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.motion_begin(&self.times())?;

        for (_, p) in self.samples.iter() {
            p.render(renderer)?;
        }

        renderer.motion_end()
    }

    fn bound(&self) -> Bounds3f {
        self.samples
            .iter()
            .fold(Bounds3f::empty(), |b, (_, p)| b.union_bounds(&p.bound()))
    }

    fn topology(&self) -> Topology {
        self.samples[0].1.topology()
    }

    fn variables(&self) -> &PrimitiveVariableMap {
        &self.variables
    }
}
