use crate::core::cortex::Float;
use crate::core::geometry::{Point3f, Vector3f, Color3f};
use crate::core::geometry::bounds::Bounds3f;
use crate::core::transform::Matrix4x4;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Name-ordered mapping of typed values. Attribute states, shader and light
/// parameters and validated procedural arguments are all carried in one.
pub type CompoundData = BTreeMap<String, Data>;

#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Bool(bool),
    Int(i32),
    Float(Float),
    String(String),
    V3f(Vector3f),
    Color3f(Color3f),
    M44f(Matrix4x4),
    Box3f(Bounds3f),
    IntVector(Vec<i32>),
    FloatVector(Vec<Float>),
    StringVector(Vec<String>),
    V3fVector(Vec<Vector3f>),
    Compound(CompoundData)
}

macro_rules! as_data {
    ($x:ident, $v:ident, $t:ty) => {
        pub fn $x(&self) -> Option<$t> {
            match self {
                Data::$v(ref v) => Some(v.clone()),
                _ => None
            }
        }
    }
}

macro_rules! data_from {
    ($t:ty, $v:ident) => {
        impl From<$t> for Data {
            fn from(v: $t) -> Self {
                Data::$v(v)
            }
        }
    }
}

impl Data {
    as_data!(as_bool, Bool, bool);
    as_data!(as_int, Int, i32);
    as_data!(as_string, String, String);
    as_data!(as_v3f, V3f, Vector3f);
    as_data!(as_color, Color3f, Color3f);
    as_data!(as_m44f, M44f, Matrix4x4);
    as_data!(as_box, Box3f, Bounds3f);
    as_data!(as_int_vector, IntVector, Vec<i32>);
    as_data!(as_float_vector, FloatVector, Vec<Float>);
    as_data!(as_string_vector, StringVector, Vec<String>);
    as_data!(as_v3f_vector, V3fVector, Vec<Vector3f>);
    as_data!(as_compound, Compound, CompoundData);

    /// Ints widen to floats so numeric parameters accept either.
    pub fn as_float(&self) -> Option<Float> {
        match *self {
            Data::Float(f) => Some(f),
            Data::Int(i) => Some(i as Float),
            _ => None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::String(ref s) => Some(s.as_str()),
            _ => None
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Data::Bool(_)         => "BoolData",
            Data::Int(_)          => "IntData",
            Data::Float(_)        => "FloatData",
            Data::String(_)       => "StringData",
            Data::V3f(_)          => "V3fData",
            Data::Color3f(_)      => "Color3fData",
            Data::M44f(_)         => "M44fData",
            Data::Box3f(_)        => "Box3fData",
            Data::IntVector(_)    => "IntVectorData",
            Data::FloatVector(_)  => "FloatVectorData",
            Data::StringVector(_) => "StringVectorData",
            Data::V3fVector(_)    => "V3fVectorData",
            Data::Compound(_)     => "CompoundData"
        }
    }

    pub fn same_type(&self, other: &Data) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Parses `s` into a value of the same type as `self`. Vectors and
    /// matrices take whitespace separated components.
    pub fn parse_like(&self, s: &str) -> Option<Data> {
        let floats = || -> Option<Vec<Float>> {
            s.split_whitespace().map(|t| t.parse::<Float>().ok()).collect()
        };

        match self {
            Data::Bool(_) => match s {
                "1" | "true" | "on" | "yes" => Some(Data::Bool(true)),
                "0" | "false" | "off" | "no" => Some(Data::Bool(false)),
                _ => None
            },
            Data::Int(_) => s.trim().parse().ok().map(Data::Int),
            Data::Float(_) => s.trim().parse().ok().map(Data::Float),
            Data::String(_) => Some(Data::String(s.to_owned())),
            Data::V3f(_) | Data::Color3f(_) => {
                let f = floats()?;
                if f.len() != 3 { return None; }
                let v = Vector3f::new(f[0], f[1], f[2]);
                Some(if let Data::V3f(_) = self { Data::V3f(v) } else { Data::Color3f(v) })
            }
            Data::M44f(_) => {
                let f = floats()?;
                if f.len() != 16 { return None; }
                Some(Data::M44f(Matrix4x4::from_row_slice(&f)))
            }
            Data::Box3f(_) => {
                let f = floats()?;
                if f.len() != 6 { return None; }
                Some(Data::Box3f(Bounds3f::from_points(
                    Point3f::new(f[0], f[1], f[2]),
                    Point3f::new(f[3], f[4], f[5]))))
            }
            Data::IntVector(_) => s
                .split_whitespace()
                .map(|t| t.parse::<i32>().ok())
                .collect::<Option<Vec<_>>>()
                .map(Data::IntVector),
            Data::FloatVector(_) => floats().map(Data::FloatVector),
            Data::StringVector(_) => Some(Data::StringVector(
                s.split_whitespace().map(|t| t.to_owned()).collect())),
            Data::V3fVector(_) => {
                let f = floats()?;
                if f.len() % 3 != 0 { return None; }
                Some(Data::V3fVector(
                    f.chunks(3).map(|c| Vector3f::new(c[0], c[1], c[2])).collect()))
            }
            Data::Compound(_) => None
        }
    }
}

data_from!(bool, Bool);
data_from!(i32, Int);
data_from!(Float, Float);
data_from!(String, String);
data_from!(Vector3f, V3f);
data_from!(Matrix4x4, M44f);
data_from!(Bounds3f, Box3f);
data_from!(Vec<i32>, IntVector);
data_from!(Vec<Float>, FloatVector);
data_from!(Vec<String>, StringVector);
data_from!(Vec<Vector3f>, V3fVector);
data_from!(CompoundData, Compound);

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Data::String(s.to_owned())
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, values: &[T]) -> fmt::Result {
    write!(f, "[")?;
    for v in values {
        write!(f, " {}", v)?;
    }
    write!(f, " ]")
}

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Data::Bool(b) => write!(f, "{}", b),
            Data::Int(i) => write!(f, "{}", i),
            Data::Float(x) => write!(f, "{}", x),
            Data::String(s) => write!(f, "\"{}\"", s),
            Data::V3f(v) | Data::Color3f(v) => write!(f, "[ {} {} {} ]", v.x, v.y, v.z),
            Data::M44f(m) => {
                let rows: Vec<Float> = (0..16).map(|i| m[(i / 4, i % 4)]).collect();
                write_list(f, &rows)
            }
            Data::Box3f(b) => write!(f, "{}", b),
            Data::IntVector(v) => write_list(f, v),
            Data::FloatVector(v) => write_list(f, v),
            Data::StringVector(v) => {
                let quoted: Vec<String> = v.iter().map(|s| format!("\"{}\"", s)).collect();
                write_list(f, &quoted)
            }
            Data::V3fVector(v) => {
                write!(f, "[")?;
                for p in v {
                    write!(f, " ({} {} {})", p.x, p.y, p.z)?;
                }
                write!(f, " ]")
            }
            Data::Compound(c) => {
                write!(f, "{{")?;
                for (k, v) in c {
                    write!(f, " \"{}\" {}", k, v)?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// Builds a `CompoundData` from `name => value` pairs.
#[macro_export]
macro_rules! compound {
    () => { $crate::core::data::CompoundData::new() };
    ($($k:expr => $v:expr),+ $(,)?) => {{
        let mut c = $crate::core::data::CompoundData::new();
        $( c.insert($k.to_owned(), $crate::core::data::Data::from($v)); )+
        c
    }};
}
