use crate::core::data::{CompoundData, Data};
use crate::core::error::{Error, Result};
use crate::core::fileutil::{SearchPath, has_extension};
use crate::core::geometry::Vector3f;
use crate::core::geometry::bounds::Bounds3f;
use crate::core::parameter::{CompoundParameter, Parameter};
use crate::core::parameterised::ParameterisedProcedural;
use crate::core::primitive::{Interpolation, MeshPrimitive, Primitive, Primitives, PrimitiveVariable, PrimitiveVariableMap};
use crate::core::renderer::Renderer;
use parking_lot::Mutex;
use ply_rs::{parser, ply};
use ply_rs::ply::Property;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{error, info, warn};

/// Turns a file into a renderable primitive.
pub trait Reader {
    fn read(&self) -> Result<Primitives>;
}

/// Picks a reader by file extension.
pub fn create_reader(path: &Path) -> Result<Box<dyn Reader>> {
    if has_extension(path, "ply") {
        return Ok(Box::new(PlyReader::new(path)));
    }

    Err(Error::resource(path.display().to_string(), "no reader for this file type"))
}

pub struct PlyReader {
    path: PathBuf
}

impl PlyReader {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    fn resource_error(&self, message: impl Into<String>) -> Error {
        Error::resource(self.path.display().to_string(), message)
    }
}

impl Reader for PlyReader {
    fn read(&self) -> Result<Primitives> {
        let f = File::open(&self.path).map_err(|e| self.resource_error(e.to_string()))?;
        let mut reader = BufReader::new(f);

        let vertex_parser = parser::Parser::<Vertex>::new();
        let face_parser = parser::Parser::<Face>::new();
        let other_parser = parser::Parser::<ply::DefaultElement>::new();

        let header = vertex_parser
            .read_header(&mut reader)
            .map_err(|e| self.resource_error(e.to_string()))?;

        let mut has_normals = false;

        for (k, e) in &header.elements {
            if k == "vertex" {
                if !e.properties.contains_key("x") ||
                   !e.properties.contains_key("y") ||
                   !e.properties.contains_key("z") {
                    return Err(self.resource_error("vertex coordinate property not found"));
                }

                has_normals = e.properties.contains_key("nx") &&
                              e.properties.contains_key("ny") &&
                              e.properties.contains_key("nz");
            }
        }

        let mut vertices = Vec::new();
        let mut faces = Vec::new();

        for (_, elem) in &header.elements {
            let res = match elem.name.as_str() {
                "vertex" => vertex_parser
                    .read_payload_for_element(&mut reader, elem, &header)
                    .map(|v| vertices = v),
                "face" => face_parser
                    .read_payload_for_element(&mut reader, elem, &header)
                    .map(|f| faces = f),
                _ => other_parser
                    .read_payload_for_element(&mut reader, elem, &header)
                    .map(|_| ())
            };

            res.map_err(|e| self.resource_error(e.to_string()))?;
        }

        if vertices.is_empty() || faces.is_empty() {
            return Err(self.resource_error("no face/vertex elements found"));
        }

        info!(
            "Loading PLY file with {} vertices and {} faces",
            vertices.len(), faces.len());

        let mut verts_per_face = Vec::with_capacity(faces.len());
        let mut vert_ids = Vec::new();
        for f in faces {
            if f.indices.len() < 3 {
                warn!("PLY file \"{}\": ignoring face with {} vertices", self.path.display(), f.indices.len());
                continue;
            }

            verts_per_face.push(f.indices.len() as i32);
            vert_ids.extend(f.indices);
        }

        let mut variables = PrimitiveVariableMap::new();
        let p: Vec<Vector3f> = vertices.iter().map(|v| v.p).collect();
        variables.insert("P".to_owned(), PrimitiveVariable::new(Interpolation::Vertex, p));

        if has_normals {
            let n: Vec<Vector3f> = vertices.iter().map(|v| v.n).collect();
            variables.insert("N".to_owned(), PrimitiveVariable::new(Interpolation::Vertex, n));
        }

        let mesh = MeshPrimitive::new(verts_per_face, vert_ids, "linear", variables)
            .map_err(|e| self.resource_error(e.to_string()))?;

        Ok(mesh.into())
    }
}

struct Vertex {
    p: Vector3f,
    n: Vector3f
}

impl ply::PropertyAccess for Vertex {
    fn new() -> Self {
        Vertex { p: Vector3f::zeros(), n: Vector3f::zeros() }
    }

    fn set_property(&mut self, name: String, property: Property) {
        let v = match property {
            Property::Float(v) => v,
            Property::Double(v) => v as f32,
            p => {
                error!("Vertex: unsupported value {:?} for property \"{}\"", p, name);
                return;
            }
        };

        match name.as_str() {
            "x" => self.p.x = v,
            "y" => self.p.y = v,
            "z" => self.p.z = v,
            "nx" => self.n.x = v,
            "ny" => self.n.y = v,
            "nz" => self.n.z = v,
            _ => ()
        }
    }
}

#[derive(Default)]
struct Face {
    indices: Vec<i32>
}

impl ply::PropertyAccess for Face {
    fn new() -> Self {
        Face::default()
    }

    fn set_property(&mut self, name: String, property: Property) {
        match (name.as_str(), property) {
            ("vertex_indices", Property::ListInt(v)) |
            ("vertex_index", Property::ListInt(v)) => self.indices = v,
            ("vertex_indices", Property::ListUInt(v)) |
            ("vertex_index", Property::ListUInt(v)) =>
                self.indices = v.iter().map(|x| *x as i32).collect(),
            (k, p) =>
                error!("Face: invalid combination key/value for key {} / prop {:?}", k, p)
        }
    }
}

/// Loads geometry from disk. Files that cannot be found or parsed are
/// logged and the procedural renders as empty, so one missing asset does
/// not abort the render.
pub struct ReadProcedural {
    parameters  : CompoundParameter,
    search_path : SearchPath,
    // Last file loaded, keyed by resolved path.
    cache       : Mutex<Option<(PathBuf, Arc<Primitives>)>>
}

impl ReadProcedural {
    pub fn new(search_path: SearchPath) -> Result<Self> {
        let bounds = CompoundParameter::new("bounds", "How the bound is computed.")
            .with(Parameter::new("mode", "Calculate the bound from the file or use the specified one.", "calculated")
                .with_presets(vec![
                    ("calculated", Data::from("calculated")),
                    ("specified", Data::from("specified"))
                ], true))?
            .with(Parameter::new("specified", "Bound used in specified mode.", Bounds3f::from_radius(0.5)))?;

        let parameters = CompoundParameter::new("read", "Renders a geometry file.")
            .with(Parameter::new("fileName", "File to load.", ""))?
            .with(bounds)?;

        Ok(Self {
            parameters,
            search_path,
            cache: Mutex::new(None)
        })
    }

    /// Loads `filename`, or returns the cached copy when it names the same
    /// file as last time.
    pub fn load(&self, filename: &str) -> Result<Arc<Primitives>> {
        let path = self.search_path
            .find(filename)
            .ok_or_else(|| Error::resource(filename, "file not found"))?;

        if let Some((cached, primitive)) = self.cache.lock().as_ref() {
            if *cached == path {
                return Ok(primitive.clone());
            }
        }

        let primitive = Arc::new(create_reader(&path)?.read()?);
        *self.cache.lock() = Some((path, primitive.clone()));

        Ok(primitive)
    }

    fn load_or_log(&self, args: &CompoundData) -> Result<Option<Arc<Primitives>>> {
        let filename = args.get("fileName").and_then(|d| d.as_string()).unwrap_or_default();

        match self.load(&filename) {
            Ok(p) => Ok(Some(p)),
            Err(e) if !e.is_fatal() => {
                error!("ReadProcedural: {}", e);
                Ok(None)
            }
            Err(e) => Err(e)
        }
    }
}

impl ParameterisedProcedural for ReadProcedural {
    fn parameters(&self) -> &CompoundParameter {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut CompoundParameter {
        &mut self.parameters
    }

    fn do_bound(&self, args: &CompoundData) -> Result<Bounds3f> {
        let bounds = args.get("bounds").and_then(|d| d.as_compound()).unwrap_or_default();

        if bounds.get("mode").and_then(|d| d.as_str().map(|s| s == "specified")) == Some(true) {
            return Ok(bounds.get("specified").and_then(|d| d.as_box()).unwrap_or_default());
        }

        Ok(self.load_or_log(args)?.map(|p| p.bound()).unwrap_or_default())
    }

    fn do_render(&self, renderer: &mut dyn Renderer, args: &CompoundData) -> Result<()> {
        match self.load_or_log(args)? {
            Some(p) => p.render(renderer),
            None => Ok(())
        }
    }
}
