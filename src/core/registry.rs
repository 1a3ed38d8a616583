use crate::core::error::{Error, Result};
use crate::core::fileutil::SearchPath;
use crate::core::parameterised::ParameterisedProcedural;
use crate::procedurals::read::ReadProcedural;
use crate::procedurals::sphereflake::SphereFlakeProcedural;
use std::collections::BTreeMap;
use log::debug;

pub type ProceduralFactory = Box<dyn Fn() -> Result<Box<dyn ParameterisedProcedural>> + Send + Sync>;

fn boxed<P: ParameterisedProcedural + 'static>(p: P) -> Box<dyn ParameterisedProcedural> {
    Box::new(p)
}

/// Procedural classes by name and version. Owned by whoever drives the
/// session and passed to the code that needs to create procedurals.
#[derive(Default)]
pub struct ProceduralRegistry {
    classes: BTreeMap<String, BTreeMap<u32, ProceduralFactory>>
}

impl ProceduralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the procedurals that ship with the crate. File
    /// based procedurals resolve names through `search_path`.
    pub fn with_builtins(search_path: SearchPath) -> Self {
        let mut registry = Self::new();

        registry.register("sphereFlake", 1, || SphereFlakeProcedural::new().map(boxed));
        registry.register("read", 1, move || ReadProcedural::new(search_path.clone()).map(boxed));

        registry
    }

    /// Registers a class version, replacing any previous factory for it.
    pub fn register<F>(&mut self, name: &str, version: u32, factory: F)
    where F: Fn() -> Result<Box<dyn ParameterisedProcedural>> + Send + Sync + 'static
    {
        debug!("Registering procedural \"{}\" version {}", name, version);

        self.classes
            .entry(name.to_owned())
            .or_insert_with(BTreeMap::new)
            .insert(version, Box::new(factory));
    }

    pub fn names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    pub fn versions(&self, name: &str) -> Vec<u32> {
        self.classes
            .get(name)
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Creates an instance of `name`. Without a version the newest one is
    /// used.
    pub fn load(&self, name: &str, version: Option<u32>) -> Result<Box<dyn ParameterisedProcedural>> {
        let versions = self.classes
            .get(name)
            .ok_or_else(|| Error::not_found(format!("procedural \"{}\"", name)))?;

        let factory = match version {
            Some(v) => versions
                .get(&v)
                .ok_or_else(|| Error::not_found(format!("procedural \"{}\" version {}", name, v)))?,
            None => versions
                .values()
                .next_back()
                .ok_or_else(|| Error::not_found(format!("procedural \"{}\"", name)))?
        };

        factory()
    }
}
