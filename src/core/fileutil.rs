use std::path::{Path, PathBuf};
use log::debug;

/// Ordered list of directories used to resolve relative file names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPath {
    paths: Vec<PathBuf>
}

impl SearchPath {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Splits a colon separated list, skipping empty entries.
    pub fn parse(s: &str) -> Self {
        Self {
            paths: s.split(':').filter(|p| !p.is_empty()).map(PathBuf::from).collect()
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// First existing match for `filename`. Absolute names, and relative
    /// names that exist from the working directory, resolve to themselves.
    pub fn find<P: AsRef<Path>>(&self, filename: P) -> Option<PathBuf> {
        let p = filename.as_ref();

        if p.as_os_str().is_empty() {
            return None;
        }

        if p.is_absolute() || p.exists() {
            return if p.exists() { Some(p.to_path_buf()) } else { None };
        }

        let found = self.paths.iter().map(|d| d.join(p)).find(|c| c.exists());
        debug!("Resolved \"{}\" to {:?}", p.display(), found);

        found
    }
}

pub fn has_extension<P: AsRef<Path>>(name: P, ext: &str) -> bool {
    name
        .as_ref()
        .extension()
        .map(|x| x.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}
