//! Project source discovery.
//!
//! Scans the configured source directory and produces the initial
//! subpath → file registry the release driver seeds its queue from.

use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{FileProps, MatchStore};
use crate::file::{FileContent, FileSet, ProjectFile};

/// Error during source discovery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProjectError {
    #[error("invalid source pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

/// A project rooted at a directory, with a source subdirectory.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    src: PathBuf,
}

impl Project {
    /// Create a project. `src` may be absolute or relative to `root`.
    pub fn new(root: PathBuf, src: &Path) -> Self {
        let src = if src.is_absolute() { src.to_path_buf() } else { root.join(src) };
        Self { root, src }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> &Path {
        &self.src
    }

    /// Discover every file under the source directory.
    ///
    /// Paths are sorted so discovery order is stable across runs. Match
    /// rules are applied to each file's subpath before it enters the set.
    pub fn source(&self, store: &MatchStore) -> Result<FileSet, ProjectError> {
        let pattern = format!("{}/**/*", self.src.display());
        let paths = glob(&pattern).map_err(|e| ProjectError::InvalidPattern {
            pattern: pattern.clone(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => log::warn!("skipping unreadable path during discovery: {}", e),
            }
        }
        files.sort();

        let mut set = FileSet::new();
        for path in files {
            if let Some(file) = self.load(store, &path)? {
                set.insert(file.subpath.clone(), file);
            }
        }
        Ok(set)
    }

    /// Load one file by path, applying match rules.
    ///
    /// Returns `None` when the path does not exist, is not a regular file,
    /// or falls outside the source directory.
    pub fn file(&self, store: &MatchStore, path: &Path) -> Result<Option<ProjectFile>, ProjectError> {
        let path = if path.is_absolute() { path.to_path_buf() } else { self.src.join(path) };
        if !path.is_file() {
            return Ok(None);
        }
        self.load(store, &path)
    }

    fn load(&self, store: &MatchStore, path: &Path) -> Result<Option<ProjectFile>, ProjectError> {
        let Ok(rel) = path.strip_prefix(&self.src) else {
            return Ok(None);
        };
        let subpath = format!("/{}", rel.display());
        let content = FileContent::from_bytes(fs::read(path)?);
        let mut file = ProjectFile::new(subpath.clone(), content);
        apply_props(&mut file, &store.props_for(&subpath));
        Ok(Some(file))
    }
}

/// Apply match-rule properties onto a file's defaults.
pub fn apply_props(file: &mut ProjectFile, props: &FileProps) {
    if let Some(v) = props.release {
        file.release = v;
    }
    if let Some(v) = props.use_map {
        file.use_map = v;
    }
    if let Some(v) = &props.pack_to {
        file.pack_to = Some(v.clone());
    }
    if let Some(v) = props.is_partial {
        file.is_partial = v;
    }
    if let Some(v) = props.resource_map {
        file.is_resource_map = v;
    }
    if let Some(v) = props.minified {
        file.minified = v;
    }
    if let Some(v) = props.use_same_name_require {
        file.use_same_name_require = v;
    }
}
