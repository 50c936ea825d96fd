//! Plugin module resolution.
//!
//! Maps a logical plugin name to a module on disk, mirroring nested module
//! lookup: each search directory contributes a `packline_modules` candidate
//! at every ancestor level, so a plugin installed anywhere up the project
//! tree is discoverable. Resolution results are memoized per request key
//! and never invalidated.
//!
//! Plugins are installed as `<prefix>-<logical-name>`: either a single
//! descriptor file with a configured extension, or a directory holding a
//! `plugin.json` manifest whose `main` names the entry, falling back to an
//! `index` file.

use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

use crate::config::PluginsConfig;

/// Directory name plugins are installed under.
pub const MODULE_DIR: &str = "packline_modules";

/// Manifest file read for directory-shaped plugins.
pub const MANIFEST_FILENAME: &str = "plugin.json";

/// Plugin resolution error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// No candidate matched across all directories and prefixes.
    #[error("unable to load plugin [{}]", .attempted.join("] or ["))]
    NotFound { attempted: Vec<String> },
    /// The resolved module file could not be read.
    #[error("failed to read plugin module {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The resolved module file is not a valid descriptor.
    #[error("invalid plugin module {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Directory manifest (`plugin.json`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PluginManifest {
    main: Option<String>,
}

/// A loaded plugin module.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginModule {
    /// Canonical request key the module was resolved under.
    #[serde(skip)]
    pub request: String,
    /// Path of the module file on disk.
    #[serde(skip)]
    pub path: PathBuf,
    /// Packaging engine implementing this plugin; defaults to the logical
    /// name when absent.
    pub engine: Option<String>,
    /// Default settings, merged under any configured binding settings.
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// Resolves logical plugin names to modules on disk.
///
/// The cache and the finalized search-path list are append-only and shared
/// by every resolution made through this instance.
pub struct PluginResolver {
    prefixes: Vec<String>,
    extensions: Vec<String>,
    configured_paths: Vec<PathBuf>,
    local_dir: Option<PathBuf>,
    global_dir: Option<PathBuf>,
    default_dir: PathBuf,
    search: RefCell<Option<Vec<PathBuf>>>,
    cache: RefCell<HashMap<String, Rc<PluginModule>>>,
}

impl PluginResolver {
    /// Build a resolver from plugin configuration.
    ///
    /// `project_root` supplies the default search directory used when the
    /// configured list ends up empty.
    pub fn new(config: &PluginsConfig, project_root: &Path) -> Self {
        Self {
            prefixes: config.prefixes.clone(),
            extensions: config.extensions.clone(),
            configured_paths: config.paths.clone(),
            local_dir: config.local_dir.clone(),
            global_dir: config.global_dir.clone(),
            default_dir: project_root.join(MODULE_DIR),
            search: RefCell::new(None),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve a plugin by name parts.
    ///
    /// Parts are joined with `-` into the canonical request key
    /// (`resolve(&["packager", "concat"])` requests `packager-concat`,
    /// found on disk as `<prefix>-packager-concat`). Repeat keys return the
    /// memoized module without touching the filesystem.
    pub fn resolve(&self, parts: &[&str]) -> Result<Rc<PluginModule>, ResolveError> {
        let request = parts.join("-");
        if let Some(module) = self.cache.borrow().get(&request) {
            return Ok(Rc::clone(module));
        }

        let names: Vec<String> =
            self.prefixes.iter().map(|prefix| format!("{}-{}", prefix, request)).collect();

        for dir in self.candidate_dirs() {
            for name in &names {
                let base = dir.join(name);
                let found = self.load_as_file(&base).or_else(|| self.load_as_directory(&base));
                if let Some(path) = found {
                    log::debug!("resolved plugin {} to {}", request, path.display());
                    let module = self.load_module(&request, path)?;
                    self.cache.borrow_mut().insert(request, Rc::clone(&module));
                    return Ok(module);
                }
            }
        }

        Err(ResolveError::NotFound { attempted: names })
    }

    /// Finalized search-path list, computed on first use.
    ///
    /// Merges the deprecated single-directory overrides (local to the
    /// front, global to the back), deduplicates, and drops entries that do
    /// not end in the module directory name. Falls back to the default
    /// directory when nothing remains.
    fn search_paths(&self) -> Vec<PathBuf> {
        if let Some(paths) = self.search.borrow().as_ref() {
            return paths.clone();
        }

        let mut paths = self.configured_paths.clone();
        if let Some(local) = &self.local_dir {
            log::warn!("plugins.local_dir is deprecated, please set plugins.paths instead.");
            paths.insert(0, local.clone());
        }
        if let Some(global) = &self.global_dir {
            log::warn!("plugins.global_dir is deprecated, please set plugins.paths instead.");
            paths.push(global.clone());
        }

        let mut seen: Vec<PathBuf> = Vec::new();
        for path in paths {
            if path.file_name().map(|n| n == MODULE_DIR) != Some(true) {
                log::warn!(
                    "the path `{}` in plugins.paths does not end with `{}` and will be skipped.",
                    path.display(),
                    MODULE_DIR
                );
                continue;
            }
            if !seen.contains(&path) {
                seen.push(path);
            }
        }

        if seen.is_empty() {
            seen.push(self.default_dir.clone());
        }

        *self.search.borrow_mut() = Some(seen.clone());
        seen
    }

    /// Expand every search path into its ancestor module-root candidates.
    ///
    /// Walking each directory up to the filesystem root, a
    /// `packline_modules` path is inserted at every level not already named
    /// that, deepest first. Earlier search paths keep priority over later
    /// ones.
    fn candidate_dirs(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        for dir in self.search_paths() {
            for ancestor in dir.ancestors() {
                if ancestor.file_name().map(|n| n == MODULE_DIR) == Some(true) {
                    continue;
                }
                let candidate = ancestor.join(MODULE_DIR);
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        candidates
    }

    /// Match a file: the exact path, then each configured extension.
    fn load_as_file(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }
        for ext in &self.extensions {
            let with_ext = PathBuf::from(format!("{}{}", base.display(), ext));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }
        None
    }

    /// Match a directory: manifest `main` as file or directory, then the
    /// `index` fallback.
    fn load_as_directory(&self, dir: &Path) -> Option<PathBuf> {
        let manifest_path = dir.join(MANIFEST_FILENAME);
        if manifest_path.is_file() {
            match fs::read_to_string(&manifest_path)
                .map_err(|e| e.to_string())
                .and_then(|text| {
                    serde_json::from_str::<PluginManifest>(&text).map_err(|e| e.to_string())
                }) {
                Ok(manifest) => {
                    if let Some(main) = manifest.main {
                        let entry = dir.join(&main);
                        if let Some(path) = self.load_as_file(&entry) {
                            return Some(path);
                        }
                        if let Some(path) = self.load_as_directory(&entry) {
                            return Some(path);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("ignoring malformed manifest {}: {}", manifest_path.display(), e);
                }
            }
        }
        self.load_as_file(&dir.join("index"))
    }

    fn load_module(&self, request: &str, path: PathBuf) -> Result<Rc<PluginModule>, ResolveError> {
        let text = fs::read_to_string(&path)
            .map_err(|source| ResolveError::Io { path: path.clone(), source })?;
        let mut module: PluginModule = serde_json::from_str(&text)
            .map_err(|source| ResolveError::Parse { path: path.clone(), source })?;
        module.request = request.to_string();
        module.path = path;
        Ok(Rc::new(module))
    }
}
