//! Packaging engines.
//!
//! A [`Packager`] implements one packaging phase: it receives the release
//! context, the pack table, and the working set, and may mutate the map
//! and the table. The [`PluginHost`] maps engine names to implementations;
//! a resolved plugin module selects its engine by name (defaulting to the
//! module's logical name), so on-disk plugin packages are descriptors
//! configuring an installed engine.

use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

use crate::file::{FileSet, ProjectFile};
use crate::release::{collect, Namespace, PackTable, ReleaseContext};

/// Failure inside a packaging engine.
#[derive(Debug, Error)]
#[error("packager '{engine}' failed: {message}")]
pub struct PackageError {
    pub engine: String,
    pub message: String,
}

impl PackageError {
    pub fn new(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self { engine: engine.into(), message: message.into() }
    }
}

/// One packaging phase implementation.
pub trait Packager {
    /// Run the phase. `settings` merges the plugin module's defaults with
    /// the binding's configuration.
    fn run(
        &self,
        ctx: &mut ReleaseContext,
        pack: &mut PackTable,
        working: &mut FileSet,
        settings: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), PackageError>;
}

/// Registry of installed packaging engines.
pub struct PluginHost {
    engines: HashMap<String, Rc<dyn Packager>>,
}

impl PluginHost {
    /// Host with the built-in engines registered.
    pub fn new() -> Self {
        let mut host = Self { engines: HashMap::new() };
        host.register("noop", Rc::new(NoopPackager));
        host.register("concat", Rc::new(ConcatPackager));
        host
    }

    /// Register an engine under a name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, engine: Rc<dyn Packager>) {
        self.engines.insert(name.into(), engine);
    }

    /// Look up an engine by name.
    pub fn engine(&self, name: &str) -> Option<Rc<dyn Packager>> {
        self.engines.get(name).map(Rc::clone)
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine that does nothing. Useful as a placeholder binding.
pub struct NoopPackager;

impl Packager for NoopPackager {
    fn run(
        &self,
        _ctx: &mut ReleaseContext,
        _pack: &mut PackTable,
        _working: &mut FileSet,
        _settings: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), PackageError> {
        Ok(())
    }
}

/// Engine that concatenates each bundle's members into a package file.
///
/// For every pack-table entry, member contents are joined in order
/// (separated by `settings.separator`, default `\n`) into a new file under
/// `/pkg/<bundle>`, which is registered into the working set and recorded
/// in the `pkg` map namespace.
pub struct ConcatPackager;

impl Packager for ConcatPackager {
    fn run(
        &self,
        ctx: &mut ReleaseContext,
        pack: &mut PackTable,
        working: &mut FileSet,
        settings: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), PackageError> {
        let separator = settings
            .get("separator")
            .and_then(|v| v.as_str())
            .unwrap_or("\n")
            .to_string();

        for (bundle, members) in pack.iter() {
            let mut parts = Vec::with_capacity(members.len());
            for subpath in members {
                let file = working.get(subpath).ok_or_else(|| {
                    PackageError::new("concat", format!("bundle '{}' member {} is not in the working set", bundle, subpath))
                })?;
                let text = file.content.as_str().ok_or_else(|| {
                    PackageError::new(
                        "concat",
                        format!("bundle '{}' member {} is not text", bundle, subpath),
                    )
                })?;
                parts.push(text.to_string());
            }

            let subpath = format!("/pkg/{}", bundle.trim_start_matches('/'));
            let mut package = ProjectFile::new(subpath.clone(), parts.join(&separator));
            package.use_map = true;
            collect(ctx, &package, Namespace::Pkg);
            working.insert(subpath, package);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ResourceMap;

    fn context() -> ReleaseContext {
        ReleaseContext { ids: Default::default(), map: ResourceMap::default() }
    }

    #[test]
    fn test_host_lookup() {
        let host = PluginHost::new();
        assert!(host.engine("concat").is_some());
        assert!(host.engine("unknown").is_none());
    }

    #[test]
    fn test_concat_builds_package_files() {
        let mut ctx = context();
        let mut working = FileSet::new();
        working.insert("/a.js".to_string(), ProjectFile::new("/a.js", "var a;"));
        working.insert("/b.js".to_string(), ProjectFile::new("/b.js", "var b;"));

        let mut pack = PackTable::new();
        pack.insert("bundle.js".to_string(), vec!["/a.js".to_string(), "/b.js".to_string()]);

        ConcatPackager
            .run(&mut ctx, &mut pack, &mut working, &serde_json::Map::new())
            .unwrap();

        let package = &working["/pkg/bundle.js"];
        assert_eq!(package.content, "var a;\nvar b;");
        assert!(ctx.map.pkg.contains_key("pkg/bundle.js"));
    }

    #[test]
    fn test_concat_rejects_binary_members() {
        let mut ctx = context();
        let mut working = FileSet::new();
        working.insert(
            "/logo.png".to_string(),
            ProjectFile::new("/logo.png", vec![0x89u8, 0xff, 0xfe]),
        );

        let mut pack = PackTable::new();
        pack.insert("bundle.js".to_string(), vec!["/logo.png".to_string()]);

        let err = ConcatPackager
            .run(&mut ctx, &mut pack, &mut working, &serde_json::Map::new())
            .unwrap_err();
        assert!(err.to_string().contains("is not text"));
    }

    #[test]
    fn test_concat_missing_member_fails() {
        let mut ctx = context();
        let mut working = FileSet::new();
        let mut pack = PackTable::new();
        pack.insert("bundle.js".to_string(), vec!["/ghost.js".to_string()]);

        let err = ConcatPackager
            .run(&mut ctx, &mut pack, &mut working, &serde_json::Map::new())
            .unwrap_err();
        assert!(err.to_string().contains("/ghost.js"));
    }
}
