//! Packaging phase dispatch.
//!
//! The four phases run in a fixed order; each resolves its plugin binding
//! from the match store (pseudo-target `::package`), which a caller
//! override may replace for the run. The dispatcher enforces ordering
//! only: phases are free to mutate the resource map and the pack table.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use crate::config::{MatchStore, PhaseBindings, PluginBinding};
use crate::events::{Event, EventBus};
use crate::file::FileSet;
use crate::packagers::{PackageError, Packager, PluginHost};
use crate::release::context::{PackTable, ReleaseContext};
use crate::resolver::{PluginResolver, ResolveError};

/// The ordered packaging phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Prepackager,
    Packager,
    Spriter,
    Postpackager,
}

impl Phase {
    /// Execution order.
    pub const ALL: [Phase; 4] =
        [Phase::Prepackager, Phase::Packager, Phase::Spriter, Phase::Postpackager];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Prepackager => "prepackager",
            Phase::Packager => "packager",
            Phase::Spriter => "spriter",
            Phase::Postpackager => "postpackager",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller-supplied replacement for a phase's bound plugin.
pub enum PackagerOverride {
    /// Replace with another named plugin, resolved normally.
    Plugin(PluginBinding),
    /// Replace with an in-process packager.
    Inline(Rc<dyn Packager>),
}

/// Phase dispatch error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PhaseError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Package(#[from] PackageError),
    /// The module resolved, but no engine under its name is installed.
    #[error("no packaging engine '{engine}' installed for phase {phase}")]
    UnknownEngine { phase: Phase, engine: String },
}

/// Run the four packaging phases in order.
pub fn run_phases(
    store: &MatchStore,
    resolver: &PluginResolver,
    host: &PluginHost,
    bus: &EventBus,
    ctx: &mut ReleaseContext,
    pack: &mut PackTable,
    working: &mut FileSet,
    overrides: &HashMap<Phase, PackagerOverride>,
) -> Result<(), PhaseError> {
    let bindings = store.packaging();

    for phase in Phase::ALL {
        let bound = binding_for(&bindings, phase);
        let (packager, settings) = match overrides.get(&phase) {
            Some(PackagerOverride::Inline(engine)) => (Rc::clone(engine), Default::default()),
            Some(PackagerOverride::Plugin(binding)) => {
                resolve_binding(resolver, host, phase, binding)?
            }
            None => match bound {
                Some(binding) => resolve_binding(resolver, host, phase, binding)?,
                None => continue,
            },
        };

        bus.emit(&Event::PhaseStart { phase });
        log::debug!("[{}] start", phase);
        packager.run(ctx, pack, working, &settings)?;
        log::debug!("[{}] end", phase);
    }
    Ok(())
}

fn binding_for(bindings: &PhaseBindings, phase: Phase) -> Option<&PluginBinding> {
    match phase {
        Phase::Prepackager => bindings.prepackager.as_ref(),
        Phase::Packager => bindings.packager.as_ref(),
        Phase::Spriter => bindings.spriter.as_ref(),
        Phase::Postpackager => bindings.postpackager.as_ref(),
    }
}

/// Resolve a binding to an installed engine and its effective settings.
///
/// The plugin module is located on disk under `<phase>-<name>`; its engine
/// field selects the implementation (defaulting to the logical name).
/// Binding settings override the module's defaults key-by-key.
fn resolve_binding(
    resolver: &PluginResolver,
    host: &PluginHost,
    phase: Phase,
    binding: &PluginBinding,
) -> Result<(Rc<dyn Packager>, serde_json::Map<String, serde_json::Value>), PhaseError> {
    let module = resolver.resolve(&[phase.name(), binding.name()])?;
    let engine_name = module.engine.clone().unwrap_or_else(|| binding.name().to_string());
    let engine = host.engine(&engine_name).ok_or_else(|| PhaseError::UnknownEngine {
        phase,
        engine: engine_name.clone(),
    })?;

    let mut settings = module.settings.clone();
    for (key, value) in binding.settings() {
        settings.insert(key, value);
    }
    Ok((engine, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_config, MatchRule, PluginsConfig};
    use crate::resolver::MODULE_DIR;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Recording {
        log: Rc<RefCell<Vec<String>>>,
        label: &'static str,
    }

    impl Packager for Recording {
        fn run(
            &self,
            _ctx: &mut ReleaseContext,
            _pack: &mut PackTable,
            _working: &mut FileSet,
            _settings: &serde_json::Map<String, serde_json::Value>,
        ) -> Result<(), PackageError> {
            self.log.borrow_mut().push(self.label.to_string());
            Ok(())
        }
    }

    fn store_with_bindings(rules: Vec<MatchRule>) -> MatchStore {
        let mut config = default_config();
        config.matches = rules;
        MatchStore::from_config(&config, "dev")
    }

    fn write_plugin(root: &Path, name: &str, body: &str) {
        let dir = root.join(MODULE_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("packline-{}.json", name)), body).unwrap();
    }

    fn resolver_at(root: &Path) -> PluginResolver {
        let config =
            PluginsConfig { paths: vec![root.join(MODULE_DIR)], ..Default::default() };
        PluginResolver::new(&config, root)
    }

    #[test]
    fn test_phases_run_in_order() {
        let temp = TempDir::new().unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut overrides = HashMap::new();
        for (phase, label) in [
            (Phase::Postpackager, "post"),
            (Phase::Prepackager, "pre"),
            (Phase::Packager, "pack"),
        ] {
            overrides.insert(
                phase,
                PackagerOverride::Inline(Rc::new(Recording { log: Rc::clone(&log), label })),
            );
        }

        let store = store_with_bindings(vec![]);
        let resolver = resolver_at(temp.path());
        let host = PluginHost::new();
        let bus = EventBus::new();
        let mut ctx = ReleaseContext::default();
        let mut pack = PackTable::new();
        let mut working = FileSet::new();

        run_phases(&store, &resolver, &host, &bus, &mut ctx, &mut pack, &mut working, &overrides)
            .unwrap();
        assert_eq!(*log.borrow(), vec!["pre", "pack", "post"]);
    }

    #[test]
    fn test_bound_plugin_resolved_and_run() {
        let temp = TempDir::new().unwrap();
        write_plugin(temp.path(), "packager-bundles", r#"{"engine": "concat"}"#);

        let mut rule = MatchRule { pattern: "::package".to_string(), ..Default::default() };
        rule.packager = Some(PluginBinding::Name("bundles".to_string()));
        let store = store_with_bindings(vec![rule]);

        let resolver = resolver_at(temp.path());
        let host = PluginHost::new();
        let bus = EventBus::new();
        let mut ctx = ReleaseContext::default();
        let mut pack = PackTable::new();
        let mut working = FileSet::new();

        run_phases(
            &store,
            &resolver,
            &host,
            &bus,
            &mut ctx,
            &mut pack,
            &mut working,
            &HashMap::new(),
        )
        .unwrap();
    }

    #[test]
    fn test_unresolved_binding_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut rule = MatchRule { pattern: "::package".to_string(), ..Default::default() };
        rule.spriter = Some(PluginBinding::Name("ghost".to_string()));
        let store = store_with_bindings(vec![rule]);

        let resolver = resolver_at(temp.path());
        let err = run_phases(
            &store,
            &resolver,
            &PluginHost::new(),
            &EventBus::new(),
            &mut ReleaseContext::default(),
            &mut PackTable::new(),
            &mut FileSet::new(),
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("packline-spriter-ghost"));
    }

    #[test]
    fn test_phase_start_events_emitted() {
        let temp = TempDir::new().unwrap();
        let bus = EventBus::new();
        let phases = Rc::new(RefCell::new(Vec::new()));
        let phases2 = Rc::clone(&phases);
        let _sub = bus.subscribe(crate::events::EventKind::PhaseStart, move |event| {
            if let Event::PhaseStart { phase } = event {
                phases2.borrow_mut().push(*phase);
            }
        });

        let mut overrides = HashMap::new();
        overrides.insert(
            Phase::Packager,
            PackagerOverride::Inline(Rc::new(crate::packagers::NoopPackager)),
        );

        run_phases(
            &store_with_bindings(vec![]),
            &resolver_at(temp.path()),
            &PluginHost::new(),
            &bus,
            &mut ReleaseContext::default(),
            &mut PackTable::new(),
            &mut FileSet::new(),
            &overrides,
        )
        .unwrap();
        assert_eq!(*phases.borrow(), vec![Phase::Packager]);
    }
}
