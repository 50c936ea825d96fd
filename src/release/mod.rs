//! Release driver.
//!
//! Orchestrates a release run: seeds the compile queue from the project
//! source set, drains it to a fixed point while compile side effects
//! re-enqueue newly discovered files, expands derived artifacts, collects
//! the resource map, resolves the pack table, dispatches the packaging
//! phases, and fills the resource-map placeholders.
//!
//! A [`Workspace`] owns the process-wide pieces: the event bus, the plugin
//! resolver and its caches, the engine host, and the loaded configuration.
//! Runs borrow the workspace mutably, so at most one release pipeline is
//! active per workspace at a time. All run-scoped event handlers are held
//! as RAII subscriptions and released on exit, success or failure.

mod collect;
mod context;
mod pack;
mod phases;

pub use collect::{collect, fill_resource_maps, serialize_map, RESOURCE_MAP_TOKEN};
pub use context::{MapEntry, Namespace, PackTable, ReleaseContext, ResourceMap};
pub use pack::{resolve_pack_table, PackError, PACK_FILENAME};
pub use phases::{run_phases, PackagerOverride, Phase, PhaseError};

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;
use thiserror::Error;

use crate::compile::{CompileError, CompileSettings, Compiler};
use crate::config::{Config, MatchStore};
use crate::events::{Event, EventBus, EventKind};
use crate::file::{DerivedSpec, FileSet, ProjectFile};
use crate::packagers::PluginHost;
use crate::project::{Project, ProjectError};
use crate::resolver::{PluginModule, PluginResolver, ResolveError};

/// Release failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReleaseError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error("failed to serialize resource map: {0}")]
    Map(#[from] serde_json::Error),
}

/// Hook observing a file during the run.
pub type FileHook = Box<dyn Fn(&ProjectFile, &ReleaseContext)>;

/// Options for one release run.
#[derive(Default)]
pub struct ReleaseOptions {
    /// Compile only this subset of paths instead of the full source set.
    pub src_cache: Option<Vec<PathBuf>>,
    /// Pre-populated working set, registered and collected before the
    /// queue drains.
    pub seed: Option<FileSet>,
    /// Runs before each file compiles (and for each derived file).
    pub before_each: Option<FileHook>,
    /// Runs after each file compiles (and for each derived file).
    pub after_each: Option<FileHook>,
    /// Compile-step callbacks forwarded to the compiler.
    pub compile: CompileSettings,
    /// Per-phase packager replacements for this run.
    pub overrides: HashMap<Phase, PackagerOverride>,
}

/// Result of a release run.
#[derive(Debug)]
pub struct ReleaseReport {
    /// The accumulated ids and resource map.
    pub context: ReleaseContext,
    /// Final working set, in discovery order.
    pub files: FileSet,
    /// Resolved pack table after packaging phases ran.
    pub pack: PackTable,
}

#[derive(Default)]
struct RunState {
    working: FileSet,
    ctx: ReleaseContext,
    queue: VecDeque<ProjectFile>,
    placeholders: Vec<String>,
}

impl RunState {
    fn note_placeholder(&mut self, file: &ProjectFile) {
        if file.is_resource_map && !self.placeholders.contains(&file.subpath) {
            self.placeholders.push(file.subpath.clone());
        }
    }
}

/// Process-wide release environment.
pub struct Workspace {
    config: Config,
    root: PathBuf,
    media: String,
    bus: EventBus,
    resolver: PluginResolver,
    host: PluginHost,
    hooks: Vec<Rc<PluginModule>>,
    hooks_loaded: bool,
}

impl Workspace {
    /// Create a workspace rooted at `root` with a loaded configuration.
    pub fn new(config: Config, root: PathBuf) -> Self {
        let media = config.release.media.clone();
        let resolver = PluginResolver::new(&config.plugins, &root);
        let workspace = Self {
            config,
            root,
            media,
            bus: EventBus::new(),
            resolver,
            host: PluginHost::new(),
            hooks: Vec::new(),
            hooks_loaded: false,
        };
        workspace.bus.emit(&Event::ConfigLoaded);
        workspace
    }

    /// Select a different media (configuration overlay).
    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        self.media = media.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn media(&self) -> &str {
        &self.media
    }

    /// Engine registry, for installing additional packagers.
    pub fn host_mut(&mut self) -> &mut PluginHost {
        &mut self.host
    }

    pub fn project(&self) -> Project {
        Project::new(self.root.clone(), &self.config.project.src)
    }

    /// Match rules effective under the active media.
    pub fn match_store(&self) -> MatchStore {
        MatchStore::from_config(&self.config, &self.media)
    }

    /// Run the release pipeline to completion.
    pub fn release(
        &mut self,
        compiler: &mut dyn Compiler,
        opts: ReleaseOptions,
    ) -> Result<ReleaseReport, ReleaseError> {
        let started = Instant::now();
        let store = self.match_store();
        let project = self.project();

        self.load_hooks()?;

        // Seed source set: explicit subset, or the full project source.
        let seed_src: FileSet = match &opts.src_cache {
            Some(paths) if !paths.is_empty() => {
                let mut set = FileSet::new();
                for path in paths {
                    if let Some(file) = project.file(&store, path)? {
                        if file.release {
                            set.insert(file.subpath.clone(), file);
                        }
                    }
                }
                set
            }
            _ => project.source(&store)?,
        };

        let opts = Rc::new(opts);
        let state = Rc::new(RefCell::new(RunState::default()));

        {
            let mut st = state.borrow_mut();
            if let Some(seeded) = &opts.seed {
                for (subpath, file) in seeded.clone() {
                    collect(&mut st.ctx, &file, Namespace::Res);
                    st.note_placeholder(&file);
                    st.working.insert(subpath, file);
                }
            }
            for file in seed_src.values() {
                st.queue.push_back(file.clone());
            }
        }

        self.bus.emit(&Event::ReleaseStart);

        // Run-scoped handlers. The guards live until this function exits,
        // so a later run can never observe them.
        let mut subs = Vec::with_capacity(4);

        {
            let state = Rc::clone(&state);
            let opts = Rc::clone(&opts);
            subs.push(self.bus.subscribe(EventKind::CompileStart, move |event| {
                let Event::CompileStart { file } = event else { return };
                let mut st = state.borrow_mut();
                st.working.insert(file.subpath.clone(), file.clone());
                if let Some(hook) = &opts.before_each {
                    hook(file, &st.ctx);
                }
            }));
        }

        {
            let state = Rc::clone(&state);
            let opts = Rc::clone(&opts);
            subs.push(self.bus.subscribe(EventKind::CompileEnd, move |event| {
                let Event::CompileEnd { subpath } = event else { return };
                let mut st = state.borrow_mut();
                expand_compiled(&mut st, subpath, &opts);
            }));
        }

        {
            let state = Rc::clone(&state);
            subs.push(self.bus.subscribe(EventKind::ProcessEnd, move |event| {
                let Event::ProcessEnd { subpath } = event else { return };
                let mut st = state.borrow_mut();
                let Some(file) = st.working.get_mut(subpath) else { return };
                if file.use_same_name_require {
                    if file.is_js_like() {
                        file.add_same_name_require(".css");
                    } else if file.is_html_like() {
                        file.add_same_name_require(".js");
                        file.add_same_name_require(".css");
                    }
                }
            }));
        }

        {
            let state = Rc::clone(&state);
            subs.push(self.bus.subscribe(EventKind::CompileAdd, move |event| {
                let Event::CompileAdd { file } = event else { return };
                state.borrow_mut().queue.push_back(file.clone());
            }));
        }

        compiler.setup(&opts.compile);

        // Drain to a fixed point. A compile failure propagates immediately;
        // the guards above drop on the way out.
        loop {
            let next = state.borrow_mut().queue.pop_front();
            let Some(mut file) = next else { break };

            self.bus.emit(&Event::CompileStart { file: file.clone() });
            compiler.compile(&mut file, &self.bus, &opts.compile)?;
            let subpath = file.subpath.clone();
            state.borrow_mut().working.insert(subpath.clone(), file);
            self.bus.emit(&Event::ProcessEnd { subpath: subpath.clone() });
            self.bus.emit(&Event::CompileEnd { subpath });
        }

        drop(subs);
        let mut st = Rc::try_unwrap(state)
            .unwrap_or_else(|_| unreachable!("run handlers released their state"))
            .into_inner();

        let mut pack =
            pack::resolve_pack_table(&mut self.config, &self.media, &self.root, &st.working)?;

        phases::run_phases(
            &store,
            &self.resolver,
            &self.host,
            &self.bus,
            &mut st.ctx,
            &mut pack,
            &mut st.working,
            &opts.overrides,
        )?;

        fill_resource_maps(&st.ctx.map, &mut st.working, &st.placeholders)?;

        self.bus.emit(&Event::ReleaseEnd);
        log::debug!("release finished in {:?}", started.elapsed());

        Ok(ReleaseReport { context: st.ctx, files: st.working, pack })
    }

    /// Hook plugin modules resolved for this workspace, with their default
    /// settings. Empty before the first release.
    pub fn hook_modules(&self) -> &[Rc<PluginModule>] {
        &self.hooks
    }

    /// Resolve configured hook plugins, once per workspace.
    ///
    /// Hook modules are descriptors: resolving them validates the
    /// installation and exposes each module's settings through
    /// [`Workspace::hook_modules`]; embedders wire the corresponding
    /// behavior into their [`Compiler`] or their event subscriptions.
    fn load_hooks(&mut self) -> Result<(), ResolveError> {
        if self.hooks_loaded {
            return Ok(());
        }
        for name in &self.config.release.hooks {
            let module = self.resolver.resolve(&["hook", name])?;
            log::debug!("loaded hook plugin {}", module.request);
            self.hooks.push(module);
        }
        self.hooks_loaded = true;
        Ok(())
    }
}

/// Compile-end handling: merge legacy derived metadata, run hooks, collect
/// the map record, and expand derived records one level deep.
fn expand_compiled(st: &mut RunState, subpath: &str, opts: &ReleaseOptions) {
    let Some(file) = st.working.get_mut(subpath) else { return };

    // Legacy carriers declare derived records under extras.
    if let Some(value) = file.extras.remove("derived") {
        match serde_json::from_value::<Vec<DerivedSpec>>(value) {
            Ok(mut list) => file.derived.append(&mut list),
            Err(e) => log::warn!("ignoring malformed derived metadata on {}: {}", subpath, e),
        }
    }

    let file = file.clone();
    if let Some(hook) = &opts.after_each {
        hook(&file, &st.ctx);
    }
    collect(&mut st.ctx, &file, Namespace::Res);
    st.note_placeholder(&file);

    // One level only: a derived record's own derived list is not expanded.
    for spec in &file.derived {
        let derived = file.derive(spec);
        st.working.insert(derived.subpath.clone(), derived.clone());
        if let Some(hook) = &opts.before_each {
            hook(&derived, &st.ctx);
        }
        if let Some(hook) = &opts.after_each {
            hook(&derived, &st.ctx);
        }
        collect(&mut st.ctx, &derived, Namespace::Res);
        st.note_placeholder(&derived);
    }
}
