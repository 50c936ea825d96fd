//! Packline - static asset release pipeline and resource map builder
//!
//! This library provides functionality to:
//! - Discover project files and apply pattern-match configuration
//! - Drive an event-driven compile queue to a fixed point
//! - Collect a resource map (id, uri, type, deps) for runtime loaders
//! - Resolve bundle membership and dispatch packaging phases via plugins

pub mod cli;
pub mod compile;
pub mod config;
pub mod events;
pub mod file;
pub mod packagers;
pub mod project;
pub mod release;
pub mod resolver;

pub use compile::{CompileError, CompileSettings, Compiler, PassthroughCompiler};
pub use config::{find_config, load_config, Config, ConfigError, CONFIG_FILENAME};
pub use events::{Event, EventBus, EventKind, Subscription};
pub use file::{FileContent, FileSet, ProjectFile};
pub use release::{ReleaseError, ReleaseOptions, ReleaseReport, Workspace};
