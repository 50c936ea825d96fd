//! Configuration: schema, loading, and pattern matching.

mod loader;
mod matching;
mod schema;

pub use loader::{find_config, find_config_from, load_config, validate, ConfigError, CONFIG_FILENAME};
pub use matching::{FileProps, MatchStore, PhaseBindings, PACKAGE_TARGET};
pub use schema::{
    default_config, Config, MatchRule, MediaOverlay, PackConfig, PluginBinding, PluginsConfig,
    ProjectConfig, ReleaseConfig,
};
