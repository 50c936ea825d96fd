//! Configuration schema types for `packline.toml`
//!
//! Defines the project layout, plugin search settings, pattern-match rules,
//! pack configuration, and media overlays.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bundle name → ordered list of member patterns or subpaths.
pub type PackConfig = IndexMap<String, Vec<String>>;

/// Top-level configuration loaded from `packline.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata and directories
    pub project: ProjectConfig,
    /// Release settings
    #[serde(default)]
    pub release: ReleaseConfig,
    /// Plugin discovery settings
    #[serde(default)]
    pub plugins: PluginsConfig,
    /// Explicit pack table. When present it wins over the persisted pack
    /// file and the synthesized default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<PackConfig>,
    /// Ordered pattern-match rules
    #[serde(default, rename = "match")]
    pub matches: Vec<MatchRule>,
    /// Named configuration overlays selected by media
    #[serde(default)]
    pub media: IndexMap<String, MediaOverlay>,
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Source directory for project files
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Release output directory
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("output")
}

/// Release settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Active media (configuration overlay) name
    #[serde(default = "default_media")]
    pub media: String,
    /// Hook plugins resolved once per workspace when config is loaded
    #[serde(default)]
    pub hooks: Vec<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self { media: default_media(), hooks: Vec::new() }
    }
}

fn default_media() -> String {
    "dev".to_string()
}

/// Plugin discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Search directories; each must end in `packline_modules`
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    /// Name prefixes tried in order when resolving a logical plugin name
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,
    /// File extensions tried for direct file matches
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Deprecated: single local search directory, merged to the front
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_dir: Option<PathBuf>,
    /// Deprecated: single global search directory, merged to the back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_dir: Option<PathBuf>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            prefixes: default_prefixes(),
            extensions: default_extensions(),
            local_dir: None,
            global_dir: None,
        }
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["packline".to_string()]
}

fn default_extensions() -> Vec<String> {
    vec![".json".to_string()]
}

/// Plugin binding in a match rule: bare name, or name plus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginBinding {
    /// Just the logical plugin name
    Name(String),
    /// Name with settings forwarded to the plugin
    Full {
        name: String,
        #[serde(default)]
        settings: serde_json::Map<String, serde_json::Value>,
    },
}

impl PluginBinding {
    pub fn name(&self) -> &str {
        match self {
            PluginBinding::Name(name) => name,
            PluginBinding::Full { name, .. } => name,
        }
    }

    pub fn settings(&self) -> serde_json::Map<String, serde_json::Value> {
        match self {
            PluginBinding::Name(_) => serde_json::Map::new(),
            PluginBinding::Full { settings, .. } => settings.clone(),
        }
    }
}

/// One pattern-match rule.
///
/// File-property fields apply to files whose subpath matches `pattern`;
/// packaging-phase bindings are read from rules matching the `::package`
/// pseudo-target. Later rules win field-by-field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchRule {
    /// Glob pattern against subpaths, or a `::`-prefixed pseudo-target
    pub pattern: String,
    pub release: Option<bool>,
    pub use_map: Option<bool>,
    pub pack_to: Option<String>,
    pub is_partial: Option<bool>,
    pub resource_map: Option<bool>,
    pub minified: Option<bool>,
    pub use_same_name_require: Option<bool>,
    pub prepackager: Option<PluginBinding>,
    pub packager: Option<PluginBinding>,
    pub spriter: Option<PluginBinding>,
    pub postpackager: Option<PluginBinding>,
}

/// Configuration overlay selected by media name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaOverlay {
    /// Pack table override for this media
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pack: Option<PackConfig>,
    /// Extra match rules appended after the base rules
    #[serde(rename = "match")]
    pub matches: Vec<MatchRule>,
}

impl Config {
    /// Pack configuration effective under `media`: the overlay's table if
    /// present, else the base table.
    pub fn active_pack(&self, media: &str) -> Option<&PackConfig> {
        self.media
            .get(media)
            .and_then(|overlay| overlay.pack.as_ref())
            .or(self.pack.as_ref())
    }
}

/// Minimal valid configuration, used by tests and `inspect` fallbacks.
pub fn default_config() -> Config {
    Config {
        project: ProjectConfig {
            name: "project".to_string(),
            src: default_src(),
            out: default_out(),
        },
        release: ReleaseConfig::default(),
        plugins: PluginsConfig::default(),
        pack: None,
        matches: Vec::new(),
        media: IndexMap::new(),
    }
}
