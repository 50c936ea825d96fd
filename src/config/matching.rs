//! Pattern-match store.
//!
//! Resolves per-file properties and packaging-phase plugin bindings from
//! the ordered `[[match]]` rules of the active media. File rules match
//! glob patterns against subpaths; packaging bindings come from rules whose
//! pattern is the `::package` pseudo-target. Later rules win field-by-field.

use glob::{MatchOptions, Pattern};

use super::schema::{Config, MatchRule, PluginBinding};

/// Pseudo-target carrying packaging-phase bindings.
pub const PACKAGE_TARGET: &str = "::package";

/// Per-file property overrides accumulated across matching rules.
#[derive(Debug, Clone, Default)]
pub struct FileProps {
    pub release: Option<bool>,
    pub use_map: Option<bool>,
    pub pack_to: Option<String>,
    pub is_partial: Option<bool>,
    pub resource_map: Option<bool>,
    pub minified: Option<bool>,
    pub use_same_name_require: Option<bool>,
}

/// Plugin bindings for the four packaging phases.
#[derive(Debug, Clone, Default)]
pub struct PhaseBindings {
    pub prepackager: Option<PluginBinding>,
    pub packager: Option<PluginBinding>,
    pub spriter: Option<PluginBinding>,
    pub postpackager: Option<PluginBinding>,
}

struct CompiledRule {
    pattern: Option<Pattern>,
    pseudo: Option<String>,
    rule: MatchRule,
}

/// Ordered view of the match rules effective under one media.
pub struct MatchStore {
    rules: Vec<CompiledRule>,
}

impl MatchStore {
    /// Build the store for `media`: base rules first, overlay rules
    /// appended.
    ///
    /// Rules with invalid glob patterns are skipped here; [`super::loader::validate`]
    /// reports them at load time.
    pub fn from_config(config: &Config, media: &str) -> Self {
        let overlay = config.media.get(media).map(|m| m.matches.as_slice()).unwrap_or(&[]);
        let rules = config
            .matches
            .iter()
            .chain(overlay.iter())
            .filter_map(|rule| {
                if let Some(target) = rule.pattern.strip_prefix("::") {
                    Some(CompiledRule {
                        pattern: None,
                        pseudo: Some(format!("::{}", target)),
                        rule: rule.clone(),
                    })
                } else {
                    Pattern::new(&rule.pattern).ok().map(|pattern| CompiledRule {
                        pattern: Some(pattern),
                        pseudo: None,
                        rule: rule.clone(),
                    })
                }
            })
            .collect();
        Self { rules }
    }

    fn match_options() -> MatchOptions {
        MatchOptions {
            case_sensitive: true,
            // A `*.js` rule should match `/js/app.js` the way users expect.
            require_literal_separator: false,
            require_literal_leading_dot: false,
        }
    }

    /// Accumulated file properties for a subpath; later rules win.
    pub fn props_for(&self, subpath: &str) -> FileProps {
        let options = Self::match_options();
        let mut props = FileProps::default();
        for compiled in &self.rules {
            let Some(pattern) = &compiled.pattern else { continue };
            if !pattern.matches_with(subpath, options) {
                continue;
            }
            let rule = &compiled.rule;
            merge(&mut props.release, &rule.release);
            merge(&mut props.use_map, &rule.use_map);
            merge(&mut props.pack_to, &rule.pack_to);
            merge(&mut props.is_partial, &rule.is_partial);
            merge(&mut props.resource_map, &rule.resource_map);
            merge(&mut props.minified, &rule.minified);
            merge(&mut props.use_same_name_require, &rule.use_same_name_require);
        }
        props
    }

    /// Packaging-phase bindings from `::package` rules; later rules win
    /// per phase.
    pub fn packaging(&self) -> PhaseBindings {
        let mut bindings = PhaseBindings::default();
        for compiled in &self.rules {
            if compiled.pseudo.as_deref() != Some(PACKAGE_TARGET) {
                continue;
            }
            let rule = &compiled.rule;
            merge(&mut bindings.prepackager, &rule.prepackager);
            merge(&mut bindings.packager, &rule.packager);
            merge(&mut bindings.spriter, &rule.spriter);
            merge(&mut bindings.postpackager, &rule.postpackager);
        }
        bindings
    }
}

fn merge<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{default_config, MediaOverlay};

    fn rule(pattern: &str) -> MatchRule {
        MatchRule { pattern: pattern.to_string(), ..Default::default() }
    }

    #[test]
    fn test_props_later_rule_wins() {
        let mut config = default_config();
        let mut first = rule("*.js");
        first.pack_to = Some("all.js".to_string());
        let mut second = rule("/vendor/*.js");
        second.pack_to = Some("vendor.js".to_string());
        config.matches = vec![first, second];

        let store = MatchStore::from_config(&config, "dev");
        assert_eq!(store.props_for("/app.js").pack_to.as_deref(), Some("all.js"));
        assert_eq!(store.props_for("/vendor/x.js").pack_to.as_deref(), Some("vendor.js"));
    }

    #[test]
    fn test_pseudo_target_never_matches_files() {
        let mut config = default_config();
        let mut pkg = rule("::package");
        pkg.release = Some(false);
        config.matches = vec![pkg];

        let store = MatchStore::from_config(&config, "dev");
        assert!(store.props_for("/anything").release.is_none());
    }

    #[test]
    fn test_packaging_bindings() {
        let mut config = default_config();
        let mut pkg = rule("::package");
        pkg.packager = Some(PluginBinding::Name("concat".to_string()));
        let mut pkg2 = rule("::package");
        pkg2.packager = Some(PluginBinding::Name("concat-v2".to_string()));
        pkg2.spriter = Some(PluginBinding::Name("csssprites".to_string()));
        config.matches = vec![pkg, pkg2];

        let store = MatchStore::from_config(&config, "dev");
        let bindings = store.packaging();
        assert_eq!(bindings.packager.unwrap().name(), "concat-v2");
        assert_eq!(bindings.spriter.unwrap().name(), "csssprites");
        assert!(bindings.prepackager.is_none());
    }

    #[test]
    fn test_media_overlay_rules_appended() {
        let mut config = default_config();
        let mut base = rule("*.js");
        base.minified = Some(false);
        config.matches = vec![base];

        let mut prod_rule = rule("*.js");
        prod_rule.minified = Some(true);
        config.media.insert(
            "prod".to_string(),
            MediaOverlay { pack: None, matches: vec![prod_rule] },
        );

        let dev = MatchStore::from_config(&config, "dev");
        assert_eq!(dev.props_for("/a.js").minified, Some(false));
        let prod = MatchStore::from_config(&config, "prod");
        assert_eq!(prod.props_for("/a.js").minified, Some(true));
    }
}
