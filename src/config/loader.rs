//! Configuration loading and discovery for `packline.toml`
//!
//! Provides functions to find, load, and validate configuration.

use super::schema::Config;
use glob::Pattern;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file searched for at the project root.
pub const CONFIG_FILENAME: &str = "packline.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse packline.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// Find `packline.toml` by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find `packline.toml` by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Load and validate configuration from a file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&text)?;
    validate(&config)?;
    Ok(config)
}

/// Validate a configuration.
///
/// Checks that the project name is set, media references resolve, and
/// every match pattern is either a pseudo-target or a valid glob.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.project.name.trim().is_empty() {
        errors.push("project.name must not be empty".to_string());
    }

    let overlay_rules = config.media.values().flat_map(|overlay| overlay.matches.iter());
    for rule in config.matches.iter().chain(overlay_rules) {
        if rule.pattern.starts_with("::") {
            continue;
        }
        if let Err(e) = Pattern::new(&rule.pattern) {
            errors.push(format!("invalid match pattern '{}': {}", rule.pattern, e));
        }
    }

    let media = &config.release.media;
    if media != "dev" && !config.media.contains_key(media) {
        errors.push(format!("release.media '{}' has no [media.{}] overlay", media, media));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILENAME);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
            [project]
            name = "demo"
            src = "static"
            "#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.project.src, PathBuf::from("static"));
    }

    #[test]
    fn test_find_config_walks_up() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[project]\nname = \"demo\"\n");
        let nested = temp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let found = find_config_from(nested).unwrap();
        assert_eq!(found, temp.path().join(CONFIG_FILENAME));
    }

    #[test]
    fn test_find_config_missing() {
        let temp = TempDir::new().unwrap();
        // Walking up from a tempdir may still find a config in an ancestor
        // of the tempdir root on exotic setups; restrict to the leaf.
        let leaf = temp.path().join("leaf");
        fs::create_dir_all(&leaf).unwrap();
        let found = find_config_from(leaf.clone());
        if let Some(path) = found {
            assert!(!path.starts_with(&leaf));
        }
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "[project]\nname = \"\"\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
            [project]
            name = "demo"

            [[match]]
            pattern = "[invalid"
            "#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_validate_accepts_pseudo_target() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
            [project]
            name = "demo"

            [[match]]
            pattern = "::package"
            packager = "concat"
            "#,
        );
        assert!(load_config(&path).is_ok());
    }

    #[test]
    fn test_validate_unknown_media() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
            [project]
            name = "demo"

            [release]
            media = "prod"
            "#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("prod"));
    }
}
