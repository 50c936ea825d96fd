//! The `inspect` subcommand: print the effective configuration.

use std::path::Path;
use std::process::ExitCode;

use crate::cli::{EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::config::{find_config, load_config, Config, MatchRule, CONFIG_FILENAME};
use crate::release::PACK_FILENAME;

pub(crate) fn run_inspect(root: Option<&Path>, media: Option<&str>) -> ExitCode {
    let config_path = match root {
        Some(dir) => dir.join(CONFIG_FILENAME),
        None => match find_config() {
            Some(path) => path,
            None => {
                eprintln!("Error: no {} found in this directory or any ancestor", CONFIG_FILENAME);
                return ExitCode::from(EXIT_INVALID_ARGS);
            }
        },
    };

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let media = media.unwrap_or(&config.release.media);
    let root = config_path.parent().unwrap_or(Path::new("."));

    println!("project: {}", config.project.name);
    println!("media: {}", media);
    println!("src: {}", root.join(&config.project.src).display());
    println!("out: {}", root.join(&config.project.out).display());

    println!("plugin search paths:");
    if config.plugins.paths.is_empty() {
        println!("  (default) {}", root.join("packline_modules").display());
    } else {
        for path in &config.plugins.paths {
            println!("  {}", path.display());
        }
    }

    println!("pack source: {}", pack_source(&config, media, root));

    println!("match rules:");
    let overlay = config.media.get(media);
    let overlay_rules = overlay.map(|o| o.matches.as_slice()).unwrap_or(&[]);
    for rule in config.matches.iter().chain(overlay_rules) {
        print_rule(rule);
    }
    if config.matches.is_empty() && overlay_rules.is_empty() {
        println!("  (none)");
    }

    ExitCode::from(EXIT_SUCCESS)
}

fn pack_source(config: &Config, media: &str, root: &Path) -> String {
    if config.active_pack(media).is_some() {
        "explicit configuration".to_string()
    } else if root.join(PACK_FILENAME).is_file() {
        format!("pack file ({})", PACK_FILENAME)
    } else {
        "synthesized from packTo targets".to_string()
    }
}

fn print_rule(rule: &MatchRule) {
    let mut props: Vec<String> = Vec::new();
    if let Some(v) = rule.release {
        props.push(format!("release={}", v));
    }
    if let Some(v) = rule.use_map {
        props.push(format!("use_map={}", v));
    }
    if let Some(v) = &rule.pack_to {
        props.push(format!("pack_to={}", v));
    }
    if let Some(v) = rule.is_partial {
        props.push(format!("is_partial={}", v));
    }
    if let Some(v) = rule.resource_map {
        props.push(format!("resource_map={}", v));
    }
    if let Some(v) = rule.minified {
        props.push(format!("minified={}", v));
    }
    if let Some(v) = rule.use_same_name_require {
        props.push(format!("use_same_name_require={}", v));
    }
    for (phase, binding) in [
        ("prepackager", &rule.prepackager),
        ("packager", &rule.packager),
        ("spriter", &rule.spriter),
        ("postpackager", &rule.postpackager),
    ] {
        if let Some(binding) = binding {
            props.push(format!("{}={}", phase, binding.name()));
        }
    }
    println!("  {} [{}]", rule.pattern, props.join(", "));
}
