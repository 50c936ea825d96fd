//! Pack-table resolution.
//!
//! Bundle membership comes from exactly one source per run, first match
//! wins: the explicit pack configuration of the active media, the
//! persisted project-root pack file, or a default synthesized from each
//! file's `pack_to`. Sources are never merged.

use glob::Pattern;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::{Config, PackConfig};
use crate::file::FileSet;
use crate::release::context::PackTable;

/// Persisted pack file read from the project root.
pub const PACK_FILENAME: &str = "packline-pack.json";

/// Pack-table resolution error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PackError {
    #[error("failed to read pack file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid pack file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Resolve the pack table for a run.
///
/// When the table comes from the persisted pack file, the parsed config is
/// stored into `config.pack` so subsequent runs take the explicit-config
/// branch without re-reading the file.
pub fn resolve_pack_table(
    config: &mut Config,
    media: &str,
    root: &Path,
    working: &FileSet,
) -> Result<PackTable, PackError> {
    if let Some(conf) = config.active_pack(media) {
        return Ok(expand_pack_config(&conf.clone(), working));
    }

    let path = root.join(PACK_FILENAME);
    if path.is_file() {
        let text = fs::read_to_string(&path)
            .map_err(|source| PackError::Io { path: path.display().to_string(), source })?;
        let conf: PackConfig = serde_json::from_str(&text)
            .map_err(|source| PackError::Parse { path: path.display().to_string(), source })?;
        config.pack = Some(conf.clone());
        return Ok(expand_pack_config(&conf, working));
    }

    Ok(synthesize_pack_table(working))
}

/// Expand configured bundle entries against the working set.
///
/// Each entry is tried as a literal subpath first, then as a glob pattern
/// over the working set in discovery order. Duplicate members are dropped.
fn expand_pack_config(conf: &PackConfig, working: &FileSet) -> PackTable {
    let mut table = PackTable::new();
    for (bundle, entries) in conf {
        let mut members: Vec<String> = Vec::new();
        for entry in entries {
            if working.contains_key(entry) {
                if !members.contains(entry) {
                    members.push(entry.clone());
                }
                continue;
            }
            let Ok(pattern) = Pattern::new(entry) else {
                log::warn!("invalid pack pattern '{}' for bundle '{}', skipped", entry, bundle);
                continue;
            };
            for subpath in working.keys() {
                if pattern.matches(subpath) && !members.contains(subpath) {
                    members.push(subpath.clone());
                }
            }
        }
        table.insert(bundle.clone(), members);
    }
    table
}

/// Group release-eligible, non-partial files by their `pack_to` target, in
/// discovery order. Files without a target belong to no bundle.
fn synthesize_pack_table(working: &FileSet) -> PackTable {
    let mut table = PackTable::new();
    for (subpath, file) in working {
        let Some(pack_to) = &file.pack_to else { continue };
        if !file.release || file.is_partial || pack_to.is_empty() {
            continue;
        }
        table.entry(pack_to.clone()).or_default().push(subpath.clone());
    }
    table
}
