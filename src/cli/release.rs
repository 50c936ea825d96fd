//! The `release` subcommand: run the pipeline and write output files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cli::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::compile::PassthroughCompiler;
use crate::config::{find_config, load_config, CONFIG_FILENAME};
use crate::release::{ReleaseOptions, ReleaseReport, Workspace};

pub(crate) fn run_release(
    root: Option<&Path>,
    media: Option<&str>,
    dest: Option<&Path>,
    files: &[PathBuf],
) -> ExitCode {
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

    let root = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let out = dest.map(Path::to_path_buf).unwrap_or_else(|| root.join(&config.project.out));

    if let Some(media) = media {
        if media != "dev" && !config.media.contains_key(media) {
            eprintln!("Error: media '{}' has no [media.{}] overlay", media, media);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    }

    let mut workspace = Workspace::new(config, root);
    if let Some(media) = media {
        workspace = workspace.with_media(media);
    }

    let opts = ReleaseOptions {
        src_cache: if files.is_empty() { None } else { Some(files.to_vec()) },
        ..Default::default()
    };

    let mut compiler = PassthroughCompiler;
    let report = match workspace.release(&mut compiler, opts) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match write_output(&report, &out) {
        Ok(written) => {
            println!(
                "released {} files ({} bundles, {} mapped resources) to {}",
                written,
                report.pack.len(),
                report.context.map.res.len(),
                out.display()
            );
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: failed to write output: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Write every released, non-partial file under the output directory.
fn write_output(report: &ReleaseReport, out: &Path) -> std::io::Result<usize> {
    let mut written = 0;
    for file in report.files.values() {
        if !file.release || file.is_partial {
            continue;
        }
        let target = out.join(file.subpath.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, file.content.as_bytes())?;
        written += 1;
    }
    Ok(written)
}
