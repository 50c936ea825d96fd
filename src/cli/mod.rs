//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod inspect;
mod release;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Packline - static asset release pipeline and resource map builder
#[derive(Parser)]
#[command(name = "pline")]
#[command(about = "Packline - compile, map, and package static assets")]
#[command(version)]
pub struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the release pipeline and write output files
    Release {
        /// Project root (defaults to the nearest ancestor holding a
        /// packline.toml)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Media (configuration overlay) to release under
        #[arg(short, long)]
        media: Option<String>,

        /// Override the configured output directory
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Release only these source paths instead of the full project
        files: Vec<PathBuf>,
    },

    /// Print the effective configuration for a media
    Inspect {
        /// Project root (defaults to the nearest ancestor holding a
        /// packline.toml)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Media (configuration overlay) to inspect
        #[arg(short, long)]
        media: Option<String>,
    },
}

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level().to_string().to_lowercase(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Release { root, media, dest, files } => {
            release::run_release(root.as_deref(), media.as_deref(), dest.as_deref(), &files)
        }
        Commands::Inspect { root, media } => {
            inspect::run_inspect(root.as_deref(), media.as_deref())
        }
    }
}
