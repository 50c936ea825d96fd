//! Packline - command-line tool for releasing static asset projects

use std::process::ExitCode;

use packline::cli;

fn main() -> ExitCode {
    cli::run()
}
