//! aeroctl entry point
//!
//! This is a minimal entrypoint that:
//! 1. Hands the built-in command modules to the CLI (via cli::run)
//! 2. Prints errors to stderr
//! 3. Exits with non-zero on failure
//!
//! All logic is delegated to the CLI module.

use aeroctl::{cli, commands};

fn main() {
    if let Err(e) = cli::run(commands::default_modules()) {
        eprintln!("{}", e.report());
        std::process::exit(e.exit_code());
    }
}
