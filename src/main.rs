//! API doc generator - command-line tool producing Markdown API documents from annotated
//! Rust declarations.
//!
//! Every immediate subdirectory of the input directory is a package; each package with
//! at least one documented action gets one `<package>.md` in the output directory.
//!
//! # Usage
//!
//! ```bash
//! apidoc-from-source [OPTIONS] --out <DIR>
//! ```
//!
//! # Examples
//!
//! Document the packages of `./api`:
//! ```bash
//! apidoc-from-source --in ./api --out ./docs
//! ```
//!
//! Read `valid` markers and emit JSON:
//! ```bash
//! apidoc-from-source --in ./api --out ./docs -d valid -f json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! apidoc-from-source --in ./api --out ./docs -v
//! ```

use anyhow::Result;
use apidoc_from_source::cli;
use clap::Parser;
use log::info;

fn main() -> Result<()> {
    // Parse once for the verbose flag, validate after the logger is up
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("API doc generator starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("API document generation completed successfully");

    Ok(())
}
