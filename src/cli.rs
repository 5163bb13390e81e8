use crate::annotation::{TagDialect, UnknownKeyPolicy};
use crate::orchestrator::{GeneratorConfig, PackageOrchestrator};
use crate::registry::MatchStrategy;
use crate::renderer::{CustomTypeLayout, DefaultPolicy};
use crate::serializer::OutputFormat;
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// API doc generator - Markdown request/response tables from annotated Rust declarations
#[derive(Parser, Debug)]
#[command(name = "apidoc-from-source")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Root directory; every immediate subdirectory is one package
    #[arg(short = 'i', long = "in", value_name = "DIR", default_value = ".")]
    pub input: PathBuf,

    /// Directory receiving one document per package
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub output: PathBuf,

    /// Annotation dialect of the declarations
    #[arg(short = 'd', long = "dialect", value_enum, default_value = "api")]
    pub dialect: TagDialect,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "markdown")]
    pub format: OutputFormat,

    /// Where custom type tables go
    #[arg(short = 'l', long = "layout", value_enum, default_value = "per-side")]
    pub layout: CustomTypeLayout,

    /// Attribute name to read instead of the dialect's own
    #[arg(long = "tag", value_name = "TOKEN")]
    pub tag: Option<String>,

    /// Fail on unknown annotation keys instead of ignoring them
    #[arg(long = "strict-keys")]
    pub strict_keys: bool,

    /// Fail on default values that cannot be rendered instead of showing a placeholder
    #[arg(long = "strict-defaults")]
    pub strict_defaults: bool,

    /// Match field types to custom types by whole identifiers only
    #[arg(long = "exact-types")]
    pub exact_types: bool,

    /// Emit a minimal action for action files that declare no root type
    #[arg(long = "placeholders")]
    pub placeholders: bool,

    /// Abort the run after this many seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl CliArgs {
    /// The generator settings the flags describe.
    pub fn config(&self) -> GeneratorConfig {
        GeneratorConfig {
            dialect: self.dialect,
            tag: self.tag.clone(),
            unknown_keys: if self.strict_keys {
                UnknownKeyPolicy::Reject
            } else {
                UnknownKeyPolicy::Ignore
            },
            match_strategy: if self.exact_types {
                MatchStrategy::Exact
            } else {
                MatchStrategy::Containment
            },
            layout: self.layout,
            default_policy: if self.strict_defaults {
                DefaultPolicy::Strict
            } else {
                DefaultPolicy::Degrade
            },
            format: self.format,
            placeholders: self.placeholders,
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.input.exists() {
        anyhow::bail!("Input path does not exist: {}", args.input.display());
    }

    if !args.input.is_dir() {
        anyhow::bail!("Input path is not a directory: {}", args.input.display());
    }

    if args.output.exists() && !args.output.is_dir() {
        anyhow::bail!("Output path is not a directory: {}", args.output.display());
    }

    if !args.output.exists() {
        fs::create_dir_all(&args.output).with_context(|| {
            format!("Failed to create output directory {}", args.output.display())
        })?;
        info!("Created output directory: {}", args.output.display());
    }

    info!("Input directory: {}", args.input.display());
    info!("Output directory: {}", args.output.display());
    info!("Dialect: {:?}", args.dialect);
    info!("Output format: {:?}", args.format);
    if let Some(ref tag) = args.tag {
        info!("Annotation tag: {}", tag);
    }
    if let Some(timeout) = args.timeout {
        info!("Timeout: {}s", timeout);
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting API document generation...");

    let orchestrator = PackageOrchestrator::new(args.config());
    let written = orchestrator
        .generate(&args.input, &args.output)
        .context("Document generation failed")?;

    if written.is_empty() {
        warn!("No documented actions found under {}", args.input.display());
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Documents written: {}", written.len());
    for path in &written {
        info!("  - {}", path.display());
    }

    Ok(())
}
