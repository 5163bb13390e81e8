//! Serialization of package documents and atomic output writes.
//!
//! Markdown is produced by [`crate::renderer`]; this module adds machine-readable JSON
//! and YAML renditions of the same resolved data, and the file writer shared by all
//! formats.

use crate::error::Result;
use crate::orchestrator::PackageDoc;
use clap::ValueEnum;
use log::debug;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Markdown tables
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// File extension of generated documents.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

/// Serializes a package document to pretty-printed JSON.
pub fn serialize_json(doc: &PackageDoc) -> Result<String> {
    debug!("Serializing package {} to JSON", doc.name);
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Serializes a package document to YAML.
pub fn serialize_yaml(doc: &PackageDoc) -> Result<String> {
    debug!("Serializing package {} to YAML", doc.name);
    Ok(serde_yaml::to_string(doc)?)
}

/// Writes string content to a file, replacing it atomically.
///
/// The content goes to a temporary file next to `path` first and is renamed over the
/// target only once fully written, so a failed run never leaves a truncated document
/// behind. Parent directories are created if missing.
///
/// # Errors
///
/// Returns an error if the directory, the temporary file or the rename fails.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
