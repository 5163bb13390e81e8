//! API doc generator - Markdown request/response documentation from annotated Rust
//! declarations.
//!
//! Record types are plain Rust structs whose fields carry a documentation attribute.
//! Two annotation dialects are understood:
//!
//! - **Api** (`#[dcapi("req; alias:fid; desc:file id; def:0")]`): each field names its
//!   side and may carry an alias, a description and a default value.
//! - **Valid** (`#[valid = "required"]`): fields are marked required or optional and
//!   the side comes from the type name (`LoginParams` / `LoginResp`).
//!
//! A type whose name holds exactly one numeric run (`Demo2000`) roots an action, provided
//! its file name carries an action id too (`demo_2000.rs`). Field types naming another
//! record of the same package pull that record in as a custom type table.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Lists packages and their candidate files
//! 2. [`parser`] - Extracts struct declarations and raw field annotations with `syn`
//! 3. [`annotation`] - Turns raw annotations into field descriptors, per dialect
//! 4. [`registry`] - Holds a package's record types and matches field types to them
//! 5. [`resolver`] - Builds an action's request/response fields and custom types
//! 6. [`renderer`] - Renders actions as Markdown tables
//! 7. [`orchestrator`] - Runs one parallel unit per package and writes the documents
//! 8. [`serializer`] - JSON / YAML output and atomic file writes
//!
//! # Example Usage
//!
//! ```no_run
//! use apidoc_from_source::orchestrator::{GeneratorConfig, PackageOrchestrator};
//! use std::path::Path;
//!
//! let orchestrator = PackageOrchestrator::new(GeneratorConfig::default());
//! let written = orchestrator.generate(Path::new("./api"), Path::new("./docs")).unwrap();
//! println!("Wrote {} documents", written.len());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod action_id;
pub mod annotation;
pub mod cli;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod registry;
pub mod renderer;
pub mod resolver;
pub mod scanner;
pub mod serializer;
