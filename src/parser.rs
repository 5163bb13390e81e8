use crate::error::{Error, Result};
use log::{debug, warn};
use quote::ToTokens;
use std::fs;
use std::path::{Path, PathBuf};
use syn::visit::{self, Visit};

/// Declaration front end for Rust source files.
///
/// The `DeclarationParser` uses the `syn` crate to parse a source file and lists every
/// struct it declares, together with the raw annotation text of each field. Only the
/// attribute named by the configured tag token is captured: with the token `dcapi`, a
/// field written as `#[dcapi("req; alias:fid")] family_id: String` yields the
/// annotation `dcapi ("req; alias:fid")`.
///
/// # Example
///
/// ```no_run
/// use apidoc_from_source::parser::DeclarationParser;
/// use std::path::Path;
///
/// let parser = DeclarationParser::new("dcapi");
/// let declarations = parser.list_declarations(Path::new("api/family/demo_2000.rs")).unwrap();
/// println!("Found {} structs", declarations.len());
/// ```
#[derive(Debug, Clone)]
pub struct DeclarationParser {
    tag: String,
}

/// One declared struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// The struct identifier
    pub type_name: String,
    /// Joined `///` doc lines, if any
    pub doc: Option<String>,
    /// Path of the file declaring the struct
    pub source: PathBuf,
    /// Named fields in declaration order
    pub fields: Vec<DeclaredField>,
}

/// One named field of a declared struct, as written in source.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredField {
    /// The field identifier
    pub name: String,
    /// The field type rendered back to compact source text
    pub type_text: String,
    /// Whether the type contains a trait object or `impl Trait`
    pub opaque: bool,
    /// Raw text of the tag attribute, if the field carries one
    pub annotation: Option<String>,
    /// Joined `///` doc lines, if any
    pub doc: Option<String>,
}

impl DeclarationParser {
    /// Creates a parser capturing attributes named `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// The attribute name this parser captures.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Reads and parses one file, listing the structs it declares.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid Rust syntax.
    pub fn list_declarations(&self, path: &Path) -> Result<Vec<Declaration>> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| Error::ParseError {
            file: path.to_path_buf(),
            message: format!("Failed to read file: {}", e),
        })?;

        self.declarations_from_source(&content, path)
    }

    /// Parses source text that was already loaded from `path`.
    pub fn declarations_from_source(&self, content: &str, path: &Path) -> Result<Vec<Declaration>> {
        let syntax_tree = syn::parse_file(content).map_err(|e| Error::ParseError {
            file: path.to_path_buf(),
            message: format!("Failed to parse Rust syntax: {}", e),
        })?;

        let mut collector = StructCollector {
            parser: self,
            source: path,
            found: Vec::new(),
        };
        collector.visit_file(&syntax_tree);

        debug!(
            "Found {} structs in {}",
            collector.found.len(),
            path.display()
        );
        Ok(collector.found)
    }

    /// Parses several files, continuing past the ones that fail.
    ///
    /// Each failure is logged as a warning and returned in place, so the caller can
    /// record a diagnostic and keep the rest of the package.
    pub fn list_many(&self, paths: &[PathBuf]) -> Vec<Result<Vec<Declaration>>> {
        paths
            .iter()
            .map(|path| {
                let result = self.list_declarations(path);
                if let Err(e) = &result {
                    warn!("Failed to parse {}: {}", path.display(), e);
                }
                result
            })
            .collect()
    }

    fn declaration(&self, item: &syn::ItemStruct, source: &Path) -> Declaration {
        let fields = match &item.fields {
            syn::Fields::Named(named) => named
                .named
                .iter()
                .filter_map(|field| self.declared_field(field))
                .collect(),
            _ => Vec::new(),
        };

        Declaration {
            type_name: item.ident.to_string(),
            doc: doc_text(&item.attrs),
            source: source.to_path_buf(),
            fields,
        }
    }

    fn declared_field(&self, field: &syn::Field) -> Option<DeclaredField> {
        let name = field.ident.as_ref()?.to_string();
        let annotation = field
            .attrs
            .iter()
            .find(|attr| attr.path().is_ident(&self.tag))
            .map(annotation_text);

        Some(DeclaredField {
            name,
            type_text: type_text(&field.ty),
            opaque: is_opaque(&field.ty),
            annotation,
            doc: doc_text(&field.attrs),
        })
    }
}

struct StructCollector<'a> {
    parser: &'a DeclarationParser,
    source: &'a Path,
    found: Vec<Declaration>,
}

impl<'ast> Visit<'ast> for StructCollector<'_> {
    fn visit_item_struct(&mut self, item: &'ast syn::ItemStruct) {
        self.found.push(self.parser.declaration(item, self.source));
        visit::visit_item_struct(self, item);
    }

    // structs local to a function body are not part of the API surface
    fn visit_item_fn(&mut self, _item: &'ast syn::ItemFn) {}

    fn visit_impl_item_fn(&mut self, _item: &'ast syn::ImplItemFn) {}
}

#[derive(Default)]
struct OpaqueFinder {
    found: bool,
}

impl<'ast> Visit<'ast> for OpaqueFinder {
    fn visit_type_trait_object(&mut self, _node: &'ast syn::TypeTraitObject) {
        self.found = true;
    }

    fn visit_type_impl_trait(&mut self, _node: &'ast syn::TypeImplTrait) {
        self.found = true;
    }
}

/// Whether a type is open-ended (a trait object or `impl Trait` anywhere inside it).
pub fn is_opaque(ty: &syn::Type) -> bool {
    let mut finder = OpaqueFinder::default();
    finder.visit_type(ty);
    finder.found
}

/// Renders a type back to compact source text, e.g. `Option<Box<Node>>`.
pub fn type_text(ty: &syn::Type) -> String {
    compact_tokens(&ty.to_token_stream().to_string())
}

/// Drops the token spacing `proc_macro2` inserts, keeping a space only between two
/// words and after separators.
fn compact_tokens(raw: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '\'';
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            match out.chars().last() {
                Some(',') | Some(';') => out.push(' '),
                Some(prev) if is_word(prev) && is_word(ch) => out.push(' '),
                _ => {}
            }
            pending_space = false;
        }
        out.push(ch);
    }

    out
}

/// Raw text of a tag attribute. A plain string literal argument is unescaped, so
/// `#[dcapi("desc:say \"hi\"")]` reads `dcapi ("desc:say "hi"")`.
fn annotation_text(attr: &syn::Attribute) -> String {
    let path = attr.path().to_token_stream().to_string();
    match &attr.meta {
        syn::Meta::List(_) => match attr.parse_args::<syn::LitStr>() {
            Ok(lit) => format!("{} (\"{}\")", path, lit.value()),
            Err(_) => attr.meta.to_token_stream().to_string(),
        },
        syn::Meta::NameValue(syn::MetaNameValue {
            value:
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(lit),
                    ..
                }),
            ..
        }) => format!("{} = \"{}\"", path, lit.value()),
        _ => attr.meta.to_token_stream().to_string(),
    }
}

fn doc_text(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(syn::MetaNameValue {
                value:
                    syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(doc),
                        ..
                    }),
                ..
            }) => Some(doc.value().trim().to_string()),
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}
