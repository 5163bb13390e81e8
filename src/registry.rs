use crate::annotation::{strip_leading_name, FieldDescriptor, TagGrammar, TypeRef};
use crate::error::Result;
use crate::parser::Declaration;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// One declared record with its documented fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    /// The type name, unique within a package
    pub name: String,
    /// Doc comment with a leading copy of the type name stripped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Documented fields in declaration order
    pub fields: Vec<FieldDescriptor>,
}

impl RecordType {
    /// Builds a record from a declaration, keeping only the fields `grammar` documents.
    pub fn from_declaration(declaration: &Declaration, grammar: &dyn TagGrammar) -> Result<Self> {
        let mut fields = Vec::with_capacity(declaration.fields.len());
        for field in &declaration.fields {
            if let Some(desc) = grammar.parse_field(field)? {
                fields.push(desc);
            }
        }

        Ok(Self {
            name: declaration.type_name.clone(),
            description: declaration
                .doc
                .as_deref()
                .and_then(|doc| strip_leading_name(doc, &declaration.type_name)),
            fields,
        })
    }
}

/// How a field's type text is matched against declared record names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Only whole identifiers of the type text match
    Exact,
    /// Exact first, then any record name contained in the type text
    #[default]
    Containment,
}

/// Type registry - the declared records of one package, in registration order
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<RecordType>,
    index: HashMap<String, usize>,
    strategy: MatchStrategy,
}

impl TypeRegistry {
    pub fn new(strategy: MatchStrategy) -> Self {
        Self {
            types: Vec::new(),
            index: HashMap::new(),
            strategy,
        }
    }

    /// Builds a registry from a package's declarations.
    pub fn from_declarations(
        declarations: &[Declaration],
        grammar: &dyn TagGrammar,
        strategy: MatchStrategy,
    ) -> Result<Self> {
        let mut registry = Self::new(strategy);
        for declaration in declarations {
            registry.register(RecordType::from_declaration(declaration, grammar)?);
        }
        debug!("Registered {} record types", registry.len());
        Ok(registry)
    }

    /// Adds a record. A second record with an already registered name is ignored.
    pub fn register(&mut self, record: RecordType) -> bool {
        if self.index.contains_key(&record.name) {
            warn!("Duplicate record type {}, keeping the first", record.name);
            return false;
        }
        self.index.insert(record.name.clone(), self.types.len());
        self.types.push(record);
        true
    }

    /// Looks a record up by its exact name.
    pub fn get(&self, name: &str) -> Option<&RecordType> {
        self.index.get(name).map(|&i| &self.types[i])
    }

    /// Finds the record a field type refers to.
    ///
    /// Whole identifiers of the type text are tried first (`Vec<Child>` names
    /// `Child`); under [`MatchStrategy::Containment`] any record name contained in
    /// the text is accepted next. Among several candidates the longest name wins, then
    /// the earliest registered. Opaque types never match.
    pub fn find(&self, type_ref: &TypeRef) -> Option<&RecordType> {
        let TypeRef::Named(text) = type_ref else {
            return None;
        };

        let identifiers: HashSet<&str> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|ident| !ident.is_empty())
            .collect();

        let exact = self
            .types
            .iter()
            .filter(|record| identifiers.contains(record.name.as_str()))
            .min_by_key(|record| Reverse(record.name.len()));

        if exact.is_some() || self.strategy == MatchStrategy::Exact {
            return exact;
        }

        let contained = self
            .types
            .iter()
            .filter(|record| text.contains(record.name.as_str()))
            .min_by_key(|record| Reverse(record.name.len()));
        if let Some(record) = contained {
            debug!("Type {} matched {} by containment", text, record.name);
        }
        contained
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
