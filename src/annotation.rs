//! Field annotation parsing.
//!
//! Two tag grammars are supported, selected through [`TagDialect`]:
//!
//! - [`TagDialect::Api`] (`#[dcapi("req; alias:fid; def:0; desc:...")]`): every
//!   documented field names its own side with `req` or `resp`, followed by optional
//!   `key:value` clauses separated by `;`.
//! - [`TagDialect::Valid`] (`#[valid = "required"]`): comma-separated `required` /
//!   `optional` markers. The side comes from the owning root type's name instead
//!   (`...Params` is a request, `...Resp` a response), and untagged fields are
//!   documented too.
//!
//! In both grammars an annotation containing `skip`, or a bare `-`, hides the field.

use crate::action_id::extract_action_id;
use crate::error::{Error, Result};
use crate::parser::DeclaredField;
use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

/// Which side of an action a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classifier {
    Request,
    Response,
}

impl Classifier {
    /// Section title used in rendered documents.
    pub fn label(self) -> &'static str {
        match self {
            Classifier::Request => "请求",
            Classifier::Response => "响应",
        }
    }
}

/// A field's value type as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum TypeRef {
    /// A concrete type that may name another declared record
    Named(String),
    /// A trait object or `impl Trait`; never resolved structurally
    Opaque(String),
}

impl TypeRef {
    pub fn text(&self) -> &str {
        match self {
            TypeRef::Named(text) | TypeRef::Opaque(text) => text,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, TypeRef::Opaque(_))
    }
}

/// A parsed `def:` literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A literal of a kind tables cannot show (char, byte, byte string, ...)
    Unsupported(String),
}

impl DefaultValue {
    /// Interprets the text after `def:`.
    ///
    /// Rust literal syntax decides the kind; text that is not a literal at all, like
    /// `rid123456`, is kept as a plain string.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(magnitude) = text.strip_prefix('-') {
            if magnitude.starts_with('-') {
                return DefaultValue::Str(text.to_string());
            }
            return match Self::parse(magnitude) {
                DefaultValue::Int(n) => DefaultValue::Int(-n),
                DefaultValue::Float(f) => DefaultValue::Float(-f),
                _ => DefaultValue::Str(text.to_string()),
            };
        }

        match syn::parse_str::<syn::Lit>(text) {
            Ok(syn::Lit::Str(s)) => DefaultValue::Str(s.value()),
            Ok(syn::Lit::Bool(b)) => DefaultValue::Bool(b.value),
            // out of i64 range: shown as written
            Ok(syn::Lit::Int(i)) => match i.base10_parse::<i64>() {
                Ok(n) => DefaultValue::Int(n),
                Err(_) => DefaultValue::Str(text.to_string()),
            },
            Ok(syn::Lit::Float(f)) => match f.base10_parse::<f64>() {
                Ok(n) => DefaultValue::Float(n),
                Err(_) => DefaultValue::Unsupported(text.to_string()),
            },
            Ok(_) => DefaultValue::Unsupported(text.to_string()),
            Err(_) => DefaultValue::Str(text.to_string()),
        }
    }
}

/// One documented field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Declared field identifier
    pub name: String,
    /// Display name, never empty
    pub alias: String,
    pub value_type: TypeRef,
    /// `None` when the side is inherited from the owning root type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<Classifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<DefaultValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Only set by grammars with `required` / `optional` markers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl FieldDescriptor {
    /// A bare descriptor for a field, before any annotation is applied.
    pub fn new(name: impl Into<String>, value_type: TypeRef) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            value_type,
            classifier: None,
            default_value: None,
            description: None,
            required: None,
        }
    }

    fn from_declared(field: &DeclaredField) -> Self {
        let value_type = if field.opaque {
            TypeRef::Opaque(field.type_text.clone())
        } else {
            TypeRef::Named(field.type_text.clone())
        };
        let mut desc = Self::new(field.name.clone(), value_type);
        desc.alias.clear();
        desc
    }

    fn finish(&mut self, field: &DeclaredField) {
        if self.alias.is_empty() {
            self.alias = self.name.clone();
        }
        if self.description.is_none() {
            self.description = field
                .doc
                .as_deref()
                .and_then(|doc| strip_leading_name(doc, &self.name));
        }
    }
}

/// What to do with annotation keys a grammar does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownKeyPolicy {
    #[default]
    Ignore,
    Reject,
}

impl UnknownKeyPolicy {
    fn check(self, field: &str, key: &str) -> Result<()> {
        match self {
            UnknownKeyPolicy::Ignore => {
                debug!("Ignoring unknown annotation key '{}' on {}", key, field);
                Ok(())
            }
            UnknownKeyPolicy::Reject => Err(Error::UnknownAnnotationKey {
                field: field.to_string(),
                key: key.to_string(),
            }),
        }
    }
}

/// Supported annotation dialects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum TagDialect {
    /// `req` / `resp` with `alias`, `desc` and `def` keys
    #[default]
    Api,
    /// `required` / `optional` markers, side taken from the type name
    Valid,
}

impl TagDialect {
    /// Attribute name the dialect is written in.
    pub fn default_tag(self) -> &'static str {
        match self {
            TagDialect::Api => "dcapi",
            TagDialect::Valid => "valid",
        }
    }

    /// Whether rendered tables show a required column instead of defaults.
    pub fn has_required_marker(self) -> bool {
        matches!(self, TagDialect::Valid)
    }

    pub fn grammar(self, policy: UnknownKeyPolicy) -> Box<dyn TagGrammar> {
        match self {
            TagDialect::Api => Box::new(ApiGrammar { policy }),
            TagDialect::Valid => Box::new(ValidGrammar { policy }),
        }
    }
}

/// A tag language: how raw annotations become field descriptors, and which records
/// root an action.
pub trait TagGrammar: Send + Sync {
    fn dialect(&self) -> TagDialect;

    /// Applies the quoted annotation content to `desc`.
    ///
    /// Returns `Ok(false)` when the annotation does not document the field.
    fn apply(&self, content: &str, desc: &mut FieldDescriptor) -> Result<bool>;

    /// Prepares a field that carries no annotation; `false` drops it.
    fn untagged(&self, desc: &mut FieldDescriptor) -> bool;

    /// The side implied by a record's own name, if the grammar uses one.
    fn root_classifier(&self, type_name: &str) -> Option<Classifier>;

    /// The action id of a record able to root an action.
    fn action_id(&self, type_name: &str, file_action_id: Option<&str>) -> Option<String>;

    /// Parses one declared field, or `None` when it is not documented.
    ///
    /// # Errors
    ///
    /// Only fails under [`UnknownKeyPolicy::Reject`]; malformed annotations are dropped.
    fn parse_field(&self, field: &DeclaredField) -> Result<Option<FieldDescriptor>> {
        let mut desc = FieldDescriptor::from_declared(field);

        match field.annotation.as_deref() {
            None => {
                if !self.untagged(&mut desc) {
                    return Ok(None);
                }
            }
            Some(raw) => {
                if is_skipped(raw) {
                    debug!("Field {} is skipped by its annotation", field.name);
                    return Ok(None);
                }
                let Some(content) = quoted_content(raw) else {
                    debug!("Field {} has an unquoted annotation: {}", field.name, raw);
                    return Ok(None);
                };
                if !self.apply(content, &mut desc)? {
                    debug!("Field {} has no classifier, dropped", field.name);
                    return Ok(None);
                }
            }
        }

        desc.finish(field);
        Ok(Some(desc))
    }
}

/// `req` / `resp` grammar with `key:value` clauses.
#[derive(Debug, Clone, Default)]
pub struct ApiGrammar {
    pub policy: UnknownKeyPolicy,
}

impl ApiGrammar {
    fn classifier(clauses: &[&str]) -> Option<Classifier> {
        let exact = clauses.iter().find_map(|clause| match *clause {
            "req" => Some(Classifier::Request),
            "resp" => Some(Classifier::Response),
            _ => None,
        });

        exact.or_else(|| {
            clauses
                .iter()
                .filter(|clause| !clause.contains(':'))
                .find_map(|clause| {
                    if clause.contains("resp") {
                        Some(Classifier::Response)
                    } else if clause.contains("req") {
                        Some(Classifier::Request)
                    } else {
                        None
                    }
                })
        })
    }
}

impl TagGrammar for ApiGrammar {
    fn dialect(&self) -> TagDialect {
        TagDialect::Api
    }

    fn apply(&self, content: &str, desc: &mut FieldDescriptor) -> Result<bool> {
        let clauses: Vec<&str> = content
            .split(';')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .collect();

        let Some(classifier) = Self::classifier(&clauses) else {
            return Ok(false);
        };
        desc.classifier = Some(classifier);

        for clause in clauses {
            let Some((key, value)) = clause.split_once(':') else {
                if !clause.contains("req") && !clause.contains("resp") {
                    self.policy.check(&desc.name, clause)?;
                }
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "alias" => desc.alias = value.to_string(),
                "desc" => desc.description = non_empty(value),
                "def" => desc.default_value = Some(DefaultValue::parse(value)),
                other => self.policy.check(&desc.name, other)?,
            }
        }

        Ok(true)
    }

    fn untagged(&self, _desc: &mut FieldDescriptor) -> bool {
        false
    }

    fn root_classifier(&self, _type_name: &str) -> Option<Classifier> {
        None
    }

    fn action_id(&self, type_name: &str, _file_action_id: Option<&str>) -> Option<String> {
        extract_action_id(type_name)
    }
}

/// `required` / `optional` marker grammar.
#[derive(Debug, Clone, Default)]
pub struct ValidGrammar {
    pub policy: UnknownKeyPolicy,
}

impl TagGrammar for ValidGrammar {
    fn dialect(&self) -> TagDialect {
        TagDialect::Valid
    }

    fn apply(&self, content: &str, desc: &mut FieldDescriptor) -> Result<bool> {
        desc.required = Some(false);
        for marker in content.split(',').map(str::trim).filter(|m| !m.is_empty()) {
            match marker {
                "required" => desc.required = Some(true),
                "optional" => desc.required = Some(false),
                other => self.policy.check(&desc.name, other)?,
            }
        }
        Ok(true)
    }

    fn untagged(&self, desc: &mut FieldDescriptor) -> bool {
        desc.required = Some(false);
        true
    }

    fn root_classifier(&self, type_name: &str) -> Option<Classifier> {
        if type_name.len() > "Params".len() && type_name.ends_with("Params") {
            Some(Classifier::Request)
        } else if type_name.len() > "Resp".len() && type_name.ends_with("Resp") {
            Some(Classifier::Response)
        } else {
            None
        }
    }

    fn action_id(&self, type_name: &str, file_action_id: Option<&str>) -> Option<String> {
        self.root_classifier(type_name)?;
        extract_action_id(type_name).or_else(|| file_action_id.map(str::to_string))
    }
}

/// Whether an annotation hides its field: it mentions `skip`, or its content (or one
/// of its clauses) is a bare `-`.
pub fn is_skipped(raw: &str) -> bool {
    if raw.contains("skip") {
        return true;
    }
    let content = quoted_content(raw).unwrap_or(raw).trim();
    content == "-"
        || content
            .split([';', ','])
            .any(|clause| clause.trim() == "-")
}

/// The text between the first and the last double quote of an annotation.
pub fn quoted_content(raw: &str) -> Option<&str> {
    let start = raw.find('"')?;
    let end = raw.rfind('"')?;
    if end > start {
        Some(&raw[start + 1..end])
    } else {
        None
    }
}

/// Strips a leading copy of `name` from a doc comment (`"Child child info"` documents
/// `Child` as `"child info"`).
pub fn strip_leading_name(doc: &str, name: &str) -> Option<String> {
    let doc = doc.trim();
    let stripped = match doc.strip_prefix(name) {
        Some(rest) if !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') => {
            rest.trim_start()
        }
        _ => doc,
    };
    non_empty(stripped)
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, type_text: &str, annotation: Option<&str>) -> DeclaredField {
        DeclaredField {
            name: name.to_string(),
            type_text: type_text.to_string(),
            opaque: false,
            annotation: annotation.map(str::to_string),
            doc: None,
        }
    }

    fn api() -> ApiGrammar {
        ApiGrammar::default()
    }

    #[test]
    fn test_req_with_alias() {
        let f = field("FamilyID", "String", Some(r#"dcapi ("req; alias:fid")"#));
        let desc = api().parse_field(&f).unwrap().unwrap();

        assert_eq!(desc.alias, "fid");
        assert_eq!(desc.classifier, Some(Classifier::Request));
        assert_eq!(desc.value_type, TypeRef::Named("String".to_string()));
        assert!(desc.required.is_none());
    }

    #[test]
    fn test_resp_keys() {
        let f = field(
            "Sex",
            "i32",
            Some(r#"dcapi ("resp; def:0; desc:gender code; color:red")"#),
        );
        let desc = api().parse_field(&f).unwrap().unwrap();

        assert_eq!(desc.classifier, Some(Classifier::Response));
        assert_eq!(desc.alias, "Sex");
        assert_eq!(desc.default_value, Some(DefaultValue::Int(0)));
        assert_eq!(desc.description.as_deref(), Some("gender code"));
    }

    #[test]
    fn test_missing_classifier_is_dropped() {
        let f = field("Name", "String", Some(r#"dcapi ("alias:n; desc:name")"#));
        assert!(api().parse_field(&f).unwrap().is_none());

        let untagged = field("Name", "String", None);
        assert!(api().parse_field(&untagged).unwrap().is_none());
    }

    #[test]
    fn test_skip_markers_win() {
        let annotations = [
            r#"dcapi ("req; skip")"#,
            r#"dcapi ("-")"#,
            r#"dcapi ("resp; - ; alias:x")"#,
        ];
        for annotation in annotations {
            let f = field("ID", "String", Some(annotation));
            assert!(api().parse_field(&f).unwrap().is_none(), "{}", annotation);
            assert!(ValidGrammar::default().parse_field(&f).unwrap().is_none());
        }
    }

    #[test]
    fn test_hyphen_inside_value_is_not_bare() {
        let f = field("Offset", "i64", Some(r#"dcapi ("req; def:-1")"#));
        let desc = api().parse_field(&f).unwrap().unwrap();
        assert_eq!(desc.default_value, Some(DefaultValue::Int(-1)));
    }

    #[test]
    fn test_unquoted_annotation_is_dropped() {
        let f = field("ID", "String", Some("dcapi (req)"));
        assert!(api().parse_field(&f).unwrap().is_none());
    }

    #[test]
    fn test_reject_policy() {
        let grammar = ApiGrammar {
            policy: UnknownKeyPolicy::Reject,
        };
        let f = field("ID", "String", Some(r#"dcapi ("req; color:red")"#));

        match grammar.parse_field(&f) {
            Err(Error::UnknownAnnotationKey { field, key }) => {
                assert_eq!(field, "ID");
                assert_eq!(key, "color");
            }
            other => panic!("Expected unknown key error, got {:?}", other),
        }

        let known = field("ID", "String", Some(r#"dcapi ("req; alias:id; def:1")"#));
        assert!(grammar.parse_field(&known).unwrap().is_some());
    }

    #[test]
    fn test_doc_fallback_strips_name() {
        let mut f = field("DeviceOS", "String", Some(r#"valid = "required""#));
        f.doc = Some("DeviceOS doc".to_string());
        let desc = ValidGrammar::default().parse_field(&f).unwrap().unwrap();

        assert_eq!(desc.description.as_deref(), Some("doc"));
        assert_eq!(desc.required, Some(true));
        assert!(desc.classifier.is_none());
    }

    #[test]
    fn test_desc_key_beats_doc() {
        let mut f = field("ID", "String", Some(r#"dcapi ("req; desc:from tag")"#));
        f.doc = Some("from doc".to_string());
        let desc = api().parse_field(&f).unwrap().unwrap();
        assert_eq!(desc.description.as_deref(), Some("from tag"));
    }

    #[test]
    fn test_valid_untagged_fields_are_kept() {
        let f = field("SystemTime", "i64", None);
        let desc = ValidGrammar::default().parse_field(&f).unwrap().unwrap();
        assert_eq!(desc.required, Some(false));
        assert_eq!(desc.alias, "SystemTime");
    }

    #[test]
    fn test_opaque_type_ref() {
        let mut f = field("MiracleTrigger", "Box<dyn Any>", Some(r#"dcapi ("resp;alias:mt;")"#));
        f.opaque = true;
        let desc = api().parse_field(&f).unwrap().unwrap();
        assert!(desc.value_type.is_opaque());
        assert_eq!(desc.alias, "mt");
    }

    #[test]
    fn test_root_classifier_by_suffix() {
        let grammar = ValidGrammar::default();
        assert_eq!(grammar.root_classifier("LoginParams"), Some(Classifier::Request));
        assert_eq!(grammar.root_classifier("LoginResp"), Some(Classifier::Response));
        assert_eq!(grammar.root_classifier("Role"), None);
        assert_eq!(grammar.root_classifier("Resp"), None);

        assert_eq!(
            grammar.action_id("LoginParams", Some("10002")),
            Some("10002".to_string())
        );
        assert_eq!(grammar.action_id("Role", Some("10002")), None);
        assert_eq!(api().action_id("Demo2000", None), Some("2000".to_string()));
        assert_eq!(api().action_id("Child", Some("2000")), None);
    }

    #[test]
    fn test_default_value_kinds() {
        assert_eq!(DefaultValue::parse("rid123456"), DefaultValue::Str("rid123456".to_string()));
        assert_eq!(DefaultValue::parse("\"quoted\""), DefaultValue::Str("quoted".to_string()));
        assert_eq!(DefaultValue::parse("1.5"), DefaultValue::Float(1.5));
        assert_eq!(DefaultValue::parse("true"), DefaultValue::Bool(true));
        assert_eq!(DefaultValue::parse(""), DefaultValue::Str(String::new()));
        assert_eq!(DefaultValue::parse("'m'"), DefaultValue::Unsupported("'m'".to_string()));
        assert_eq!(DefaultValue::parse("-7"), DefaultValue::Int(-7));
        assert_eq!(
            DefaultValue::parse("18446744073709551615"),
            DefaultValue::Str("18446744073709551615".to_string())
        );
        assert_eq!(
            DefaultValue::parse("-9223372036854775809"),
            DefaultValue::Str("-9223372036854775809".to_string())
        );
        assert_eq!(DefaultValue::parse("--1"), DefaultValue::Str("--1".to_string()));
    }

    #[test]
    fn test_strip_leading_name_needs_word_boundary() {
        assert_eq!(strip_leading_name("Id of the row", "Id"), Some("of the row".to_string()));
        assert_eq!(
            strip_leading_name("Identifier of the row", "Id"),
            Some("Identifier of the row".to_string())
        );
        assert_eq!(strip_leading_name("Child", "Child"), None);
    }
}
