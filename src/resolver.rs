use crate::annotation::{Classifier, FieldDescriptor, TagGrammar, TypeRef};
use crate::error::{Error, Result};
use crate::registry::{RecordType, TypeRegistry};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The resolved documentation of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDoc {
    /// Numeric id, unique within a package
    pub action_id: String,
    pub action_description: String,
    pub request_fields: Vec<FieldDescriptor>,
    pub response_fields: Vec<FieldDescriptor>,
    /// Custom types reached from request fields, in discovery order
    pub request_types: Vec<RecordType>,
    /// Custom types reached from response fields, in discovery order
    pub response_types: Vec<RecordType>,
}

impl ActionDoc {
    pub fn new(action_id: impl Into<String>, action_description: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            action_description: action_description.into(),
            request_fields: Vec::new(),
            response_fields: Vec::new(),
            request_types: Vec::new(),
            response_types: Vec::new(),
        }
    }

    /// A minimal stand-in for an action whose file declares no root records:
    /// a `rid` request field and a `status` / `info` response pair.
    pub fn placeholder(action_id: impl Into<String>) -> Self {
        let mut doc = Self::new(action_id, "");
        doc.request_fields = vec![placeholder_field("rid", "String", Classifier::Request)];
        doc.response_fields = vec![
            placeholder_field("status", "i32", Classifier::Response),
            placeholder_field("info", "String", Classifier::Response),
        ];
        doc
    }

    /// Whether neither side documents anything.
    pub fn is_empty(&self) -> bool {
        self.request_fields.is_empty() && self.response_fields.is_empty()
    }

    pub fn fields(&self, side: Classifier) -> &[FieldDescriptor] {
        match side {
            Classifier::Request => &self.request_fields,
            Classifier::Response => &self.response_fields,
        }
    }

    pub fn types(&self, side: Classifier) -> &[RecordType] {
        match side {
            Classifier::Request => &self.request_types,
            Classifier::Response => &self.response_types,
        }
    }
}

fn placeholder_field(name: &str, type_text: &str, side: Classifier) -> FieldDescriptor {
    let mut field = FieldDescriptor::new(name, TypeRef::Named(type_text.to_string()));
    field.classifier = Some(side);
    field
}

/// Turns a root record into an [`ActionDoc`], pulling in every custom type its
/// documented fields reach.
pub struct ActionResolver<'a> {
    registry: &'a TypeRegistry,
    grammar: &'a dyn TagGrammar,
}

/// Per-side state of one resolution.
struct SideWalk {
    side: Classifier,
    /// Types already documented on this side
    seen: HashSet<String>,
    /// Types being expanded, root first
    ancestors: Vec<String>,
    found: Vec<RecordType>,
}

impl SideWalk {
    fn new(side: Classifier, root: &str) -> Self {
        Self {
            side,
            seen: HashSet::from([root.to_string()]),
            ancestors: vec![root.to_string()],
            found: Vec::new(),
        }
    }
}

impl<'a> ActionResolver<'a> {
    pub fn new(registry: &'a TypeRegistry, grammar: &'a dyn TagGrammar) -> Self {
        Self { registry, grammar }
    }

    /// Resolves the action rooted at `root_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ActionNotFound`] if no record is named `root_name`.
    pub fn resolve(&self, action_id: &str, root_name: &str) -> Result<ActionDoc> {
        debug!("Resolving action {} from {}", action_id, root_name);

        let root = self.registry.get(root_name).ok_or_else(|| Error::ActionNotFound {
            action_id: action_id.to_string(),
            root: root_name.to_string(),
        })?;
        let root_side = self.grammar.root_classifier(&root.name);

        let mut doc = ActionDoc::new(action_id, root.description.clone().unwrap_or_default());
        let mut request = SideWalk::new(Classifier::Request, &root.name);
        let mut response = SideWalk::new(Classifier::Response, &root.name);

        for field in &root.fields {
            let walk = match field.classifier.or(root_side) {
                Some(Classifier::Request) => {
                    doc.request_fields.push(field.clone());
                    &mut request
                }
                Some(Classifier::Response) => {
                    doc.response_fields.push(field.clone());
                    &mut response
                }
                None => continue,
            };
            self.collect(walk, field);
        }

        doc.request_types = request.found;
        doc.response_types = response.found;

        debug!(
            "Action {}: {} request fields, {} response fields, {} custom types",
            action_id,
            doc.request_fields.len(),
            doc.response_fields.len(),
            doc.request_types.len() + doc.response_types.len()
        );
        Ok(doc)
    }

    /// Joins the request half and the response half of one action.
    pub fn merge(request: ActionDoc, response: ActionDoc) -> ActionDoc {
        let action_description = if request.action_description.is_empty() {
            response.action_description
        } else {
            request.action_description
        };

        ActionDoc {
            action_id: request.action_id,
            action_description,
            request_fields: request.request_fields,
            response_fields: response.response_fields,
            request_types: request.request_types,
            response_types: response.response_types,
        }
    }

    fn collect(&self, walk: &mut SideWalk, field: &FieldDescriptor) {
        let Some(record) = self.registry.find(&field.value_type) else {
            return;
        };

        if walk.ancestors.contains(&record.name) {
            debug!(
                "Cycle through {} ({}), not expanding again",
                record.name,
                walk.ancestors.join(" -> ")
            );
            return;
        }
        if !walk.seen.insert(record.name.clone()) {
            return;
        }

        let side = walk.side;
        let fields: Vec<FieldDescriptor> = record
            .fields
            .iter()
            .filter(|f| f.classifier.map_or(true, |c| c == side))
            .cloned()
            .collect();

        walk.found.push(RecordType {
            name: record.name.clone(),
            description: record.description.clone(),
            fields: fields.clone(),
        });

        walk.ancestors.push(record.name.clone());
        for nested in &fields {
            self.collect(walk, nested);
        }
        walk.ancestors.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{ApiGrammar, ValidGrammar};
    use crate::parser::DeclarationParser;
    use crate::registry::MatchStrategy;
    use std::path::Path;

    fn registry_from(tag: &str, grammar: &dyn TagGrammar, code: &str) -> TypeRegistry {
        let declarations = DeclarationParser::new(tag)
            .declarations_from_source(code, Path::new("demo_2000.rs"))
            .unwrap();
        TypeRegistry::from_declarations(&declarations, grammar, MatchStrategy::default()).unwrap()
    }

    fn names(fields: &[FieldDescriptor]) -> Vec<&str> {
        fields.iter().map(|f| f.alias.as_str()).collect()
    }

    fn type_names(types: &[RecordType]) -> Vec<&str> {
        types.iter().map(|t| t.name.as_str()).collect()
    }

    const DEMO: &str = r#"
        /// Demo2000 specify inner struct
        pub struct Demo2000 {
            #[dcapi("req; alias:fid")]
            pub FamilyID: String,
            #[dcapi("resp; ")]
            pub FID: Vec<i32>,
            #[dcapi("resp")]
            pub ChildInfo: Child,
            #[dcapi("resp;alias:mt;")]
            pub MiracleTrigger: Box<dyn std::any::Any>,
        }

        /// Child child info
        pub struct Child {
            #[dcapi("resp")]
            pub CID: String,
            #[dcapi("resp")]
            pub Name: String,
            #[dcapi("resp")]
            pub YearOld: Age,
            #[dcapi("req")]
            pub RequestOnly: String,
        }

        pub struct Age {
            #[dcapi("resp")]
            pub Year: String,
        }
    "#;

    #[test]
    fn test_resolve_nested_action() {
        let grammar = ApiGrammar::default();
        let registry = registry_from("dcapi", &grammar, DEMO);
        let doc = ActionResolver::new(&registry, &grammar)
            .resolve("2000", "Demo2000")
            .unwrap();

        assert_eq!(doc.action_id, "2000");
        assert_eq!(doc.action_description, "specify inner struct");
        assert_eq!(names(&doc.request_fields), vec!["fid"]);
        assert_eq!(names(&doc.response_fields), vec!["FID", "ChildInfo", "mt"]);
        assert!(doc.request_types.is_empty());
        assert_eq!(type_names(&doc.response_types), vec!["Child", "Age"]);

        let child = &doc.response_types[0];
        assert_eq!(names(&child.fields), vec!["CID", "Name", "YearOld"]);
    }

    #[test]
    fn test_missing_root() {
        let grammar = ApiGrammar::default();
        let registry = registry_from("dcapi", &grammar, DEMO);
        let result = ActionResolver::new(&registry, &grammar).resolve("3000", "Demo3000");

        assert!(matches!(result, Err(Error::ActionNotFound { .. })));
    }

    #[test]
    fn test_mutual_cycle_terminates() {
        let code = r#"
            pub struct Demo1 {
                #[dcapi("resp")]
                pub a: A,
            }
            pub struct A {
                #[dcapi("resp")]
                pub b: Option<B>,
            }
            pub struct B {
                #[dcapi("resp")]
                pub a: Vec<A>,
            }
        "#;
        let grammar = ApiGrammar::default();
        let registry = registry_from("dcapi", &grammar, code);
        let doc = ActionResolver::new(&registry, &grammar)
            .resolve("1", "Demo1")
            .unwrap();

        assert_eq!(type_names(&doc.response_types), vec!["A", "B"]);
    }

    #[test]
    fn test_self_reference_excludes_root() {
        let code = r#"
            pub struct Node1 {
                #[dcapi("resp")]
                pub next: Option<Box<Node1>>,
                #[dcapi("req")]
                pub parent: Node1,
            }
        "#;
        let grammar = ApiGrammar::default();
        let registry = registry_from("dcapi", &grammar, code);
        let doc = ActionResolver::new(&registry, &grammar)
            .resolve("1", "Node1")
            .unwrap();

        assert_eq!(doc.response_fields.len(), 1);
        assert_eq!(doc.request_fields.len(), 1);
        assert!(doc.request_types.is_empty());
        assert!(doc.response_types.is_empty());
    }

    #[test]
    fn test_shared_type_listed_once_per_side() {
        let code = r#"
            pub struct Demo5 {
                #[dcapi("req")]
                pub first: Tag,
                #[dcapi("req")]
                pub second: Vec<Tag>,
                #[dcapi("resp")]
                pub echoed: Tag,
            }
            pub struct Tag {
                #[dcapi("req")]
                pub label: String,
                #[dcapi("resp")]
                pub color: String,
            }
        "#;
        let grammar = ApiGrammar::default();
        let registry = registry_from("dcapi", &grammar, code);
        let doc = ActionResolver::new(&registry, &grammar)
            .resolve("5", "Demo5")
            .unwrap();

        assert_eq!(type_names(&doc.request_types), vec!["Tag"]);
        assert_eq!(type_names(&doc.response_types), vec!["Tag"]);
        assert_eq!(names(&doc.request_types[0].fields), vec!["label"]);
        assert_eq!(names(&doc.response_types[0].fields), vec!["color"]);
    }

    #[test]
    fn test_valid_dialect_inherits_side_and_merges() {
        let code = r#"
            /// LoginParams demo login
            pub struct LoginParams {
                /// jwt doc
                #[valid = "required"]
                pub Jwt: String,
                #[valid(skip)]
                pub Internal: String,
            }

            /// LoginResp login
            pub struct LoginResp {
                pub Role: Role,
                pub SystemTime: i64,
            }

            /// Role Doc
            pub struct Role {
                /// role name
                pub Name: String,
            }

            pub struct Unrelated {
                pub x: u8,
            }
        "#;
        let grammar = ValidGrammar::default();
        let registry = registry_from("valid", &grammar, code);
        let resolver = ActionResolver::new(&registry, &grammar);

        let request = resolver.resolve("9999", "LoginParams").unwrap();
        let response = resolver.resolve("9999", "LoginResp").unwrap();
        assert!(request.response_fields.is_empty());
        assert!(response.request_fields.is_empty());

        let doc = ActionResolver::merge(request, response);
        assert_eq!(doc.action_description, "demo login");
        assert_eq!(names(&doc.request_fields), vec!["Jwt"]);
        assert_eq!(doc.request_fields[0].required, Some(true));
        assert_eq!(doc.request_fields[0].description.as_deref(), Some("jwt doc"));
        assert_eq!(names(&doc.response_fields), vec!["Role", "SystemTime"]);
        assert_eq!(type_names(&doc.response_types), vec!["Role"]);

        let unrelated = resolver.resolve("1", "Unrelated").unwrap();
        assert!(unrelated.is_empty());
    }

    #[test]
    fn test_placeholder_shape() {
        let doc = ActionDoc::placeholder("42");
        assert_eq!(names(doc.fields(Classifier::Request)), vec!["rid"]);
        assert_eq!(names(doc.fields(Classifier::Response)), vec!["status", "info"]);
        assert!(doc.types(Classifier::Response).is_empty());
    }
}
