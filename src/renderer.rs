//! Markdown rendering of resolved actions.
//!
//! Every action becomes a `## {id} {description}` heading followed by pipe tables:
//!
//! ```text
//! ## 2000 specify inner struct
//!
//! ** 请求 **
//!
//! 字段|类型|默认值|描述|
//! ---|---|---|---
//! fid | String | 无 | 无
//! ```
//!
//! The Chinese headers and placeholders are what downstream readers of the generated
//! documents expect and must stay byte-for-byte stable.

use crate::action_id::compare_action_ids;
use crate::annotation::{Classifier, DefaultValue, FieldDescriptor};
use crate::error::{Error, Result};
use crate::registry::RecordType;
use crate::resolver::ActionDoc;
use clap::ValueEnum;
use log::{debug, warn};
use std::collections::HashSet;

/// Placeholder for an absent default or description.
pub const PLACEHOLDER: &str = "无";

/// Title of the trailing section of [`CustomTypeLayout::Collected`].
pub const CUSTOM_TYPES_TITLE: &str = "自定义类型";

/// Where referenced custom types are listed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CustomTypeLayout {
    /// Under each action, after the table of the side that reaches them
    #[default]
    PerSide,
    /// Once, in a single section after all actions
    Collected,
}

/// The third table column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueColumn {
    /// `默认值` on both sides
    #[default]
    Default,
    /// `是否必需` on the request side, no third column on the response side
    Required,
}

/// What to do with a default value the tables cannot show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefaultPolicy {
    /// Render the placeholder and log a warning
    #[default]
    Degrade,
    /// Fail the document
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub layout: CustomTypeLayout,
    pub value_column: ValueColumn,
    pub default_policy: DefaultPolicy,
}

/// Renders action docs into one markdown document.
#[derive(Debug, Clone, Default)]
pub struct DocRenderer {
    options: RenderOptions,
}

impl DocRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Renders every action in ascending numeric id order.
    ///
    /// The same input always yields the same bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDefault`] under [`DefaultPolicy::Strict`].
    pub fn render(&self, actions: &[ActionDoc]) -> Result<String> {
        let mut ordered: Vec<&ActionDoc> = actions.iter().collect();
        ordered.sort_by(|a, b| compare_action_ids(&a.action_id, &b.action_id));

        let mut fragments = Vec::with_capacity(ordered.len() + 1);
        for action in &ordered {
            fragments.push(self.render_action(action)?);
        }

        if self.options.layout == CustomTypeLayout::Collected {
            if let Some(section) = self.render_collected(&ordered)? {
                fragments.push(section);
            }
        }

        debug!("Rendered {} actions", ordered.len());
        Ok(fragments.join("\n"))
    }

    /// Renders one action: heading, request table, response table and, in the
    /// per-side layout, the custom types of each side.
    pub fn render_action(&self, action: &ActionDoc) -> Result<String> {
        let mut out = heading(&action.action_id, &action.action_description);

        for side in [Classifier::Request, Classifier::Response] {
            let fields = action.fields(side);
            if !fields.is_empty() {
                self.write_table(&mut out, side.label(), side, fields)?;
            }
            if self.options.layout == CustomTypeLayout::PerSide {
                for record in action.types(side) {
                    self.write_table(&mut out, &record.name, side, &record.fields)?;
                }
            }
        }

        Ok(out)
    }

    fn render_collected(&self, actions: &[&ActionDoc]) -> Result<Option<String>> {
        // a type reached from both sides carries different fields on each
        let mut seen: HashSet<(Classifier, &str)> = HashSet::new();
        let mut collected: Vec<(Classifier, &RecordType)> = Vec::new();
        for action in actions {
            for side in [Classifier::Request, Classifier::Response] {
                for record in action.types(side) {
                    if seen.insert((side, record.name.as_str())) {
                        collected.push((side, record));
                    }
                }
            }
        }

        if collected.is_empty() {
            return Ok(None);
        }

        let mut out = format!("## {}\n", CUSTOM_TYPES_TITLE);
        for (side, record) in collected {
            self.write_table(&mut out, &record.name, side, &record.fields)?;
        }
        Ok(Some(out))
    }

    fn write_table(
        &self,
        out: &mut String,
        title: &str,
        side: Classifier,
        fields: &[FieldDescriptor],
    ) -> Result<()> {
        let with_value = !(self.options.value_column == ValueColumn::Required
            && side == Classifier::Response);

        out.push_str(&format!("\n** {} **\n\n", title));
        if with_value {
            let value_header = match self.options.value_column {
                ValueColumn::Default => "默认值",
                ValueColumn::Required => "是否必需",
            };
            out.push_str(&format!("字段|类型|{}|描述|\n---|---|---|---\n", value_header));
        } else {
            out.push_str("字段|类型|描述|\n---|---|---\n");
        }

        for field in fields {
            let description = field.description.as_deref().unwrap_or(PLACEHOLDER);
            let mut cells = vec![cell(&field.alias), cell(field.value_type.text())];
            if with_value {
                cells.push(self.value_cell(field)?);
            }
            cells.push(cell(description));
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }

        Ok(())
    }

    fn value_cell(&self, field: &FieldDescriptor) -> Result<String> {
        match self.options.value_column {
            ValueColumn::Required => Ok(required_text(field.required.unwrap_or(false)).to_string()),
            ValueColumn::Default => match format_default(field.default_value.as_ref()) {
                Some(text) => Ok(cell(&text)),
                None => self.unsupported_default(field),
            },
        }
    }

    fn unsupported_default(&self, field: &FieldDescriptor) -> Result<String> {
        let literal = match &field.default_value {
            Some(DefaultValue::Unsupported(literal)) => literal.clone(),
            _ => String::new(),
        };
        match self.options.default_policy {
            DefaultPolicy::Strict => Err(Error::UnsupportedDefault {
                field: field.name.clone(),
                literal,
            }),
            DefaultPolicy::Degrade => {
                warn!(
                    "Unsupported default {} on field {}, rendering placeholder",
                    literal, field.name
                );
                Ok(PLACEHOLDER.to_string())
            }
        }
    }
}

fn heading(action_id: &str, description: &str) -> String {
    if description.is_empty() {
        format!("## {}\n", action_id)
    } else {
        format!("## {} {}\n", action_id, description)
    }
}

/// Formats a default value for a table cell; `None` for kinds tables cannot show.
pub fn format_default(value: Option<&DefaultValue>) -> Option<String> {
    match value {
        None => Some(PLACEHOLDER.to_string()),
        Some(DefaultValue::Str(s)) if s.is_empty() => Some(PLACEHOLDER.to_string()),
        Some(DefaultValue::Str(s)) => Some(s.clone()),
        Some(DefaultValue::Int(n)) => Some(n.to_string()),
        Some(DefaultValue::Float(f)) => Some(format!("{:.6}", f)),
        Some(DefaultValue::Bool(b)) => Some(b.to_string()),
        Some(DefaultValue::Unsupported(_)) => None,
    }
}

pub fn required_text(required: bool) -> &'static str {
    if required {
        "是"
    } else {
        "否"
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}
