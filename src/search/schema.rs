//! Index schema registry
//!
//! Declares, per searchable entity, how each field is treated by the index:
//! analyzed for fuzzy full-text matching, kept verbatim for exact matching,
//! or stored as a structured type. Fields that need both (`username`,
//! `handle`, `mentions`) are declared [`FieldKind::TextWithKeyword`], which
//! provisions an analyzed field plus an un-analyzed `keyword` sub-field.
//! Filter clauses always resolve their target through
//! [`EntitySchema::exact_field`], so a text-only field can never be
//! exact-filtered by accident.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};

/// Name of the exact-match sub-field on dual text/keyword fields
pub const KEYWORD_SUBFIELD: &str = "keyword";

/// Searchable entity kinds
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Entity {
    Conversation,
    Message,
}

impl Entity {
    pub const ALL: [Entity; 2] = [Entity::Conversation, Entity::Message];

    /// Static schema declaration for this entity
    pub fn schema(self) -> &'static EntitySchema {
        match self {
            Entity::Conversation => &CONVERSATION_SCHEMA,
            Entity::Message => &MESSAGE_SCHEMA,
        }
    }
}

/// Per-field index treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Exact-match token, not analyzed
    Keyword,
    /// Analyzed full text only; cannot be exact-filtered
    Text,
    /// Analyzed full text plus an exact `keyword` sub-field
    TextWithKeyword,
    Date,
    Boolean,
    /// Sub-documents whose fields match as a unit, never across siblings
    Nested(&'static [FieldSpec]),
}

impl FieldKind {
    /// Engine type name as it appears in a mapping
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Keyword => "keyword",
            FieldKind::Text | FieldKind::TextWithKeyword => "text",
            FieldKind::Date => "date",
            FieldKind::Boolean => "boolean",
            FieldKind::Nested(_) => "nested",
        }
    }

    fn mapping(&self) -> Value {
        match self {
            FieldKind::TextWithKeyword => json!({
                "type": "text",
                "fields": { KEYWORD_SUBFIELD: { "type": "keyword" } }
            }),
            FieldKind::Nested(fields) => json!({
                "type": "nested",
                "properties": properties(fields)
            }),
            other => json!({ "type": other.type_name() }),
        }
    }
}

/// A single declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// The complete field declaration of one entity's index
#[derive(Debug)]
pub struct EntitySchema {
    pub entity: Entity,
    pub fields: &'static [FieldSpec],
}

const PARTICIPANT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("username", FieldKind::TextWithKeyword),
    FieldSpec::new("handle", FieldKind::TextWithKeyword),
];

pub static CONVERSATION_SCHEMA: EntitySchema = EntitySchema {
    entity: Entity::Conversation,
    fields: &[
        FieldSpec::new("id", FieldKind::Keyword),
        FieldSpec::new("username", FieldKind::TextWithKeyword),
        FieldSpec::new("handle", FieldKind::TextWithKeyword),
        FieldSpec::new("lastMessage", FieldKind::Text),
        FieldSpec::new("date", FieldKind::Date),
        FieldSpec::new("participants", FieldKind::Nested(PARTICIPANT_FIELDS)),
    ],
};

pub static MESSAGE_SCHEMA: EntitySchema = EntitySchema {
    entity: Entity::Message,
    fields: &[
        FieldSpec::new("id", FieldKind::Keyword),
        FieldSpec::new("conversationId", FieldKind::Keyword),
        FieldSpec::new("username", FieldKind::TextWithKeyword),
        FieldSpec::new("handle", FieldKind::TextWithKeyword),
        FieldSpec::new("text", FieldKind::Text),
        FieldSpec::new("date", FieldKind::Date),
        FieldSpec::new("mentions", FieldKind::TextWithKeyword),
        FieldSpec::new("attachmentType", FieldKind::Keyword),
        FieldSpec::new("pinned", FieldKind::Boolean),
    ],
};

fn properties(fields: &[FieldSpec]) -> Value {
    let props: Map<String, Value> = fields
        .iter()
        .map(|f| (f.name.to_string(), f.kind.mapping()))
        .collect();
    Value::Object(props)
}

impl EntitySchema {
    /// Look up a field; dotted paths descend into nested fields
    pub fn field(&self, path: &str) -> Option<&FieldSpec> {
        let mut fields = self.fields;
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let spec = fields.iter().find(|f| f.name == segment)?;
            if segments.peek().is_none() {
                return Some(spec);
            }
            match spec.kind {
                FieldKind::Nested(inner) => fields = inner,
                _ => return None,
            }
        }
        None
    }

    /// The field name an exact-match `term` clause must target, if the field
    /// has an exact representation at all
    pub fn exact_field(&self, path: &str) -> Option<String> {
        match self.field(path)?.kind {
            FieldKind::Keyword | FieldKind::Boolean => Some(path.to_string()),
            FieldKind::TextWithKeyword => Some(format!("{}.{}", path, KEYWORD_SUBFIELD)),
            FieldKind::Text | FieldKind::Date | FieldKind::Nested(_) => None,
        }
    }

    /// Whether the field is analyzed and therefore usable in fuzzy matching
    pub fn is_full_text(&self, path: &str) -> bool {
        matches!(
            self.field(path).map(|f| f.kind),
            Some(FieldKind::Text | FieldKind::TextWithKeyword)
        )
    }

    /// Whether the field supports range comparison
    pub fn is_date(&self, path: &str) -> bool {
        matches!(self.field(path).map(|f| f.kind), Some(FieldKind::Date))
    }

    /// The `mappings` object for index creation
    pub fn mappings(&self) -> Value {
        json!({ "properties": properties(self.fields) })
    }

    /// Full create-index request body
    pub fn index_body(&self) -> Value {
        json!({ "mappings": self.mappings() })
    }

    /// Compare a live `mappings` object against this declaration.
    ///
    /// Returns one message per missing field, wrong type or missing keyword
    /// sub-field. An empty list means the live mapping is usable.
    pub fn verify(&self, mappings: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        verify_fields(
            &self.entity.to_string(),
            self.fields,
            mappings.get("properties"),
            &mut errors,
        );
        errors
    }
}

fn verify_fields(
    prefix: &str,
    fields: &[FieldSpec],
    live: Option<&Value>,
    errors: &mut Vec<String>,
) {
    for spec in fields {
        let path = format!("{}.{}", prefix, spec.name);
        let Some(actual) = live.and_then(|props| props.get(spec.name)) else {
            errors.push(format!("Missing field in {} mapping: {}", prefix, spec.name));
            continue;
        };

        // Object-typed mappings carry no explicit "type"
        let actual_type = actual.get("type").and_then(Value::as_str).unwrap_or("object");
        if actual_type != spec.kind.type_name() {
            errors.push(format!(
                "Field {} has type '{}', expected '{}'",
                path,
                actual_type,
                spec.kind.type_name()
            ));
            continue;
        }

        match spec.kind {
            FieldKind::TextWithKeyword => {
                let sub_type = actual
                    .pointer(&format!("/fields/{}/type", KEYWORD_SUBFIELD))
                    .and_then(Value::as_str);
                if sub_type != Some("keyword") {
                    errors.push(format!(
                        "Field {} lacks an exact '{}' sub-field",
                        path, KEYWORD_SUBFIELD
                    ));
                }
            }
            FieldKind::Nested(inner) => {
                verify_fields(&path, inner, actual.get("properties"), errors);
            }
            _ => {}
        }
    }
}

/// Outcome of checking a live mapping against the registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MappingVerification {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl MappingVerification {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}
