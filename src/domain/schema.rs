//! Declaration shapes and their normalization into ordered field records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::{BuildError, BuildResult};

/// One canonical field declaration.
///
/// A leading `+` on the name requests an update of an already-declared field
/// instead of a replacement; dotted names place the field under a parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(flatten)]
    pub attrs: BTreeMap<String, Value>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: Some(field_type.into()),
            attrs: BTreeMap::new(),
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            attrs: BTreeMap::new(),
        }
    }

    /// Chains an attribute onto this declaration.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// True when this record updates an existing field (`+name`).
    pub fn is_update(&self) -> bool {
        self.name.starts_with('+')
    }

    /// The dotted field path without the update marker.
    pub fn base_name(&self) -> &str {
        self.name.strip_prefix('+').unwrap_or(&self.name)
    }
}

/// Shorthand accepted wherever a declaration appears as a map value:
/// either a bare type name or a full attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeclShorthand {
    Type(String),
    Attrs(DeclAttrs),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclAttrs {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(flatten)]
    pub attrs: BTreeMap<String, Value>,
}

impl DeclShorthand {
    pub fn type_name(name: impl Into<String>) -> Self {
        DeclShorthand::Type(name.into())
    }

    fn to_decl(&self, name: &str) -> FieldDecl {
        match self {
            DeclShorthand::Type(t) => FieldDecl::new(name, t.clone()),
            DeclShorthand::Attrs(a) => FieldDecl {
                name: name.to_string(),
                field_type: a.field_type.clone(),
                attrs: a.attrs.clone(),
            },
        }
    }
}

/// The heterogeneous field list of a form schema.
///
/// All shapes normalize into one record sequence: `fields` first, then
/// `field_map`, `auto_required`, `auto_optional`, and the legacy
/// `required`/`optional` maps. Keyed shapes have no inherent order and
/// normalize in lexical key order; use `fields` when sequence matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldList {
    pub fields: Vec<FieldDecl>,
    pub field_map: BTreeMap<String, DeclShorthand>,
    /// Names only; type guessed, field marked required
    pub auto_required: Vec<String>,
    /// Names only; type guessed, field left optional
    pub auto_optional: Vec<String>,
    pub required: BTreeMap<String, DeclShorthand>,
    pub optional: BTreeMap<String, DeclShorthand>,
}

impl FieldList {
    pub fn from_decls(fields: Vec<FieldDecl>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Ordered (name, shorthand) pairs, for callers that need a precise
    /// sequence with map-style declarations.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, DeclShorthand)>,
        K: Into<String>,
    {
        let fields = pairs
            .into_iter()
            .map(|(name, shorthand)| {
                let name = name.into();
                shorthand.to_decl(&name)
            })
            .collect();
        Self::from_decls(fields)
    }

    pub fn push(&mut self, decl: FieldDecl) {
        self.fields.push(decl);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.field_map.is_empty()
            && self.auto_required.is_empty()
            && self.auto_optional.is_empty()
            && self.required.is_empty()
            && self.optional.is_empty()
    }

    /// Flattens every shape into one ordered record list and validates names.
    pub fn normalize(&self) -> BuildResult<Vec<FieldDecl>> {
        let mut records: Vec<FieldDecl> = self.fields.clone();
        for (name, shorthand) in &self.field_map {
            records.push(shorthand.to_decl(name));
        }
        for name in &self.auto_required {
            records.push(
                FieldDecl::new(name.clone(), guess_type(name)).attr("required", true),
            );
        }
        for name in &self.auto_optional {
            records.push(FieldDecl::new(name.clone(), guess_type(name)));
        }
        for (name, shorthand) in &self.required {
            records.push(shorthand.to_decl(name).attr("required", true));
        }
        for (name, shorthand) in &self.optional {
            records.push(shorthand.to_decl(name).attr("required", false));
        }

        for (position, record) in records.iter().enumerate() {
            let base = record.base_name();
            if base.is_empty() || base.split('.').any(|segment| segment.is_empty()) {
                return Err(BuildError::UnnamedField { position });
            }
        }
        Ok(records)
    }
}

/// Guesses a field type from a name, for the auto shapes.
pub fn guess_type(name: &str) -> &'static str {
    let leaf = name
        .trim_start_matches('+')
        .rsplit('.')
        .next()
        .unwrap_or(name);
    if leaf.contains("email") {
        "Email"
    } else if leaf == "id"
        || leaf.ends_with("_id")
        || leaf == "age"
        || leaf == "count"
        || leaf.ends_with("_count")
    {
        "Integer"
    } else if leaf.starts_with("is_") || leaf.starts_with("has_") {
        "Boolean"
    } else {
        "Text"
    }
}
