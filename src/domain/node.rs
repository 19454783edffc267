//! Field nodes: the typed building blocks of a field tree.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use generational_arena::Index;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::domain::registry::FieldType;

/// Structural category of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Leaf holding a single value
    Scalar,
    /// Named children, materializes as a map
    Compound,
    /// Positional children cloned from a template, materializes as a list
    Repeatable,
}

impl FieldKind {
    pub fn is_container(&self) -> bool {
        matches!(self, FieldKind::Compound | FieldKind::Repeatable)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Scalar => "scalar",
            FieldKind::Compound => "compound",
            FieldKind::Repeatable => "repeatable",
        };
        write!(f, "{}", name)
    }
}

/// A single node in the field tree.
///
/// Declaration state (name, type, attributes) is fixed at build time;
/// runtime state (input, value, errors) changes with every processing run.
#[derive(Debug)]
pub struct FieldNode {
    /// Field name, unique among its siblings
    pub name: String,
    /// Stable identity; kept by `+name` updates, regenerated on replacement
    pub uid: Uuid,
    /// Canonical registry key of the field type
    pub type_name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub label: Option<String>,
    /// Fallback value applied when no input arrives
    pub default: Option<Value>,
    /// Excluded from the validation cascade when set
    pub no_update: bool,
    /// Sort key among siblings; stamped after assembly when not declared
    pub order: i64,
    /// Raw input from the last load
    pub input: Option<Value>,
    /// Coerced value produced by the last validation
    pub value: Option<Value>,
    /// Messages recorded by the last validation cascade
    pub errors: Vec<String>,
    /// True when `order` came from a declaration attribute
    pub(crate) explicit_order: bool,
    /// Global creation sequence, breaks order ties
    pub(crate) seq: u64,
    /// Type behavior resolved from the registry at build time
    pub(crate) ftype: Arc<dyn FieldType>,
    /// Index of the parent node, None only for the root
    pub(crate) parent: Option<Index>,
    /// Indices of named or positional children
    pub(crate) children: Vec<Index>,
    /// Template slot of a repeatable field
    pub(crate) template: Option<Index>,
}

impl FieldNode {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        ftype: Arc<dyn FieldType>,
    ) -> Self {
        Self {
            name: name.into(),
            uid: Uuid::new_v4(),
            type_name: type_name.into(),
            kind: ftype.kind(),
            required: false,
            label: None,
            default: None,
            no_update: false,
            order: 0,
            input: None,
            value: None,
            errors: Vec::new(),
            explicit_order: false,
            seq: 0,
            ftype,
            parent: None,
            children: Vec::new(),
            template: None,
        }
    }

    /// Applies declaration attributes onto this node. `type` and `contains`
    /// are consumed elsewhere; unknown keys are logged and ignored.
    pub fn apply_attrs(&mut self, attrs: &BTreeMap<String, Value>) {
        for (key, value) in attrs {
            match key.as_str() {
                "required" => {
                    if let Some(flag) = value.as_bool() {
                        self.required = flag;
                    }
                }
                "label" => {
                    if let Some(text) = value.as_str() {
                        self.label = Some(text.to_string());
                    }
                }
                "default" => {
                    if !value.is_null() {
                        self.default = Some(value.clone());
                    }
                }
                "order" => {
                    if let Some(n) = value.as_i64() {
                        self.order = n;
                        self.explicit_order = true;
                    }
                }
                "no_update" => {
                    if let Some(flag) = value.as_bool() {
                        self.no_update = flag;
                    }
                }
                "type" | "contains" => {}
                other => {
                    debug!(field = %self.name, attr = other, "ignoring unknown attribute");
                }
            }
        }
    }

    pub fn parent(&self) -> Option<Index> {
        self.parent
    }

    pub fn children(&self) -> &[Index] {
        &self.children
    }

    pub fn template(&self) -> Option<Index> {
        self.template
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The fif contribution of a leaf: raw input when present, else the
    /// held value. Null input counts as absent.
    pub fn fif_value(&self) -> Option<Value> {
        match &self.input {
            Some(v) if !v.is_null() => Some(v.clone()),
            _ => self.value.clone(),
        }
    }

    /// Fresh copy carrying only declaration state: new identity, no runtime
    /// state, no links. Used when cloning templates into instances.
    pub(crate) fn instantiate(&self, name: impl Into<String>) -> FieldNode {
        FieldNode {
            name: name.into(),
            uid: Uuid::new_v4(),
            type_name: self.type_name.clone(),
            kind: self.kind,
            required: self.required,
            label: self.label.clone(),
            default: self.default.clone(),
            no_update: self.no_update,
            order: self.order,
            input: None,
            value: None,
            errors: Vec::new(),
            explicit_order: self.explicit_order,
            seq: 0,
            ftype: self.ftype.clone(),
            parent: None,
            children: Vec::new(),
            template: None,
        }
    }
}

impl fmt::Display for FieldNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.type_name)
    }
}
