//! Field type registry: the closed set of types a build may resolve.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::node::FieldKind;
use crate::domain::schema::FieldList;

/// Behavior of one field type.
///
/// Types coerce raw input into values; a failure is reported as a message,
/// not an error, so a bad value never aborts a processing run. Compound
/// types may ship their own nested field list.
pub trait FieldType: Send + Sync + fmt::Debug {
    fn kind(&self) -> FieldKind;

    /// Coerces present, non-null input into this type's value.
    /// Container types never reach this; their shape is checked structurally.
    fn validate(&self, input: &Value) -> Result<Value, String>;

    /// Subfields a node of this type brings along, if any.
    fn field_list(&self) -> Option<FieldList> {
        None
    }
}

/// Plain text. Numbers and booleans are accepted and stringified.
#[derive(Debug)]
pub struct TextType;

impl FieldType for TextType {
    fn kind(&self) -> FieldKind {
        FieldKind::Scalar
    }

    fn validate(&self, input: &Value) -> Result<Value, String> {
        match input {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err("expected text".to_string()),
        }
    }
}

#[derive(Debug)]
pub struct IntegerType;

impl FieldType for IntegerType {
    fn kind(&self) -> FieldKind {
        FieldKind::Scalar
    }

    fn validate(&self, input: &Value) -> Result<Value, String> {
        match input {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::from(i)),
                None => Err(format!("'{}' is not an integer", n)),
            },
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{}' is not an integer", s)),
            _ => Err("expected an integer".to_string()),
        }
    }
}

#[derive(Debug)]
pub struct FloatType;

impl FieldType for FloatType {
    fn kind(&self) -> FieldKind {
        FieldKind::Scalar
    }

    fn validate(&self, input: &Value) -> Result<Value, String> {
        let parsed = match input {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(f) if f.is_finite() => Ok(Value::from(f)),
            _ => Err("expected a number".to_string()),
        }
    }
}

#[derive(Debug)]
pub struct BooleanType;

impl FieldType for BooleanType {
    fn kind(&self) -> FieldKind {
        FieldKind::Scalar
    }

    fn validate(&self, input: &Value) -> Result<Value, String> {
        match input {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" | "" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", s)),
            },
            _ => Err("expected a boolean".to_string()),
        }
    }
}

/// Minimal email shape check: one `@`, non-empty local part, dotted domain.
#[derive(Debug)]
pub struct EmailType;

impl FieldType for EmailType {
    fn kind(&self) -> FieldKind {
        FieldKind::Scalar
    }

    fn validate(&self, input: &Value) -> Result<Value, String> {
        let Some(text) = input.as_str() else {
            return Err("expected an email address".to_string());
        };
        match text.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
            {
                Ok(Value::String(text.to_string()))
            }
            _ => Err(format!("'{}' is not a valid email address", text)),
        }
    }
}

#[derive(Debug)]
pub struct CompoundType;

impl FieldType for CompoundType {
    fn kind(&self) -> FieldKind {
        FieldKind::Compound
    }

    fn validate(&self, input: &Value) -> Result<Value, String> {
        Ok(input.clone())
    }
}

#[derive(Debug)]
pub struct RepeatableType;

impl FieldType for RepeatableType {
    fn kind(&self) -> FieldKind {
        FieldKind::Repeatable
    }

    fn validate(&self, input: &Value) -> Result<Value, String> {
        Ok(input.clone())
    }
}

/// Closed mapping from type names to behaviors.
///
/// Resolution of a declared name tries three forms: a `+` prefix selects the
/// fully-qualified name verbatim, then the configured namespace is prepended,
/// then the bare name is looked up. Unknown names resolve to `None`; nothing
/// is ever loaded dynamically.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    namespace: Option<String>,
    types: HashMap<String, Arc<dyn FieldType>>,
}

impl FieldRegistry {
    /// Empty registry with no namespace. Most callers want
    /// [`FieldRegistry::with_builtins`].
    pub fn new() -> Self {
        Self {
            namespace: None,
            types: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("Text", Arc::new(TextType));
        registry.register("Integer", Arc::new(IntegerType));
        registry.register("Float", Arc::new(FloatType));
        registry.register("Boolean", Arc::new(BooleanType));
        registry.register("Email", Arc::new(EmailType));
        registry.register("Compound", Arc::new(CompoundType));
        registry.register("Repeatable", Arc::new(RepeatableType));
        registry
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = Some(namespace.into());
    }

    pub fn register(&mut self, name: impl Into<String>, ftype: Arc<dyn FieldType>) {
        self.types.insert(name.into(), ftype);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Resolves a declared type name to its canonical key and behavior.
    pub fn resolve(&self, declared: &str) -> Option<(String, Arc<dyn FieldType>)> {
        if let Some(qualified) = declared.strip_prefix('+') {
            return self.lookup(qualified);
        }
        if let Some(namespace) = &self.namespace {
            if let Some(found) = self.lookup(&format!("{}::{}", namespace, declared)) {
                return Some(found);
            }
        }
        self.lookup(declared)
    }

    fn lookup(&self, key: &str) -> Option<(String, Arc<dyn FieldType>)> {
        self.types
            .get_key_value(key)
            .map(|(name, ftype)| (name.clone(), ftype.clone()))
    }

    /// All registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let registry = FieldRegistry::with_builtins();
        for name in ["Text", "Integer", "Float", "Boolean", "Email", "Compound", "Repeatable"] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }

    #[test]
    fn test_resolve_bare_name() {
        let registry = FieldRegistry::with_builtins();
        let (canonical, ftype) = registry.resolve("Integer").unwrap();
        assert_eq!(canonical, "Integer");
        assert_eq!(ftype.kind(), FieldKind::Scalar);
    }

    #[test]
    fn test_resolve_prefers_namespace() {
        let mut registry = FieldRegistry::with_builtins();
        registry.register("myapp::Text", Arc::new(EmailType));
        registry.set_namespace("myapp");

        let (canonical, _) = registry.resolve("Text").unwrap();
        assert_eq!(canonical, "myapp::Text");
    }

    #[test]
    fn test_resolve_plus_prefix_is_fully_qualified() {
        let mut registry = FieldRegistry::with_builtins();
        registry.register("myapp::Password", Arc::new(TextType));

        assert!(registry.resolve("+myapp::Password").is_some());
        assert!(registry.resolve("Password").is_none());
        assert!(registry.resolve("+Password").is_none());
    }

    #[test]
    fn test_unknown_name_resolves_to_none() {
        let registry = FieldRegistry::with_builtins();
        assert!(registry.resolve("NoSuchType").is_none());
    }

    #[test]
    fn test_type_names_sorted_with_qualified_entries() {
        let mut registry = FieldRegistry::with_builtins();
        registry.register("myapp::Password", Arc::new(TextType));

        let names = registry.type_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"myapp::Password".to_string()));
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(IntegerType.validate(&json!(42)).unwrap(), json!(42));
        assert_eq!(IntegerType.validate(&json!("17")).unwrap(), json!(17));
        assert!(IntegerType.validate(&json!("abc")).is_err());
        assert!(IntegerType.validate(&json!(1.5)).is_err());
        assert!(IntegerType.validate(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(BooleanType.validate(&json!("yes")).unwrap(), json!(true));
        assert_eq!(BooleanType.validate(&json!(0)).unwrap(), json!(false));
        assert!(BooleanType.validate(&json!("maybe")).is_err());
    }

    #[test]
    fn test_email_shape() {
        assert!(EmailType.validate(&json!("joe@example.com")).is_ok());
        assert!(EmailType.validate(&json!("joe@localhost")).is_err());
        assert!(EmailType.validate(&json!("@example.com")).is_err());
        assert!(EmailType.validate(&json!(42)).is_err());
    }

    #[test]
    fn test_text_rejects_containers() {
        assert!(TextType.validate(&json!([1, 2])).is_err());
        assert_eq!(TextType.validate(&json!(5)).unwrap(), json!("5"));
    }
}
