//! Form: owns a field tree and drives the processing cycle.

use std::collections::HashMap;

use generational_arena::Index;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::domain::arena::FieldArena;
use crate::domain::builder::TreeBuilder;
use crate::domain::error::{BuildResult, FieldError, FieldResult, FifResult};
use crate::domain::fif::{self, FlatMap};
use crate::domain::node::{FieldKind, FieldNode};
use crate::domain::registry::FieldRegistry;
use crate::domain::schema::FieldList;

const REQUIRED_MESSAGE: &str = "field is required";

/// Cross-field check attached to one field path. Runs after the field has
/// validated and only when it holds a value; a message marks it invalid.
pub type Validator = Box<dyn Fn(&FieldArena, Index) -> Result<(), String> + Send + Sync>;

/// A form over one field tree.
///
/// Structure is fixed at build time; every processing run clears runtime
/// state, loads input and cascades validation over the whole tree. A run
/// never aborts early, so all invalid fields report at once.
pub struct Form {
    tree: FieldArena,
    validators: HashMap<String, Validator>,
}

impl Form {
    /// Builds a form over the built-in type registry.
    pub fn from_list(list: &FieldList) -> BuildResult<Self> {
        Self::with_registry(list, &FieldRegistry::default())
    }

    pub fn with_registry(list: &FieldList, registry: &FieldRegistry) -> BuildResult<Self> {
        let tree = TreeBuilder::new(registry).build(list)?;
        Ok(Self {
            tree,
            validators: HashMap::new(),
        })
    }

    pub fn tree(&self) -> &FieldArena {
        &self.tree
    }

    /// Looks up a field by dotted path. `None` when absent.
    pub fn field(&self, path: &str) -> Option<&FieldNode> {
        self.tree.resolve(path).and_then(|idx| self.tree.get(idx))
    }

    /// Strict lookup, reporting the path and the container the walk died in.
    pub fn field_strict(&self, path: &str) -> FieldResult<&FieldNode> {
        let idx = self.tree.resolve_strict(path)?;
        self.tree.get(idx).ok_or_else(|| FieldError::NotFound {
            path: path.to_string(),
            container: "the form".to_string(),
        })
    }

    /// Top-level fields in declaration order.
    pub fn fields(&self) -> Vec<&FieldNode> {
        self.tree
            .children_of(self.tree.root())
            .iter()
            .filter_map(|&idx| self.tree.get(idx))
            .collect()
    }

    /// Top-level fields sorted by (order, declaration sequence).
    pub fn sorted_fields(&self) -> Vec<&FieldNode> {
        self.tree
            .sorted_children(self.tree.root())
            .into_iter()
            .filter_map(|idx| self.tree.get(idx))
            .collect()
    }

    /// Attaches a cross-field validator to the field at `path`, replacing
    /// any previous one there.
    pub fn add_validator<F>(&mut self, path: impl Into<String>, check: F)
    where
        F: Fn(&FieldArena, Index) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.insert(path.into(), Box::new(check));
    }

    /// Full processing cycle: clear, load nested input, validate.
    /// Returns the aggregate validity of the run.
    #[instrument(level = "debug", skip(self, input))]
    pub fn process(&mut self, input: &Value) -> bool {
        self.clear();
        self.load_input(self.tree.root(), input);
        self.validate()
    }

    /// Flat-map variant of [`Form::process`].
    pub fn process_flat(&mut self, map: &FlatMap) -> FifResult<bool> {
        let nested = fif::unflatten(map)?;
        Ok(self.process(&nested))
    }

    /// Loads a flat map into the tree without validating.
    pub fn load_fif(&mut self, map: &FlatMap) -> FifResult<()> {
        let nested = fif::unflatten(map)?;
        self.clear();
        self.load_input(self.tree.root(), &nested);
        Ok(())
    }

    /// Flat view of the tree: one entry per scalar leaf holding state, keyed
    /// by dotted path. Raw input wins over the coerced value, so a loaded
    /// map reads back unchanged.
    pub fn fif(&self) -> FlatMap {
        let mut out = FlatMap::new();
        self.collect_fif(self.tree.root(), "", &mut out);
        out
    }

    /// Nested materialization of the tree's current values. Fields without
    /// a value are omitted; repeatables materialize in instance order.
    pub fn values(&self) -> Value {
        self.node_value(self.tree.root())
            .unwrap_or(Value::Object(Map::new()))
    }

    /// True when no node holds an error.
    pub fn validated(&self) -> bool {
        self.tree.iter().all(|(_, node)| node.errors.is_empty())
    }

    /// All recorded errors as (path, message) pairs in tree order.
    pub fn errors(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (idx, node) in self.tree.iter() {
            for message in &node.errors {
                out.push((self.tree.path_of(idx), message.clone()));
            }
        }
        out
    }

    pub fn clear_values(&mut self) {
        self.tree.clear_values();
    }

    pub fn clear_errors(&mut self) {
        self.tree.clear_errors();
    }

    /// Resets all runtime state: values, errors, and repeatable instances.
    /// The declared structure and templates are kept, so every processing
    /// run starts from the same baseline.
    pub fn clear(&mut self) {
        self.tree.clear_instances();
        self.tree.clear_values();
        self.tree.clear_errors();
    }

    /// Renders the tree with per-node state for diagnostics.
    pub fn dump(&self) -> String {
        self.tree.to_display_tree().to_string()
    }

    // -- loading ----------------------------------------------------------

    fn load_input(&mut self, idx: Index, input: &Value) {
        let Some(kind) = self.tree.get(idx).map(|node| node.kind) else {
            return;
        };
        match kind {
            FieldKind::Scalar => {
                if let Some(node) = self.tree.get_mut(idx) {
                    node.input = Some(input.clone());
                }
            }
            FieldKind::Compound => match input {
                Value::Object(map) => {
                    let named: Vec<(Index, String)> = self
                        .tree
                        .children_of(idx)
                        .iter()
                        .filter_map(|&child| {
                            self.tree.get(child).map(|n| (child, n.name.clone()))
                        })
                        .collect();
                    for (child, name) in named {
                        if let Some(value) = map.get(&name) {
                            self.load_input(child, value);
                        }
                    }
                }
                Value::Null => {}
                other => {
                    if let Some(node) = self.tree.get_mut(idx) {
                        node.errors
                            .push(format!("expected a map, got {}", value_kind(other)));
                    }
                }
            },
            FieldKind::Repeatable => match input {
                Value::Array(items) => self.regenerate(idx, items),
                Value::Null => self.tree.clear_children(idx),
                other => {
                    if let Some(node) = self.tree.get_mut(idx) {
                        node.errors
                            .push(format!("expected a list, got {}", value_kind(other)));
                    }
                }
            },
        }
    }

    /// Rebuilds repeatable instances from the template, one per element.
    #[instrument(level = "trace", skip(self, items), fields(count = items.len()))]
    fn regenerate(&mut self, idx: Index, items: &[Value]) {
        self.tree.clear_children(idx);
        let Some(template) = self.tree.template_of(idx) else {
            return;
        };
        for (position, item) in items.iter().enumerate() {
            let name = position.to_string();
            if let Some(instance) = self.tree.clone_as_child(template, &name, idx) {
                if let Some(node) = self.tree.get_mut(instance) {
                    node.order = position as i64;
                    node.explicit_order = true;
                }
                self.load_input(instance, item);
            }
        }
    }

    // -- validation cascade -----------------------------------------------

    /// Validates the whole tree against current inputs, children before
    /// parents. Every reachable field gets its say.
    #[instrument(level = "debug", skip(self))]
    pub fn validate(&mut self) -> bool {
        self.validate_children(self.tree.root());
        let ok = self.validated();
        debug!(valid = ok, "validation cascade finished");
        ok
    }

    fn validate_children(&mut self, parent: Index) {
        let children: Vec<Index> = self.tree.children_of(parent).to_vec();
        for child in children {
            let Some(node) = self.tree.get(child) else {
                continue;
            };
            debug_assert_eq!(node.parent(), Some(parent));
            if node.no_update {
                continue;
            }
            self.validate_node(child);
            self.run_validator(child);
        }
    }

    fn validate_node(&mut self, idx: Index) {
        let Some((kind, required)) = self.tree.get(idx).map(|n| (n.kind, n.required)) else {
            return;
        };
        match kind {
            FieldKind::Scalar => self.validate_scalar(idx),
            FieldKind::Compound | FieldKind::Repeatable => {
                self.validate_children(idx);
                if required && !self.tree.subtree_has_value(idx) {
                    if let Some(node) = self.tree.get_mut(idx) {
                        node.errors.push(REQUIRED_MESSAGE.to_string());
                    }
                }
            }
        }
    }

    fn validate_scalar(&mut self, idx: Index) {
        let verdict = {
            let Some(node) = self.tree.get(idx) else {
                return;
            };
            match &node.input {
                Some(input) if !input.is_null() => Some(node.ftype.validate(input)),
                _ => None,
            }
        };
        let Some(node) = self.tree.get_mut(idx) else {
            return;
        };
        match verdict {
            Some(Ok(value)) => node.value = Some(value),
            Some(Err(message)) => node.errors.push(message),
            None => node.value = node.default.clone(),
        }
        if node.required && node.value.is_none() && node.errors.is_empty() {
            node.errors.push(REQUIRED_MESSAGE.to_string());
        }
    }

    fn run_validator(&mut self, idx: Index) {
        if self.validators.is_empty() {
            return;
        }
        let path = self.tree.path_of(idx);
        let Some(check) = self.validators.get(&path) else {
            return;
        };
        if !self.tree.subtree_has_value(idx) {
            return;
        }
        if let Err(message) = check(&self.tree, idx) {
            if let Some(node) = self.tree.get_mut(idx) {
                node.errors.push(message);
            }
        }
    }

    // -- materialization --------------------------------------------------

    fn node_value(&self, idx: Index) -> Option<Value> {
        let node = self.tree.get(idx)?;
        match node.kind {
            FieldKind::Scalar => node.value.clone(),
            FieldKind::Compound => {
                let mut map = Map::new();
                for &child in node.children() {
                    if let Some(child_node) = self.tree.get(child) {
                        if let Some(value) = self.node_value(child) {
                            map.insert(child_node.name.clone(), value);
                        }
                    }
                }
                if map.is_empty() {
                    None
                } else {
                    Some(Value::Object(map))
                }
            }
            FieldKind::Repeatable => {
                let items: Vec<Value> = node
                    .children()
                    .iter()
                    .filter_map(|&child| self.node_value(child))
                    .collect();
                if items.is_empty() {
                    None
                } else {
                    Some(Value::Array(items))
                }
            }
        }
    }

    fn collect_fif(&self, idx: Index, prefix: &str, out: &mut FlatMap) {
        let Some(node) = self.tree.get(idx) else {
            return;
        };
        match node.kind {
            FieldKind::Scalar => {
                if !prefix.is_empty() {
                    if let Some(value) = node.fif_value() {
                        out.insert(prefix.to_string(), value);
                    }
                }
            }
            _ => {
                for &child in node.children() {
                    if let Some(child_node) = self.tree.get(child) {
                        self.collect_fif(child, &fif::join(prefix, &child_node.name), out);
                    }
                }
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "text",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}
