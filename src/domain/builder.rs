//! Tree builder: assembles field trees from declaration lists.

use generational_arena::Index;
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::arena::{FieldArena, TEMPLATE_SLOT};
use crate::domain::error::{BuildError, BuildResult};
use crate::domain::node::{FieldKind, FieldNode};
use crate::domain::registry::FieldRegistry;
use crate::domain::schema::{FieldDecl, FieldList};

/// Assembles a [`FieldArena`] from a [`FieldList`].
///
/// Records are processed shallow-to-deep, so dotted declarations may appear
/// in any order; within one depth the declaration sequence is preserved.
/// Every error is fatal and atomic: a failed build returns no tree.
pub struct TreeBuilder<'a> {
    registry: &'a FieldRegistry,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(registry: &'a FieldRegistry) -> Self {
        Self { registry }
    }

    #[instrument(level = "debug", skip(self, list))]
    pub fn build(&self, list: &FieldList) -> BuildResult<FieldArena> {
        let mut arena = FieldArena::new();
        let root = arena.root();
        let mut active_types = Vec::new();
        self.populate(&mut arena, root, list, &mut active_types)?;
        self.finalize(&mut arena)?;
        debug!(nodes = arena.len(), depth = arena.depth(), "field tree assembled");
        Ok(arena)
    }

    /// Expands one declaration list under `context`.
    fn populate(
        &self,
        arena: &mut FieldArena,
        context: Index,
        list: &FieldList,
        active_types: &mut Vec<String>,
    ) -> BuildResult<()> {
        let records = list.normalize()?;
        // Stable sort: shallow records first, declaration order within a depth.
        let by_depth: Vec<FieldDecl> = records
            .into_iter()
            .sorted_by_key(|record| record.base_name().matches('.').count())
            .collect();
        for record in &by_depth {
            self.place(arena, context, record, active_types)?;
        }
        Ok(())
    }

    /// Places one record: resolves its parent and slot, then creates or
    /// updates the node there.
    #[instrument(level = "trace", skip(self, arena, record, active_types), fields(name = %record.name))]
    fn place(
        &self,
        arena: &mut FieldArena,
        context: Index,
        record: &FieldDecl,
        active_types: &mut Vec<String>,
    ) -> BuildResult<Index> {
        let path = record.base_name();
        let (parent_path, leaf) = match path.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, path),
        };

        let mut parent = match parent_path {
            Some(p) => {
                arena
                    .resolve_from(context, p)
                    .ok_or_else(|| BuildError::UnknownParent {
                        field: path.to_string(),
                        parent: p.to_string(),
                    })?
            }
            None => context,
        };

        let parent_kind = arena.get(parent).map(|n| n.kind);
        let into_template_slot = parent_kind == Some(FieldKind::Repeatable) && leaf == TEMPLATE_SLOT;

        let idx = if into_template_slot {
            self.place_template(arena, parent, record, leaf, active_types)?
        } else {
            if parent_kind == Some(FieldKind::Repeatable) {
                // Named children of a repeatable live in its template.
                parent = self.ensure_template(arena, parent)?;
            }
            if arena.get(parent).is_some_and(|n| !n.kind.is_container()) {
                return Err(BuildError::InvalidParentType {
                    field: path.to_string(),
                    parent: arena.path_of(parent),
                });
            }
            self.place_named(arena, parent, record, leaf, path, active_types)?
        };

        // `contains` attribute on a repeatable is sugar for a template record.
        if let Some(item_shape) = record.attrs.get(TEMPLATE_SLOT).cloned() {
            if arena.get(idx).is_some_and(|n| n.kind == FieldKind::Repeatable) {
                let template_record = template_record(&item_shape);
                self.place(arena, idx, &template_record, active_types)?;
            }
        }

        Ok(idx)
    }

    fn place_named(
        &self,
        arena: &mut FieldArena,
        parent: Index,
        record: &FieldDecl,
        leaf: &str,
        path: &str,
        active_types: &mut Vec<String>,
    ) -> BuildResult<Index> {
        match arena.child_by_name(parent, leaf) {
            Some(existing) if record.is_update() => {
                // '+name' merges attributes in place; identity, children and
                // order state of the existing node are kept.
                self.check_declared_type(record, path)?;
                if let Some(node) = arena.get_mut(existing) {
                    node.apply_attrs(&record.attrs);
                }
                debug!(field = path, "updated field in place");
                Ok(existing)
            }
            Some(existing) => {
                // Plain redeclaration is a full replacement at the same slot.
                let node = self.construct(record, leaf, path)?;
                let idx = arena.replace_child(parent, existing, node);
                self.expand_nested(arena, idx, active_types)?;
                debug!(field = path, "replaced field");
                Ok(idx)
            }
            None => {
                let node = self.construct(record, leaf, path)?;
                let idx = arena.attach(node, parent);
                self.expand_nested(arena, idx, active_types)?;
                Ok(idx)
            }
        }
    }

    fn place_template(
        &self,
        arena: &mut FieldArena,
        owner: Index,
        record: &FieldDecl,
        leaf: &str,
        active_types: &mut Vec<String>,
    ) -> BuildResult<Index> {
        match arena.template_of(owner) {
            Some(existing) if record.is_update() => {
                let full_path = format!("{}.{}", arena.path_of(owner), TEMPLATE_SLOT);
                self.check_declared_type(record, &full_path)?;
                if let Some(node) = arena.get_mut(existing) {
                    node.apply_attrs(&record.attrs);
                }
                Ok(existing)
            }
            _ => {
                let full_path = format!("{}.{}", arena.path_of(owner), TEMPLATE_SLOT);
                let node = self.construct(record, leaf, &full_path)?;
                let idx = arena.set_template(owner, node);
                self.expand_nested(arena, idx, active_types)?;
                Ok(idx)
            }
        }
    }

    /// An update keeps the node's existing type binding, but a type named
    /// on the record must still resolve.
    fn check_declared_type(&self, record: &FieldDecl, path: &str) -> BuildResult<()> {
        let Some(declared) = record.field_type.as_deref() else {
            return Ok(());
        };
        if self.registry.resolve(declared).is_none() {
            return Err(BuildError::UnresolvedFieldType {
                field: path.to_string(),
                type_name: declared.to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the record's type and constructs the node with its
    /// declaration attributes applied. Untyped records default to text.
    fn construct(&self, record: &FieldDecl, leaf: &str, path: &str) -> BuildResult<FieldNode> {
        let declared = record.field_type.as_deref().unwrap_or("Text");
        let (canonical, ftype) =
            self.registry
                .resolve(declared)
                .ok_or_else(|| BuildError::UnresolvedFieldType {
                    field: path.to_string(),
                    type_name: declared.to_string(),
                })?;
        let mut node = FieldNode::new(leaf, canonical, ftype);
        node.apply_attrs(&record.attrs);
        Ok(node)
    }

    /// Expands the subfields a compound type ships, guarding against
    /// self-referential type nesting.
    fn expand_nested(
        &self,
        arena: &mut FieldArena,
        idx: Index,
        active_types: &mut Vec<String>,
    ) -> BuildResult<()> {
        let nested = arena
            .get(idx)
            .and_then(|node| node.ftype.field_list().map(|list| (node.type_name.clone(), list)));
        let Some((type_name, list)) = nested else {
            return Ok(());
        };
        if active_types.contains(&type_name) {
            return Err(BuildError::CycleDetected { type_name });
        }
        active_types.push(type_name);
        let outcome = self.populate(arena, idx, &list, active_types);
        active_types.pop();
        outcome
    }

    /// Children declared directly under a repeatable imply a compound
    /// template; creates it on first touch.
    fn ensure_template(&self, arena: &mut FieldArena, owner: Index) -> BuildResult<Index> {
        if let Some(existing) = arena.template_of(owner) {
            return Ok(existing);
        }
        let (canonical, ftype) =
            self.registry
                .resolve("Compound")
                .ok_or_else(|| BuildError::UnresolvedFieldType {
                    field: format!("{}.{}", arena.path_of(owner), TEMPLATE_SLOT),
                    type_name: "Compound".to_string(),
                })?;
        let node = FieldNode::new(TEMPLATE_SLOT, canonical, ftype);
        Ok(arena.set_template(owner, node))
    }

    /// Repeatables that never declared an item shape default to a text
    /// template; afterwards unordered siblings get order stamped past the
    /// explicit maximum, in declaration sequence.
    fn finalize(&self, arena: &mut FieldArena) -> BuildResult<()> {
        let bare: Vec<Index> = arena
            .iter()
            .filter(|(_, node)| node.kind == FieldKind::Repeatable && node.template().is_none())
            .map(|(idx, _)| idx)
            .collect();
        for owner in bare {
            let (canonical, ftype) =
                self.registry
                    .resolve("Text")
                    .ok_or_else(|| BuildError::UnresolvedFieldType {
                        field: format!("{}.{}", arena.path_of(owner), TEMPLATE_SLOT),
                        type_name: "Text".to_string(),
                    })?;
            arena.set_template(owner, FieldNode::new(TEMPLATE_SLOT, canonical, ftype));
        }

        let containers: Vec<Index> = arena
            .iter()
            .filter(|(_, node)| node.kind.is_container())
            .map(|(idx, _)| idx)
            .collect();
        for container in containers {
            stamp_order(arena, container);
        }
        Ok(())
    }
}

/// Stamps order onto the unordered members of one sibling set.
fn stamp_order(arena: &mut FieldArena, parent: Index) {
    let children: Vec<Index> = arena.children_of(parent).to_vec();
    let max_explicit = children
        .iter()
        .filter_map(|&child| {
            arena
                .get(child)
                .filter(|node| node.explicit_order)
                .map(|node| node.order)
        })
        .max()
        .unwrap_or(0);
    // Saturate so an explicit order at i64::MAX cannot wrap the stamps.
    let mut next = max_explicit.saturating_add(1);
    for child in children {
        if let Some(node) = arena.get_mut(child) {
            if !node.explicit_order {
                node.order = next;
                next = next.saturating_add(1);
            }
        }
    }
}

/// Expands the `contains` attribute value into a template record: a bare
/// string names the item type, a map carries full item attributes.
fn template_record(item_shape: &Value) -> FieldDecl {
    match item_shape {
        Value::String(type_name) => FieldDecl::new(TEMPLATE_SLOT, type_name.clone()),
        Value::Object(map) => {
            let mut decl = FieldDecl::untyped(TEMPLATE_SLOT);
            for (key, value) in map {
                if key == "type" {
                    decl.field_type = value.as_str().map(String::from);
                } else {
                    decl.attrs.insert(key.clone(), value.clone());
                }
            }
            decl
        }
        _ => FieldDecl::untyped(TEMPLATE_SLOT),
    }
}
