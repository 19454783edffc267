//! Arena-backed field tree with dotted-path resolution.

use std::sync::Arc;

use generational_arena::{Arena, Index};
use itertools::Itertools;
use termtree::Tree;
use tracing::instrument;

use crate::domain::error::{FieldError, FieldResult};
use crate::domain::node::{FieldKind, FieldNode};
use crate::domain::registry::CompoundType;

/// Path segment addressing the template slot of a repeatable field.
pub const TEMPLATE_SLOT: &str = "contains";

/// Arena-based storage for one field tree.
///
/// Nodes reference each other by arena index; parent links are non-owning
/// back-references. Every tree owns exactly one root, an unnamed compound
/// anchoring the top-level fields. Each child index is reachable from
/// exactly one parent list or template slot.
#[derive(Debug)]
pub struct FieldArena {
    arena: Arena<FieldNode>,
    root: Index,
    next_seq: u64,
}

impl FieldArena {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let mut root = FieldNode::new("", "Compound", Arc::new(CompoundType));
        root.seq = 0;
        let root = arena.insert(root);
        Self {
            arena,
            root,
            next_seq: 1,
        }
    }

    pub fn root(&self) -> Index {
        self.root
    }

    pub fn get(&self, idx: Index) -> Option<&FieldNode> {
        self.arena.get(idx)
    }

    pub fn get_mut(&mut self, idx: Index) -> Option<&mut FieldNode> {
        self.arena.get_mut(idx)
    }

    /// Node count including the root.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// True when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.arena.len() <= 1
    }

    /// Attaches a new child under `parent`, stamping the creation sequence.
    #[instrument(level = "trace", skip(self, node), fields(name = %node.name))]
    pub(crate) fn attach(&mut self, mut node: FieldNode, parent: Index) -> Index {
        node.parent = Some(parent);
        node.seq = self.next_seq;
        self.next_seq += 1;
        let idx = self.arena.insert(node);
        if let Some(parent_node) = self.arena.get_mut(parent) {
            parent_node.children.push(idx);
        }
        idx
    }

    /// Replaces `existing` under `parent` with a new node at the same slot
    /// position, dropping the old subtree.
    #[instrument(level = "trace", skip(self, node), fields(name = %node.name))]
    pub(crate) fn replace_child(&mut self, parent: Index, existing: Index, mut node: FieldNode) -> Index {
        node.parent = Some(parent);
        node.seq = self.next_seq;
        self.next_seq += 1;
        let idx = self.arena.insert(node);
        if let Some(parent_node) = self.arena.get_mut(parent) {
            if let Some(slot) = parent_node.children.iter().position(|&c| c == existing) {
                parent_node.children[slot] = idx;
            } else {
                parent_node.children.push(idx);
            }
        }
        self.remove_subtree(existing);
        idx
    }

    /// Installs `node` as the template of `owner`, dropping any previous one.
    #[instrument(level = "trace", skip(self, node))]
    pub(crate) fn set_template(&mut self, owner: Index, mut node: FieldNode) -> Index {
        node.parent = Some(owner);
        node.seq = self.next_seq;
        self.next_seq += 1;
        let idx = self.arena.insert(node);
        let previous = self
            .arena
            .get_mut(owner)
            .and_then(|n| n.template.replace(idx));
        if let Some(old) = previous {
            self.remove_subtree(old);
        }
        idx
    }

    /// Removes a node and its whole subtree from the arena. The caller owns
    /// unlinking it from its parent.
    pub(crate) fn remove_subtree(&mut self, idx: Index) {
        let links = self
            .arena
            .get(idx)
            .map(|n| (n.children.clone(), n.template));
        if let Some((children, template)) = links {
            for child in children {
                self.remove_subtree(child);
            }
            if let Some(tpl) = template {
                self.remove_subtree(tpl);
            }
        }
        self.arena.remove(idx);
    }

    /// Drops all positional children of `idx`, keeping the template.
    pub(crate) fn clear_children(&mut self, idx: Index) {
        let children = self
            .arena
            .get_mut(idx)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in children {
            self.remove_subtree(child);
        }
    }

    /// Deep-copies the subtree at `src` as a fresh child of `parent`.
    /// The copy carries declaration state only; runtime state starts clean.
    pub(crate) fn clone_as_child(&mut self, src: Index, name: &str, parent: Index) -> Option<Index> {
        let blueprint = self.get(src)?.instantiate(name);
        let idx = self.attach(blueprint, parent);
        let (children, template) = {
            let node = self.get(src)?;
            (node.children.clone(), node.template)
        };
        for child in children {
            if let Some(child_name) = self.get(child).map(|n| n.name.clone()) {
                self.clone_as_child(child, &child_name, idx);
            }
        }
        if let Some(tpl) = template {
            if let Some(copy) = self.get(tpl).map(|n| n.instantiate(TEMPLATE_SLOT)) {
                let tpl_idx = self.set_template(idx, copy);
                let tpl_children = self.get(tpl).map(|n| n.children.clone()).unwrap_or_default();
                for child in tpl_children {
                    if let Some(child_name) = self.get(child).map(|n| n.name.clone()) {
                        self.clone_as_child(child, &child_name, tpl_idx);
                    }
                }
            }
        }
        Some(idx)
    }

    pub fn children_of(&self, idx: Index) -> &[Index] {
        self.get(idx).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn template_of(&self, idx: Index) -> Option<Index> {
        self.get(idx).and_then(|n| n.template)
    }

    /// Child of `idx` with the given name.
    pub fn child_by_name(&self, idx: Index, name: &str) -> Option<Index> {
        self.children_of(idx)
            .iter()
            .copied()
            .find(|&child| self.get(child).is_some_and(|n| n.name == name))
    }

    /// Resolves a dotted path starting at the root. `None` on any miss.
    pub fn resolve(&self, path: &str) -> Option<Index> {
        self.resolve_from(self.root, path)
    }

    /// Resolves a dotted path relative to `start`.
    ///
    /// Name segments address children of a compound; numeric segments address
    /// instances of a repeatable; `contains` addresses its template slot.
    #[instrument(level = "trace", skip(self))]
    pub fn resolve_from(&self, start: Index, path: &str) -> Option<Index> {
        let mut current = start;
        for segment in path.split('.') {
            current = self.step(current, segment)?;
        }
        Some(current)
    }

    /// Strict resolution from the root, reporting where the walk stopped.
    pub fn resolve_strict(&self, path: &str) -> FieldResult<Index> {
        let mut current = self.root;
        for segment in path.split('.') {
            match self.step(current, segment) {
                Some(next) => current = next,
                None => {
                    return Err(FieldError::NotFound {
                        path: path.to_string(),
                        container: self.display_name(current),
                    })
                }
            }
        }
        Ok(current)
    }

    fn step(&self, idx: Index, segment: &str) -> Option<Index> {
        if segment.is_empty() {
            return None;
        }
        let node = self.get(idx)?;
        match node.kind {
            FieldKind::Repeatable => {
                if segment == TEMPLATE_SLOT {
                    node.template
                } else {
                    let position: usize = segment.parse().ok()?;
                    node.children.get(position).copied()
                }
            }
            FieldKind::Compound => self.child_by_name(idx, segment),
            FieldKind::Scalar => None,
        }
    }

    /// Dotted path of a node from the root. Empty for the root itself.
    pub fn path_of(&self, idx: Index) -> String {
        let mut segments = Vec::new();
        let mut current = Some(idx);
        while let Some(i) = current {
            if i == self.root {
                break;
            }
            match self.get(i) {
                Some(node) => {
                    segments.push(node.name.clone());
                    current = node.parent;
                }
                None => break,
            }
        }
        segments.reverse();
        segments.join(".")
    }

    fn display_name(&self, idx: Index) -> String {
        if idx == self.root {
            "the form".to_string()
        } else {
            format!("'{}'", self.path_of(idx))
        }
    }

    /// Children of `idx` sorted by (order, creation sequence).
    pub fn sorted_children(&self, idx: Index) -> Vec<Index> {
        self.children_of(idx)
            .iter()
            .copied()
            .sorted_by_key(|&child| {
                self.get(child)
                    .map(|n| (n.order, n.seq))
                    .unwrap_or((i64::MAX, u64::MAX))
            })
            .collect()
    }

    /// True when any scalar in the subtree holds a value.
    pub fn subtree_has_value(&self, idx: Index) -> bool {
        let Some(node) = self.get(idx) else {
            return false;
        };
        match node.kind {
            FieldKind::Scalar => node.value.is_some(),
            _ => node
                .children
                .iter()
                .any(|&child| self.subtree_has_value(child)),
        }
    }

    /// Preorder traversal over every node, templates included.
    pub fn iter(&self) -> FieldIter {
        FieldIter::new(self)
    }

    pub(crate) fn clear_values(&mut self) {
        for (_, node) in self.arena.iter_mut() {
            node.input = None;
            node.value = None;
        }
    }

    pub(crate) fn clear_errors(&mut self) {
        for (_, node) in self.arena.iter_mut() {
            node.errors.clear();
        }
    }

    /// Drops the instances of every repeatable, keeping templates. Instances
    /// belong to one loaded input, not to the declared structure.
    pub(crate) fn clear_instances(&mut self) {
        let repeatables: Vec<Index> = self
            .iter()
            .filter(|(_, node)| node.kind == FieldKind::Repeatable)
            .map(|(idx, _)| idx)
            .collect();
        for idx in repeatables {
            // Nested repeatables may already be gone with their owner.
            if self.get(idx).is_some() {
                self.clear_children(idx);
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.calculate_depth(self.root)
    }

    fn calculate_depth(&self, idx: Index) -> usize {
        match self.get(idx) {
            Some(node) => {
                1 + node
                    .children
                    .iter()
                    .map(|&child| self.calculate_depth(child))
                    .max()
                    .unwrap_or(0)
            }
            None => 0,
        }
    }

    /// Renders the tree for diagnostics, children in presentation order.
    pub fn to_display_tree(&self) -> Tree<String> {
        self.render(self.root)
    }

    fn render(&self, idx: Index) -> Tree<String> {
        let Some(node) = self.get(idx) else {
            return Tree::new("?".to_string());
        };
        let mut leaves = Vec::new();
        if let Some(tpl) = node.template {
            leaves.push(self.render(tpl));
        }
        for child in self.sorted_children(idx) {
            leaves.push(self.render(child));
        }
        Tree::new(self.label(node, idx)).with_leaves(leaves)
    }

    fn label(&self, node: &FieldNode, idx: Index) -> String {
        if idx == self.root {
            return "(form)".to_string();
        }
        let mut text = node.to_string();
        if node.required {
            text.push('*');
        }
        if let Some(value) = &node.value {
            text.push_str(&format!(" = {}", value));
        }
        if node.has_errors() {
            text.push_str(&format!(" !{}", node.errors.join("; ")));
        }
        text
    }
}

impl Default for FieldArena {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FieldIter<'a> {
    arena: &'a FieldArena,
    stack: Vec<Index>,
}

impl<'a> FieldIter<'a> {
    fn new(arena: &'a FieldArena) -> Self {
        Self {
            arena,
            stack: vec![arena.root()],
        }
    }
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = (Index, &'a FieldNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.arena.get(current) {
                // Children in reverse so the leftmost pops first; template
                // pushed last so it is visited before the instances.
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                if let Some(tpl) = node.template {
                    self.stack.push(tpl);
                }
                return Some((current, node));
            }
        }
        None
    }
}
