//! The global namespace registry.
//!
//! Namespaces form a tree held in an arena: nodes are addressed by
//! [`NamespaceId`] handles and store their parent as an optional
//! handle, which keeps `full_name`'s walk-to-root cheap and avoids
//! ownership cycles. Top-level namespaces are registered by name;
//! re-registering a name (a repeated `using`) overwrites with a logged
//! warning, not an error.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::runtime::value::Value;

/// Arena handle of a namespace node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceId(usize);

/// What a `Value::Namespace` carries: the handle plus the full dotted
/// name captured at creation (namespaces are never renamed).
#[derive(Debug, Clone)]
pub struct NamespaceRef {
    pub id: NamespaceId,
    pub name: String,
}

impl PartialEq for NamespaceRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

struct Node {
    name: String,
    parent: Option<NamespaceId>,
    entries: BTreeMap<String, Value>,
}

pub struct NamespaceTree {
    nodes: Vec<Node>,
    roots: BTreeMap<String, NamespaceId>,
}

impl NamespaceTree {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), roots: BTreeMap::new() }
    }

    /// Create a node. Top-level namespaces are made visible with
    /// [`register_root`](Self::register_root).
    pub fn create(&mut self, name: impl Into<String>, parent: Option<NamespaceId>) -> NamespaceId {
        let id = NamespaceId(self.nodes.len());
        self.nodes.push(Node { name: name.into(), parent, entries: BTreeMap::new() });
        id
    }

    /// Register a node as a top-level namespace. Overwrites any
    /// existing registration of the same name.
    pub fn register_root(&mut self, id: NamespaceId) {
        let name = self.node(id).name.clone();
        if let Some(previous) = self.roots.insert(name.clone(), id) {
            if previous != id {
                warn!(namespace = %name, "overwriting previously registered namespace");
            }
        }
    }

    pub fn root(&self, name: &str) -> Option<NamespaceId> {
        self.roots.get(name).copied()
    }

    pub fn has_root(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    pub fn root_names(&self) -> Vec<String> {
        self.roots.keys().cloned().collect()
    }

    /// Unregister a top-level name (for-loop shadowing). The node
    /// stays alive in the arena; [`restore_root`](Self::restore_root)
    /// puts the binding back.
    pub fn remove_root(&mut self, name: &str) -> Option<NamespaceId> {
        self.roots.remove(name)
    }

    pub fn restore_root(&mut self, name: impl Into<String>, id: NamespaceId) {
        self.roots.insert(name.into(), id);
    }

    pub fn name(&self, id: NamespaceId) -> &str {
        &self.node(id).name
    }

    /// Dotted name from the root down to this node.
    pub fn full_name(&self, id: NamespaceId) -> String {
        let mut parts = vec![self.node(id).name.clone()];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            parts.push(self.node(parent).name.clone());
            current = self.node(parent).parent;
        }
        parts.reverse();
        parts.join(".")
    }

    /// The value a namespace presents when used as data.
    pub fn value_of(&self, id: NamespaceId) -> Value {
        Value::Namespace(NamespaceRef { id, name: self.full_name(id) })
    }

    /// Insert or overwrite a local binding.
    pub fn set(&mut self, id: NamespaceId, name: impl Into<String>, value: Value) {
        self.node_mut(id).entries.insert(name.into(), value);
    }

    /// Fetch a local binding. Callers must check
    /// [`exists`](Self::exists) first; a miss is a programming error.
    pub fn get(&self, id: NamespaceId, name: &str) -> Value {
        match self.node(id).entries.get(name) {
            Some(v) => v.clone(),
            None => panic!("namespace `{}` has no entry `{name}`", self.full_name(id)),
        }
    }

    pub fn exists(&self, id: NamespaceId, name: &str) -> bool {
        self.node(id).entries.contains_key(name)
    }

    /// Non-panicking lookup, for the evaluator's resolution path.
    pub fn entry(&self, id: NamespaceId, name: &str) -> Option<&Value> {
        self.node(id).entries.get(name)
    }

    pub fn entry_mut(&mut self, id: NamespaceId, name: &str) -> Option<&mut Value> {
        self.node_mut(id).entries.get_mut(name)
    }

    /// Local names of a node, for discoverability diagnostics.
    pub fn local_names(&self, id: NamespaceId) -> Vec<String> {
        self.node(id).entries.keys().cloned().collect()
    }

    /// Every fully dotted name reachable from this node, recursing into
    /// nested namespaces.
    pub fn list_names(&self, id: NamespaceId) -> Vec<String> {
        let prefix = self.full_name(id);
        let mut out = Vec::new();
        for (name, value) in &self.node(id).entries {
            match value {
                Value::Namespace(inner) => out.extend(self.list_names(inner.id)),
                _ => out.push(format!("{prefix}.{name}")),
            }
        }
        out
    }

    fn node(&self, id: NamespaceId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NamespaceId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NamespaceTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceTree")
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots.keys().collect::<Vec<_>>())
            .finish()
    }
}
