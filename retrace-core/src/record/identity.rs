//! Node identity registry
//!
//! Maps live host nodes to the stable ids used in the record stream. Ids are
//! handed out from a monotonic counter and never reused: releasing a node
//! drops its entry, and a later `assign` for the same node yields a new id.

use std::collections::HashMap;

use crate::dom::NodeKey;
use crate::types::NodeId;

/// Metadata kept for every serialized node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub node: NodeKey,
    /// Last character data reported for text-like nodes
    pub last_text: Option<String>,
}

#[derive(Debug, Default)]
pub struct IdentityRegistry {
    next_id: u32,
    ids: HashMap<NodeKey, NodeId>,
    entries: HashMap<NodeId, NodeEntry>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Id of `node`, assigning a fresh one on first sight
    pub fn assign(&mut self, node: NodeKey) -> NodeId {
        if let Some(id) = self.ids.get(&node) {
            return *id;
        }
        let id = NodeId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.ids.insert(node, id);
        self.entries.insert(
            id,
            NodeEntry {
                node,
                last_text: None,
            },
        );
        id
    }

    pub fn id_of(&self, node: NodeKey) -> Option<NodeId> {
        self.ids.get(&node).copied()
    }

    pub fn node_of(&self, id: NodeId) -> Option<NodeKey> {
        self.entries.get(&id).map(|entry| entry.node)
    }

    pub fn is_serialized(&self, node: NodeKey) -> bool {
        self.ids.contains_key(&node)
    }

    /// Forget `node`; its id stays burnt
    pub fn release(&mut self, node: NodeKey) -> Option<NodeId> {
        let id = self.ids.remove(&node)?;
        self.entries.remove(&id);
        Some(id)
    }

    /// Forget every node of a removed subtree, returning how many were known
    pub fn release_subtree(&mut self, nodes: impl IntoIterator<Item = NodeKey>) -> usize {
        nodes
            .into_iter()
            .filter_map(|node| self.release(node))
            .count()
    }

    pub fn last_text(&self, id: NodeId) -> Option<&str> {
        self.entries.get(&id)?.last_text.as_deref()
    }

    pub fn record_text(&mut self, id: NodeId, text: &str) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.last_text = Some(text.to_string());
        }
    }

    pub fn entry(&self, id: NodeId) -> Option<&NodeEntry> {
        self.entries.get(&id)
    }

    /// Number of live mappings
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
