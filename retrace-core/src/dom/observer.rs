//! Change notification primitive
//!
//! An observer watches one root and queues a record for every change whose
//! target lives in that root's tree. Shadow trees are separate trees: an
//! observer on the document does not see changes inside a shadow root.

use super::{Document, NodeKey};

/// Handle returned by [`Document::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

/// One queued change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// Children were inserted into or removed from `target`
    ChildList {
        target: NodeKey,
        added: Vec<NodeKey>,
        removed: Vec<NodeKey>,
    },

    /// Attribute `name` of `target` changed; `old_value` is the value before
    Attributes {
        target: NodeKey,
        name: String,
        old_value: Option<String>,
    },

    /// Character data of `target` changed
    CharacterData { target: NodeKey },
}

impl MutationRecord {
    /// Node the change happened on
    pub fn target(&self) -> NodeKey {
        match self {
            Self::ChildList { target, .. }
            | Self::Attributes { target, .. }
            | Self::CharacterData { target } => *target,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Observer {
    pub(crate) root: NodeKey,
    pub(crate) queue: Vec<MutationRecord>,
}

impl Document {
    /// Start observing every change under `root`
    pub fn observe(&mut self, root: NodeKey) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.insert(
            id,
            Observer {
                root,
                queue: Vec::new(),
            },
        );
        id
    }

    /// Stop an observer and drop its pending records. Unknown ids are ignored.
    pub fn disconnect(&mut self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    /// Drain the records queued for an observer
    pub fn take_records(&mut self, id: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .get_mut(&id)
            .map(|observer| std::mem::take(&mut observer.queue))
            .unwrap_or_default()
    }

    /// Number of records waiting for an observer
    pub fn pending_records(&self, id: ObserverId) -> usize {
        self.observers
            .get(&id)
            .map(|observer| observer.queue.len())
            .unwrap_or(0)
    }

    pub(crate) fn queue_mutation(&mut self, record: MutationRecord) {
        let tree_root = self.tree_root(record.target());
        for observer in self.observers.values_mut() {
            if observer.root == tree_root {
                observer.queue.push(record.clone());
            }
        }
    }
}
