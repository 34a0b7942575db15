//! Mutation batching and reduction
//!
//! A [`MutationSession`] observes one root (the document or a shadow root)
//! and, on flush, reduces the queued host change records into a single
//! [`MutationPayload`]:
//!
//! - records whose target is gone, unknown or hidden are dropped
//! - a node added and removed within the batch produces nothing
//! - added nodes are serialized ancestors first, later siblings first, so
//!   every `next_id` refers to a node the renderer already has
//! - nodes already emitted by this batch are not repeated in attribute or
//!   text changes
//! - attribute and text changes that end up at their original value are
//!   dropped

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::dom::{Document, MutationRecord, NodeKey, ObserverId};
use crate::types::{
    AddedNodeMutation, AttributeMutation, MutationPayload, NodeId, RemovedNodeMutation,
    TextMutation,
};

use super::identity::IdentityRegistry;
use super::privacy::{self, PrivacyLevel, RedactionPolicy};
use super::serialize::{IgnoreList, SerializationContext, SerializationStatus, Snapshotter};

/// Shadow roots entering or leaving the recorded tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowRootChange {
    Added(NodeKey),
    Removed(NodeKey),
}

/// Result of reducing one batch
#[derive(Debug, Default)]
pub struct MutationOutcome {
    /// `None` when nothing survived the reduction
    pub payload: Option<MutationPayload>,
    pub shadow_changes: Vec<ShadowRootChange>,
}

/// Collaborators lent to a session for the duration of a flush
pub struct MutationContext<'a> {
    pub registry: &'a mut IdentityRegistry,
    pub policy: &'a RedactionPolicy,
    pub ignore: &'a IgnoreList,
}

/// Change observation scoped to one root
#[derive(Debug)]
pub struct MutationSession {
    root: NodeKey,
    observer: Option<ObserverId>,
}

impl MutationSession {
    pub fn start(doc: &mut Document, root: NodeKey) -> Self {
        let observer = doc.observe(root);
        debug!(root = %root, "mutation session started");
        Self {
            root,
            observer: Some(observer),
        }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn is_active(&self) -> bool {
        self.observer.is_some()
    }

    /// Reduce every pending record
    pub fn flush(&mut self, doc: &mut Document, cx: &mut MutationContext<'_>) -> MutationOutcome {
        let Some(observer) = self.observer else {
            return MutationOutcome::default();
        };
        let records = doc.take_records(observer);
        if records.is_empty() {
            return MutationOutcome::default();
        }
        let record_count = records.len();
        let outcome = reduce_mutations(doc, self.root, records, cx);
        if let Some(payload) = &outcome.payload {
            debug!(
                root = %self.root,
                records = record_count,
                adds = payload.adds.len(),
                removes = payload.removes.len(),
                attributes = payload.attributes.len(),
                texts = payload.texts.len(),
                "mutations reduced"
            );
        }
        outcome
    }

    /// Disconnect the observer; pending records are discarded
    pub fn stop(&mut self, doc: &mut Document) {
        if let Some(observer) = self.observer.take() {
            doc.disconnect(observer);
            debug!(root = %self.root, "mutation session stopped");
        }
    }
}

/// Reduce a batch of host records observed under `root`
pub fn reduce_mutations(
    doc: &Document,
    root: NodeKey,
    records: Vec<MutationRecord>,
    cx: &mut MutationContext<'_>,
) -> MutationOutcome {
    // Taken before filtering: a node removed from a subtree that was itself
    // removed later in the batch only shows up under a detached target
    let removed_anywhere = removed_nodes(&records);
    let records: Vec<MutationRecord> = records
        .into_iter()
        .filter(|record| {
            let target = record.target();
            doc.is_connected_to(target, root)
                && is_node_and_ancestors_serialized(doc, target, cx.registry)
                && cx.policy.effective_level(doc, target) != PrivacyLevel::Hidden
        })
        .collect();

    let snapshotter = Snapshotter::new(doc, cx.policy, cx.ignore);
    let mut serialization = SerializationContext::new(cx.registry, SerializationStatus::Mutation);

    let (adds, removed) =
        process_child_list(doc, root, &records, cx.policy, &snapshotter, &mut serialization);
    let removes: Vec<RemovedNodeMutation> = removed
        .iter()
        .filter_map(|(node, parent)| {
            Some(RemovedNodeMutation {
                parent_id: serialization.registry.id_of(*parent)?,
                id: serialization.registry.id_of(*node)?,
            })
        })
        .collect();
    let attributes = process_attributes(doc, &records, cx.policy, &serialization);
    let texts = process_characters(doc, &records, cx.policy, &mut serialization);

    let mut shadow_changes: Vec<ShadowRootChange> = serialization
        .shadow_roots
        .iter()
        .map(|shadow| ShadowRootChange::Added(*shadow))
        .collect();

    // Subtrees that left the document for good lose their ids
    for node in removed_anywhere {
        if doc.is_connected(node) {
            continue;
        }
        let subtree = doc.inclusive_descendants(node);
        shadow_changes.extend(
            subtree
                .iter()
                .filter(|key| doc.is_shadow_root(**key))
                .map(|key| ShadowRootChange::Removed(*key)),
        );
        serialization.registry.release_subtree(subtree);
    }

    let payload = MutationPayload {
        adds,
        removes,
        attributes,
        texts,
    };
    MutationOutcome {
        payload: (!payload.is_empty()).then_some(payload),
        shadow_changes,
    }
}

/// Every node removed by the batch, once, in record order
fn removed_nodes(records: &[MutationRecord]) -> Vec<NodeKey> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| match record {
            MutationRecord::ChildList { removed, .. } => Some(removed),
            _ => None,
        })
        .flatten()
        .copied()
        .filter(|node| seen.insert(*node))
        .collect()
}

fn is_node_and_ancestors_serialized(
    doc: &Document,
    node: NodeKey,
    registry: &IdentityRegistry,
) -> bool {
    let mut current = Some(node);
    while let Some(key) = current {
        if !registry.is_serialized(key) {
            return false;
        }
        current = doc.parent(key);
    }
    true
}

type RemovedNodes = Vec<(NodeKey, NodeKey)>;

fn process_child_list(
    doc: &Document,
    root: NodeKey,
    records: &[MutationRecord],
    policy: &RedactionPolicy,
    snapshotter: &Snapshotter<'_>,
    serialization: &mut SerializationContext<'_>,
) -> (Vec<AddedNodeMutation>, RemovedNodes) {
    let mut added: HashSet<NodeKey> = HashSet::new();
    let mut removed: RemovedNodes = Vec::new();
    let mut removed_seen: HashSet<NodeKey> = HashSet::new();

    for record in records {
        let MutationRecord::ChildList {
            target,
            added: added_nodes,
            removed: removed_nodes,
        } = record
        else {
            continue;
        };
        added.extend(added_nodes.iter().copied());
        for node in removed_nodes {
            if !added.remove(node) && removed_seen.insert(*node) {
                // The parent captured by the first removal wins
                removed.push((*node, *target));
            }
        }
    }

    let mut nodes: Vec<NodeKey> = added
        .into_iter()
        .filter(|node| doc.is_connected_to(*node, root))
        .collect();
    sort_added_and_moved_nodes(doc, &mut nodes);

    let mut adds = Vec::new();
    for node in nodes {
        if serialization.has_been_serialized(node) {
            continue;
        }
        let Some(parent) = doc.parent(node) else {
            continue;
        };
        let Some(parent_id) = serialization.registry.id_of(parent) else {
            continue;
        };
        let parent_level = policy.effective_level(doc, parent);
        if parent_level == PrivacyLevel::Hidden {
            continue;
        }
        let Some(serialized) = snapshotter.serialize_node(node, parent_level, serialization) else {
            continue;
        };
        adds.push(AddedNodeMutation {
            parent_id,
            next_id: next_sibling_id(doc, node, serialization.registry),
            node: serialized,
        });
    }

    (adds, removed)
}

/// Id of the nearest following sibling the renderer knows
fn next_sibling_id(doc: &Document, node: NodeKey, registry: &IdentityRegistry) -> Option<NodeId> {
    doc.following_siblings(node)
        .iter()
        .find_map(|sibling| registry.id_of(*sibling))
}

/// Order nodes so ancestors come before descendants and later siblings before
/// earlier ones (reverse post-order)
pub fn sort_added_and_moved_nodes(doc: &Document, nodes: &mut Vec<NodeKey>) {
    let mut keyed: Vec<(Vec<usize>, NodeKey)> = nodes
        .iter()
        .map(|node| (doc.path_from_root(*node), *node))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare_paths(a, b));
    *nodes = keyed.into_iter().map(|(_, node)| node).collect();
}

fn compare_paths(a: &[usize], b: &[usize]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return y.cmp(x);
        }
    }
    a.len().cmp(&b.len())
}

fn process_attributes(
    doc: &Document,
    records: &[MutationRecord],
    policy: &RedactionPolicy,
    serialization: &SerializationContext<'_>,
) -> Vec<AttributeMutation> {
    let mut seen: HashSet<(NodeKey, &str)> = HashSet::new();
    let mut mutations: Vec<AttributeMutation> = Vec::new();
    let mut index_by_node: HashMap<NodeKey, usize> = HashMap::new();

    for record in records {
        let MutationRecord::Attributes {
            target,
            name,
            old_value,
        } = record
        else {
            continue;
        };
        // The first record of a batch holds the value the renderer has
        if !seen.insert((*target, name.as_str())) {
            continue;
        }
        if serialization.has_been_serialized(*target) {
            continue;
        }
        let current = doc.attribute(*target, name);
        if current == old_value.as_deref() {
            continue;
        }
        let Some(id) = serialization.registry.id_of(*target) else {
            continue;
        };
        let tag_name = doc.tag_name(*target).unwrap_or_default();
        let level = policy.effective_level(doc, *target);
        let value = match current {
            None => None,
            Some(_) if name == "value" && privacy::is_form_control(tag_name) => {
                match policy.input_value(doc, *target, level) {
                    Some(value) => Some(value),
                    None => continue,
                }
            }
            Some(value) => match privacy::redact_attribute(tag_name, name, value, level) {
                Some(value) => Some(value),
                None => continue,
            },
        };

        let index = *index_by_node.entry(*target).or_insert_with(|| {
            mutations.push(AttributeMutation {
                id,
                attributes: Default::default(),
            });
            mutations.len() - 1
        });
        mutations[index].attributes.insert(name.clone(), value);
    }

    mutations
}

fn process_characters(
    doc: &Document,
    records: &[MutationRecord],
    policy: &RedactionPolicy,
    serialization: &mut SerializationContext<'_>,
) -> Vec<TextMutation> {
    let mut seen: HashSet<NodeKey> = HashSet::new();
    let mut texts = Vec::new();

    for record in records {
        let MutationRecord::CharacterData { target } = record else {
            continue;
        };
        if !seen.insert(*target) || serialization.has_been_serialized(*target) {
            continue;
        }
        let Some(id) = serialization.registry.id_of(*target) else {
            continue;
        };
        let current = doc.text(*target).unwrap_or_default();
        if serialization.registry.last_text(id) == Some(current) {
            continue;
        }
        let Some(parent) = doc.parent(*target) else {
            continue;
        };
        let parent_level = policy.effective_level(doc, parent);
        let Some(value) = policy.text_content(doc, *target, parent_level) else {
            continue;
        };
        serialization.registry.record_text(id, current);
        texts.push(TextMutation { id, value });
    }

    texts
}
