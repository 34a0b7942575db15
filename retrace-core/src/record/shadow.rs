//! Per-shadow-root recording sessions
//!
//! Every shadow root met by the snapshotter or by a mutation gets its own
//! [`MutationSession`] and input listener, since host change notifications
//! and non-composed events never cross a shadow boundary.

use std::collections::BTreeMap;

use tracing::debug;

use crate::dom::{DispatchedEvent, Document, EventKind, ListenerId, NodeKey};
use crate::types::MutationPayload;

use super::mutation::{MutationContext, MutationSession, ShadowRootChange};

#[derive(Debug)]
struct ShadowSession {
    mutations: MutationSession,
    input_listener: Option<ListenerId>,
}

impl ShadowSession {
    fn stop(&mut self, doc: &mut Document) {
        self.mutations.stop(doc);
        if let Some(listener) = self.input_listener.take() {
            doc.unlisten(listener);
        }
    }
}

/// Sessions keyed by shadow root, in creation order
#[derive(Debug, Default)]
pub struct ShadowController {
    sessions: BTreeMap<NodeKey, ShadowSession>,
    track_input: bool,
}

impl ShadowController {
    pub fn new(track_input: bool) -> Self {
        Self {
            sessions: BTreeMap::new(),
            track_input,
        }
    }

    /// Start recording `root`. Already tracked roots are left alone.
    pub fn add_shadow_root(&mut self, doc: &mut Document, root: NodeKey) {
        if self.sessions.contains_key(&root) {
            return;
        }
        let mutations = MutationSession::start(doc, root);
        let input_listener = self
            .track_input
            .then(|| doc.listen(root, &[EventKind::Input]));
        self.sessions.insert(
            root,
            ShadowSession {
                mutations,
                input_listener,
            },
        );
        debug!(shadow_root = %root, sessions = self.sessions.len(), "shadow root added");
    }

    /// Stop recording `root`; unknown roots are ignored
    pub fn remove_shadow_root(&mut self, doc: &mut Document, root: NodeKey) {
        if let Some(mut session) = self.sessions.remove(&root) {
            session.stop(doc);
            debug!(shadow_root = %root, sessions = self.sessions.len(), "shadow root removed");
        }
    }

    /// Apply shadow root changes reported by a reduction
    pub fn apply(&mut self, doc: &mut Document, changes: &[ShadowRootChange]) {
        for change in changes {
            match *change {
                ShadowRootChange::Added(root) => self.add_shadow_root(doc, root),
                ShadowRootChange::Removed(root) => self.remove_shadow_root(doc, root),
            }
        }
    }

    /// Flush every session and return the non-empty payloads in root order
    pub fn flush(&mut self, doc: &mut Document, cx: &mut MutationContext<'_>) -> Vec<MutationPayload> {
        let mut payloads = Vec::new();
        let mut changes = Vec::new();
        for session in self.sessions.values_mut() {
            let outcome = session.mutations.flush(doc, cx);
            payloads.extend(outcome.payload);
            changes.extend(outcome.shadow_changes);
        }
        self.apply(doc, &changes);
        payloads
    }

    /// Drain input events queued on every shadow root
    pub fn take_input_events(&mut self, doc: &mut Document) -> Vec<DispatchedEvent> {
        self.sessions
            .values()
            .filter_map(|session| session.input_listener)
            .flat_map(|listener| doc.take_events(listener))
            .collect()
    }

    /// Stop and forget every session
    pub fn stop(&mut self, doc: &mut Document) {
        for (_, mut session) in std::mem::take(&mut self.sessions) {
            session.stop(doc);
        }
    }

    pub fn is_tracking(&self, root: NodeKey) -> bool {
        self.sessions.contains_key(&root)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
