//! Ancillary observers: scroll, media, viewport, input, mouse and focus
//!
//! Host events are queued by the document listeners and turned into records
//! at flush time. Scroll and viewport events are coalesced to their last
//! value, mouse positions are batched into one record per flush, and input
//! states are deduplicated against the last state emitted for each node.

use std::collections::HashMap;

use tracing::trace;

use crate::config::RecorderFeatures;
use crate::dom::{DispatchedEvent, Document, EventKind, HostEvent, ListenerId, NodeKey};
use crate::types::{
    IncrementalData, InputState, MediaInteraction, MediaInteractionType, MousePosition, NodeId,
    ScrollPosition, ViewportDimension,
};

use super::identity::IdentityRegistry;
use super::privacy::{PrivacyLevel, RedactionPolicy};

/// Output of the observers, stamped with the host event time
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Incremental { data: IncrementalData, timestamp: i64 },
    Focus { has_focus: bool, timestamp: i64 },
}

#[derive(Debug)]
pub struct EventObservers {
    listener: Option<ListenerId>,
    input_listener: Option<ListenerId>,
    last_inputs: HashMap<NodeId, InputState>,
}

impl EventObservers {
    /// Install the document listeners enabled by `features`
    pub fn start(doc: &mut Document, features: &RecorderFeatures) -> Self {
        let mut kinds = Vec::new();
        if features.scroll {
            kinds.push(EventKind::Scroll);
        }
        if features.media {
            kinds.push(EventKind::Media);
        }
        if features.viewport_resize {
            kinds.push(EventKind::Resize);
        }
        if features.mouse_move {
            kinds.push(EventKind::MouseMove);
        }
        if features.focus {
            kinds.push(EventKind::Focus);
        }
        let root = doc.root();
        let listener = (!kinds.is_empty()).then(|| doc.listen(root, &kinds));
        let input_listener = features
            .input
            .then(|| doc.listen(root, &[EventKind::Input]));
        Self {
            listener,
            input_listener,
            last_inputs: HashMap::new(),
        }
    }

    /// Drain queued events and turn them into observations.
    ///
    /// `extra_events` carries events collected on shadow roots.
    pub fn collect(
        &mut self,
        doc: &mut Document,
        extra_events: Vec<DispatchedEvent>,
        registry: &IdentityRegistry,
        policy: &RedactionPolicy,
    ) -> Vec<Observation> {
        // Ids are never reused, so a released id will not come back
        self.last_inputs
            .retain(|id, _| registry.node_of(*id).is_some());

        let mut events = Vec::new();
        for listener in [self.listener, self.input_listener].into_iter().flatten() {
            events.extend(doc.take_events(listener));
        }
        events.extend(extra_events);
        if events.is_empty() {
            return Vec::new();
        }
        events.sort_by_key(|event| event.timestamp);

        let mut observations = Vec::new();
        let mut scrolls: Vec<(ScrollPosition, i64)> = Vec::new();
        let mut resize: Option<(ViewportDimension, i64)> = None;
        let mut mouse: Vec<(MousePosition, i64)> = Vec::new();

        for DispatchedEvent { event, timestamp } in events {
            match event {
                HostEvent::Scroll { target } => {
                    let Some(id) = visible_id(doc, target, registry, policy) else {
                        continue;
                    };
                    let offset = doc.scroll_offset(target);
                    let position = ScrollPosition {
                        id,
                        x: offset.left,
                        y: offset.top,
                    };
                    match scrolls.iter_mut().find(|(existing, _)| existing.id == id) {
                        Some(entry) => *entry = (position, timestamp),
                        None => scrolls.push((position, timestamp)),
                    }
                }
                HostEvent::Play { target } | HostEvent::Pause { target } => {
                    let Some(id) = visible_id(doc, target, registry, policy) else {
                        continue;
                    };
                    let kind = match event {
                        HostEvent::Play { .. } => MediaInteractionType::Play,
                        _ => MediaInteractionType::Pause,
                    };
                    observations.push(Observation::Incremental {
                        data: IncrementalData::MediaInteraction(MediaInteraction { id, kind }),
                        timestamp,
                    });
                }
                HostEvent::Input { target } => {
                    if let Some(state) = self.input_state(doc, target, registry, policy) {
                        observations.push(Observation::Incremental {
                            data: IncrementalData::Input(state),
                            timestamp,
                        });
                    }
                }
                HostEvent::Resize { width, height } => {
                    resize = Some((ViewportDimension { width, height }, timestamp));
                }
                HostEvent::MouseMove { target, x, y } => {
                    let Some(id) = visible_id(doc, target, registry, policy) else {
                        continue;
                    };
                    mouse.push((
                        MousePosition {
                            id,
                            x,
                            y,
                            time_offset: 0,
                        },
                        timestamp,
                    ));
                }
                HostEvent::Focus { has_focus } => {
                    observations.push(Observation::Focus {
                        has_focus,
                        timestamp,
                    });
                }
            }
        }

        observations.extend(scrolls.into_iter().map(|(position, timestamp)| {
            Observation::Incremental {
                data: IncrementalData::Scroll(position),
                timestamp,
            }
        }));
        if let Some((dimension, timestamp)) = resize {
            observations.push(Observation::Incremental {
                data: IncrementalData::ViewportResize(dimension),
                timestamp,
            });
        }
        if let Some((_, last)) = mouse.last().copied() {
            let positions = mouse
                .into_iter()
                .map(|(position, timestamp)| MousePosition {
                    time_offset: timestamp - last,
                    ..position
                })
                .collect();
            observations.push(Observation::Incremental {
                data: IncrementalData::MouseMove { positions },
                timestamp: last,
            });
        }

        trace!(observations = observations.len(), "host events collected");
        observations
    }

    /// Redacted state of a form control, unless unchanged since last emitted
    fn input_state(
        &mut self,
        doc: &Document,
        target: NodeKey,
        registry: &IdentityRegistry,
        policy: &RedactionPolicy,
    ) -> Option<InputState> {
        let id = visible_id(doc, target, registry, policy)?;
        let element = doc.element(target)?;
        let level = policy.effective_level(doc, target);
        let state = if element.is_checkable() {
            // Checked state is user input as well
            if level != PrivacyLevel::Allow {
                return None;
            }
            InputState {
                id,
                text: None,
                is_checked: Some(element.checked),
            }
        } else {
            InputState {
                id,
                text: Some(policy.input_value(doc, target, level)?),
                is_checked: None,
            }
        };
        if self.last_inputs.get(&id) == Some(&state) {
            return None;
        }
        self.last_inputs.insert(id, state.clone());
        Some(state)
    }

    /// Forget emitted input states; a full snapshot carries current values
    pub fn reset_inputs(&mut self) {
        self.last_inputs.clear();
    }

    /// Remove the document listeners
    pub fn stop(&mut self, doc: &mut Document) {
        for listener in [self.listener.take(), self.input_listener.take()]
            .into_iter()
            .flatten()
        {
            doc.unlisten(listener);
        }
    }
}

/// Id of a serialized, non-hidden node
fn visible_id(
    doc: &Document,
    node: NodeKey,
    registry: &IdentityRegistry,
    policy: &RedactionPolicy,
) -> Option<NodeId> {
    let id = registry.id_of(node)?;
    (policy.effective_level(doc, node) != PrivacyLevel::Hidden).then_some(id)
}
