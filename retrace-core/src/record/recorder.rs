//! Recorder facade
//!
//! Owns the identity registry, the document mutation session, the shadow
//! controller and the ancillary observers, and drives them from `flush`.

use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::dom::Document;
use crate::types::{FullSnapshotData, IncrementalData, InitialOffset, MetaData};

use super::emitter::{RecordEmitter, RecordSink, now_ms};
use super::identity::IdentityRegistry;
use super::mutation::{MutationContext, MutationSession};
use super::observers::{EventObservers, Observation};
use super::privacy::RedactionPolicy;
use super::serialize::{IgnoreList, SerializationContext, SerializationStatus, Snapshotter};
use super::shadow::ShadowController;

/// Start recording `doc` into `sink`
pub fn start_recording<S: RecordSink>(doc: &mut Document, config: RecorderConfig, sink: S) -> Recorder<S> {
    Recorder::start(doc, config, sink)
}

/// Live recording of one document
#[derive(Debug)]
pub struct Recorder<S: RecordSink> {
    config: RecorderConfig,
    registry: IdentityRegistry,
    policy: RedactionPolicy,
    ignore: IgnoreList,
    document_session: MutationSession,
    shadows: ShadowController,
    observers: EventObservers,
    emitter: RecordEmitter<S>,
    stopped: bool,
}

impl<S: RecordSink> Recorder<S> {
    /// Emit Meta and FullSnapshot, then start observing the document and
    /// every shadow root found in it
    pub fn start(doc: &mut Document, config: RecorderConfig, sink: S) -> Self {
        let root = doc.root();
        let document_session = MutationSession::start(doc, root);
        let observers = EventObservers::start(doc, &config.features);
        let mut recorder = Self {
            policy: RedactionPolicy::new(config.default_privacy_level),
            ignore: IgnoreList::new(&config.ignored_tags),
            registry: IdentityRegistry::new(),
            document_session,
            shadows: ShadowController::new(config.features.input),
            observers,
            emitter: RecordEmitter::new(sink),
            stopped: false,
            config,
        };
        recorder.take_full_snapshot(doc, SerializationStatus::InitialFullSnapshot);
        info!(
            href = %doc.url(),
            privacy = %recorder.config.default_privacy_level,
            shadow_roots = recorder.shadows.len(),
            "recording started"
        );
        recorder
    }

    fn take_full_snapshot(&mut self, doc: &mut Document, status: SerializationStatus) {
        let timestamp = now_ms();
        let (node, shadow_roots) = {
            let snapshotter = Snapshotter::new(doc, &self.policy, &self.ignore);
            let mut cx = SerializationContext::new(&mut self.registry, status);
            let node = snapshotter.serialize(doc.root(), &mut cx);
            (node, cx.shadow_roots)
        };
        let Some(node) = node else {
            warn!("document could not be serialized");
            return;
        };

        let viewport = doc.viewport();
        let offset = doc.scroll_offset(doc.root());
        self.emitter.emit_full_snapshot(
            MetaData {
                href: doc.url().to_string(),
                width: viewport.width,
                height: viewport.height,
            },
            FullSnapshotData {
                node,
                initial_offset: InitialOffset {
                    left: offset.left,
                    top: offset.top,
                },
            },
            timestamp,
        );
        if self.config.features.focus {
            self.emitter.emit_focus(doc.has_focus(), timestamp);
        }
        for shadow_root in shadow_roots {
            self.shadows.add_shadow_root(doc, shadow_root);
        }
    }

    /// Reduce pending mutations, then drain the ancillary observers
    pub fn flush(&mut self, doc: &mut Document) {
        if self.stopped {
            return;
        }
        let timestamp = now_ms();
        let mut cx = MutationContext {
            registry: &mut self.registry,
            policy: &self.policy,
            ignore: &self.ignore,
        };

        let outcome = self.document_session.flush(doc, &mut cx);
        self.shadows.apply(doc, &outcome.shadow_changes);
        let mut payloads: Vec<_> = outcome.payload.into_iter().collect();
        payloads.extend(self.shadows.flush(doc, &mut cx));

        for payload in payloads {
            self.emitter
                .emit_incremental(IncrementalData::Mutation(payload), timestamp);
        }

        let shadow_events = self.shadows.take_input_events(doc);
        let observations = self
            .observers
            .collect(doc, shadow_events, &self.registry, &self.policy);
        for observation in observations {
            match observation {
                Observation::Incremental { data, timestamp } => {
                    self.emitter.emit_incremental(data, timestamp);
                }
                Observation::Focus {
                    has_focus,
                    timestamp,
                } => self.emitter.emit_focus(has_focus, timestamp),
            }
        }
    }

    /// Flush, then emit a fresh Meta and FullSnapshot.
    ///
    /// Shadow sessions are restarted from the new snapshot.
    pub fn resync(&mut self, doc: &mut Document) {
        if self.stopped {
            return;
        }
        self.flush(doc);
        self.shadows.stop(doc);
        self.take_full_snapshot(doc, SerializationStatus::SubsequentFullSnapshot);
        self.observers.reset_inputs();
        debug!(shadow_roots = self.shadows.len(), "full snapshot re-emitted");
    }

    /// Flush, emit `view_end` and disconnect everything. Idempotent.
    pub fn stop(&mut self, doc: &mut Document) {
        if self.stopped {
            return;
        }
        self.flush(doc);
        self.emitter.emit_view_end(now_ms());
        self.document_session.stop(doc);
        self.shadows.stop(doc);
        self.observers.stop(doc);
        self.stopped = true;
        info!(records = self.emitter.emitted(), "recording stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn shadow_session_count(&self) -> usize {
        self.shadows.len()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        self.emitter.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.emitter.sink_mut()
    }

    pub fn into_sink(self) -> S {
        self.emitter.into_sink()
    }
}
