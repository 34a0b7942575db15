//! Producer side: snapshot and mutation recording
//!
//! A [`Recorder`] serializes the document once, then reduces the host's
//! change notifications into [`MutationPayload`](crate::types::MutationPayload)
//! batches on every [`Recorder::flush`]. Shadow roots get their own mutation
//! session, started and stopped from the reduction output of the session
//! that owns their host.
//!
//! # Example
//!
//! ```rust
//! use retrace_core::config::RecorderConfig;
//! use retrace_core::dom::Document;
//! use retrace_core::record::start_recording;
//!
//! let mut doc = Document::new("https://example.test/");
//! let mut recorder = start_recording(&mut doc, RecorderConfig::default(), Vec::new());
//!
//! let div = doc.create_element("div");
//! let body = doc.body();
//! doc.append_child(body, div);
//! recorder.flush(&mut doc);
//! recorder.stop(&mut doc);
//!
//! assert_eq!(recorder.sink().len(), 5);
//! ```

mod emitter;
mod identity;
mod log;
mod mutation;
mod observers;
pub mod privacy;
mod recorder;
mod serialize;
mod shadow;

pub use emitter::{RecordEmitter, RecordSink, now_ms};
pub use identity::{IdentityRegistry, NodeEntry};
pub use log::{RECORD_LOG_VERSION, RecordLog};
pub use mutation::{
    MutationContext, MutationOutcome, MutationSession, ShadowRootChange, reduce_mutations,
    sort_added_and_moved_nodes,
};
pub use observers::{EventObservers, Observation};
pub use privacy::{PrivacyLevel, RedactionPolicy};
pub use recorder::{Recorder, start_recording};
pub use serialize::{
    CSS_TEXT_ATTRIBUTE, IgnoreList, SerializationContext, SerializationStatus, Snapshotter,
};
pub use shadow::ShadowController;
