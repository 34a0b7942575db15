//! # Retrace - Privacy-aware session recording and replay
//!
//! Retrace records a live document tree, shadow roots included, as a stream
//! of timestamped records and replays that stream into an isolated renderer:
//! - Full snapshots with stable node ids
//! - Incremental mutation batches, reduced and ordered for replay
//! - Privacy levels (allow, mask-user-input, mask, hidden) applied at capture
//! - Scroll, input, media, viewport, mouse and focus observers
//! - A broadcast record bus feeding any number of playback sessions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use retrace_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RetraceConfig::load()?;
//!     let bus = RecordBus::from_config(&config.bus);
//!
//!     // Renderer side of the bridge
//!     let (renderer, endpoint) = renderer_channel(config.playback.sandbox_origin.clone());
//!     let playback = start_playback(renderer, &bus, config.playback.clone(), |_| {});
//!     endpoint.post(&BridgeUpMessage::Ready)?;
//!
//!     // Record a document into the bus
//!     let mut doc = Document::new("https://example.test/");
//!     let mut recorder = start_recording(&mut doc, config.recorder.clone(), bus.clone());
//!     let div = doc.create_element("div");
//!     let body = doc.body();
//!     doc.append_child(body, div);
//!     recorder.flush(&mut doc);
//!     recorder.stop(&mut doc);
//!
//!     playback.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **dom**: in-memory host document with shadow roots, change observers and
//!   event listeners
//! - **record**: identity registry, redaction, snapshotter, mutation
//!   reduction, shadow sessions and the recorder facade
//! - **bus**: broadcast fan-out of the record stream
//! - **playback**: buffering state machine and the renderer message bridge

pub mod bus;
pub mod config;
pub mod dom;
pub mod error;
pub mod logging;
pub mod playback;
pub mod record;
pub mod types;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bus::{RecordBus, RecordSubscription};
    pub use crate::config::{
        BusConfig, ConfigBuilder, PlaybackConfig, RecorderConfig, RecorderFeatures, RetraceConfig,
    };
    pub use crate::dom::{CssRule, Document, HostEvent, NodeKey, StyleSheet};
    pub use crate::error::{Result, RetraceError};
    pub use crate::logging::init_tracing;
    pub use crate::playback::{
        BridgeDownMessage, BridgeUpMessage, PlaybackHandle, PlaybackStatus, RendererEndpoint,
        RendererHandle, renderer_channel, start_playback,
    };
    pub use crate::record::{
        PrivacyLevel, RecordLog, RecordSink, Recorder, start_recording,
    };
    pub use crate::types::{
        IncrementalData, IncrementalSource, MutationPayload, NodeId, Record, RecordType,
        SerializedNode,
    };
}
