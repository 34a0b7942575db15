//! Playback state machine
//!
//! Records arriving before the renderer is ready are buffered from the most
//! recent Meta onwards, so the renderer always starts from a full snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{Record, RecordType};

/// Where a playback attempt stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackStatus {
    /// Renderer not ready yet; records are buffered
    Loading,
    /// Renderer ready, but no full snapshot to start from
    WaitingForFullSnapshot,
    /// Every record is forwarded as it arrives
    Ready,
}

impl PlaybackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::WaitingForFullSnapshot => "waiting-for-full-snapshot",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Meta record opens every full snapshot
pub fn is_full_snapshot_start(record: &Record) -> bool {
    record.record_type() == RecordType::Meta
}

/// Records held back until the renderer is ready.
///
/// Never holds anything that does not start with a Meta record.
#[derive(Debug, Default)]
pub struct RecordBuffer {
    records: Vec<Record>,
}

impl RecordBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: Record) {
        if is_full_snapshot_start(&record) {
            self.records.clear();
            self.records.push(record);
        } else if !self.records.is_empty() {
            self.records.push(record);
        }
    }

    /// Take every buffered record, leaving the buffer empty
    pub fn consume(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Destination of the records a session lets through
pub trait RecordForwarder {
    fn forward(&mut self, record: Record);
}

impl RecordForwarder for Vec<Record> {
    fn forward(&mut self, record: Record) {
        self.push(record);
    }
}

impl<F: RecordForwarder + ?Sized> RecordForwarder for &mut F {
    fn forward(&mut self, record: Record) {
        (**self).forward(record);
    }
}

/// Callback told about every status transition
pub type StatusCallback = Box<dyn FnMut(PlaybackStatus) + Send>;

/// Consumer side of one playback attempt
pub struct PlaybackSession {
    status: PlaybackStatus,
    buffer: RecordBuffer,
    on_status_change: Option<StatusCallback>,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self {
            status: PlaybackStatus::Loading,
            buffer: RecordBuffer::new(),
            on_status_change: None,
        }
    }

    pub fn with_status_callback(mut self, callback: impl FnMut(PlaybackStatus) + Send + 'static) -> Self {
        self.on_status_change = Some(Box::new(callback));
        self
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        self.status = status;
        info!(status = %status, "playback status changed");
        if let Some(callback) = self.on_status_change.as_mut() {
            callback(status);
        }
    }

    /// Route one incoming record according to the current status
    pub fn on_record(&mut self, record: Record, forwarder: &mut impl RecordForwarder) {
        match self.status {
            PlaybackStatus::Loading => self.buffer.add(record),
            PlaybackStatus::WaitingForFullSnapshot => {
                if is_full_snapshot_start(&record) {
                    self.set_status(PlaybackStatus::Ready);
                    forwarder.forward(record);
                } else {
                    debug!(record_type = ?record.record_type(), "record dropped before full snapshot");
                }
            }
            PlaybackStatus::Ready => forwarder.forward(record),
        }
    }

    /// Drain the buffer once the renderer signals it is ready.
    ///
    /// Ignored outside Loading.
    pub fn on_renderer_ready(&mut self, forwarder: &mut impl RecordForwarder) {
        if self.status != PlaybackStatus::Loading {
            debug!(status = %self.status, "renderer ready signal ignored");
            return;
        }
        let records = self.buffer.consume();
        if records.is_empty() {
            self.set_status(PlaybackStatus::WaitingForFullSnapshot);
            return;
        }
        self.set_status(PlaybackStatus::Ready);
        for record in records {
            forwarder.forward(record);
        }
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("status", &self.status)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::types::{
        FullSnapshotData, IncrementalData, InitialOffset, MetaData, NodeId, ScrollPosition,
        SerializedNode, SerializedNodeData,
    };

    fn meta(timestamp: i64) -> Record {
        Record::Meta {
            timestamp,
            data: MetaData {
                href: "https://example.test/".to_string(),
                width: 800,
                height: 600,
            },
        }
    }

    fn full_snapshot(timestamp: i64) -> Record {
        Record::FullSnapshot {
            timestamp,
            data: FullSnapshotData {
                node: SerializedNode {
                    id: NodeId(1),
                    data: SerializedNodeData::Document {
                        child_nodes: vec![],
                    },
                },
                initial_offset: InitialOffset::default(),
            },
        }
    }

    fn scroll(timestamp: i64) -> Record {
        Record::IncrementalSnapshot {
            timestamp,
            data: IncrementalData::Scroll(ScrollPosition {
                id: NodeId(1),
                x: 0,
                y: 10,
            }),
        }
    }

    #[test]
    fn test_buffer_starts_at_meta() {
        let mut buffer = RecordBuffer::new();
        buffer.add(scroll(1));
        assert!(buffer.is_empty());

        buffer.add(meta(2));
        buffer.add(full_snapshot(2));
        buffer.add(meta(3));
        assert_eq!(buffer.consume(), vec![meta(3)]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_buffered_records_are_forwarded_on_ready() {
        let mut session = PlaybackSession::new();
        let mut forwarded = Vec::new();

        session.on_record(meta(1), &mut forwarded);
        session.on_record(full_snapshot(1), &mut forwarded);
        session.on_record(scroll(2), &mut forwarded);
        assert!(forwarded.is_empty());

        session.on_renderer_ready(&mut forwarded);
        assert_eq!(session.status(), PlaybackStatus::Ready);
        assert_eq!(forwarded, vec![meta(1), full_snapshot(1), scroll(2)]);

        session.on_record(scroll(3), &mut forwarded);
        assert_eq!(forwarded.last(), Some(&scroll(3)));
    }

    #[test]
    fn test_stale_snapshot_is_discarded() {
        let mut session = PlaybackSession::new();
        let mut forwarded = Vec::new();

        session.on_record(meta(1), &mut forwarded);
        session.on_record(full_snapshot(1), &mut forwarded);
        session.on_record(meta(2), &mut forwarded);
        session.on_record(full_snapshot(2), &mut forwarded);
        session.on_renderer_ready(&mut forwarded);

        assert_eq!(forwarded, vec![meta(2), full_snapshot(2)]);
    }

    #[test]
    fn test_waits_for_full_snapshot_when_buffer_is_empty() {
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = statuses.clone();
        let mut session =
            PlaybackSession::new().with_status_callback(move |status| seen.lock().unwrap().push(status));
        let mut forwarded = Vec::new();

        session.on_record(scroll(1), &mut forwarded);
        session.on_renderer_ready(&mut forwarded);
        assert_eq!(session.status(), PlaybackStatus::WaitingForFullSnapshot);

        session.on_record(scroll(2), &mut forwarded);
        assert!(forwarded.is_empty());

        session.on_record(meta(3), &mut forwarded);
        session.on_record(full_snapshot(3), &mut forwarded);
        assert_eq!(forwarded, vec![meta(3), full_snapshot(3)]);
        assert_eq!(
            *statuses.lock().unwrap(),
            vec![PlaybackStatus::WaitingForFullSnapshot, PlaybackStatus::Ready]
        );
    }

    #[test]
    fn test_ready_signal_outside_loading_is_ignored() {
        let mut session = PlaybackSession::new();
        let mut forwarded = Vec::new();

        session.on_record(meta(1), &mut forwarded);
        session.on_renderer_ready(&mut forwarded);
        session.on_renderer_ready(&mut forwarded);

        assert_eq!(session.status(), PlaybackStatus::Ready);
        assert_eq!(forwarded, vec![meta(1)]);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&PlaybackStatus::WaitingForFullSnapshot).unwrap(),
            "\"waiting-for-full-snapshot\""
        );
        assert_eq!(PlaybackStatus::Ready.to_string(), "ready");
    }
}
