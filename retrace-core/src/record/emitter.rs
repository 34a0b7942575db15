//! Timestamped record emission

use chrono::Utc;

use crate::types::{FocusData, FullSnapshotData, IncrementalData, MetaData, Record};

/// Destination of the record stream
pub trait RecordSink {
    fn write(&mut self, record: Record);
}

impl RecordSink for Vec<Record> {
    fn write(&mut self, record: Record) {
        self.push(record);
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write(&mut self, record: Record) {
        (**self).write(record);
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn write(&mut self, record: Record) {
        (**self).write(record);
    }
}

/// Current time in epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Wraps recorder outputs into [`Record`]s and forwards them to a sink
#[derive(Debug)]
pub struct RecordEmitter<S> {
    sink: S,
    emitted: u64,
}

impl<S: RecordSink> RecordEmitter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, emitted: 0 }
    }

    fn write(&mut self, record: Record) {
        self.emitted += 1;
        self.sink.write(record);
    }

    /// Meta immediately followed by its full snapshot, both stamped `timestamp`
    pub fn emit_full_snapshot(&mut self, meta: MetaData, snapshot: FullSnapshotData, timestamp: i64) {
        self.write(Record::Meta {
            timestamp,
            data: meta,
        });
        self.write(Record::FullSnapshot {
            timestamp,
            data: snapshot,
        });
    }

    pub fn emit_incremental(&mut self, data: IncrementalData, timestamp: i64) {
        self.write(Record::IncrementalSnapshot { timestamp, data });
    }

    pub fn emit_focus(&mut self, has_focus: bool, timestamp: i64) {
        self.write(Record::Focus {
            timestamp,
            data: FocusData { has_focus },
        });
    }

    pub fn emit_view_end(&mut self, timestamp: i64) {
        self.write(Record::ViewEnd { timestamp });
    }

    /// Number of records forwarded so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
