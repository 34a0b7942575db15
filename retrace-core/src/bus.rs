//! Record bus
//!
//! Fan-out of the recorded stream to any number of consumers (playback
//! sessions, persistence). A recorder writes into the bus like any other
//! [`RecordSink`]; every subscriber gets its own copy of each record.

use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::config::BusConfig;
use crate::record::RecordSink;
use crate::types::Record;

/// Broadcast channel carrying [`Record`]s
#[derive(Debug, Clone)]
pub struct RecordBus {
    sender: broadcast::Sender<Record>,
}

impl RecordBus {
    /// Create a bus buffering up to `capacity` records per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Publish a record, returning how many subscribers received it.
    ///
    /// Publishing with no subscriber drops the record.
    pub fn publish(&self, record: Record) -> usize {
        self.sender.send(record).unwrap_or(0)
    }

    /// Subscribe to records published from now on
    pub fn subscribe(&self) -> RecordSubscription {
        RecordSubscription {
            id: Uuid::new_v4(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RecordBus {
    fn default() -> Self {
        Self::from_config(&BusConfig::default())
    }
}

impl RecordSink for RecordBus {
    fn write(&mut self, record: Record) {
        self.publish(record);
    }
}

/// One consumer's view of the bus. Dropping it unsubscribes.
#[derive(Debug)]
pub struct RecordSubscription {
    id: Uuid,
    receiver: broadcast::Receiver<Record>,
}

impl RecordSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next record, or `None` once every sender is gone.
    ///
    /// A subscriber that fell behind skips the records it missed.
    pub async fn recv(&mut self) -> Option<Record> {
        loop {
            match self.receiver.recv().await {
                Ok(record) => return Some(record),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subscription = %self.id, skipped, "record subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next record if one is already queued
    pub fn try_recv(&mut self) -> Option<Record> {
        loop {
            match self.receiver.try_recv() {
                Ok(record) => return Some(record),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(subscription = %self.id, skipped, "record subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
