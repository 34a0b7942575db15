//! Consumer side: live playback into an isolated renderer
//!
//! [`start_playback`] subscribes to a [`RecordBus`] and drives a
//! [`PlaybackSession`] on a tokio task, forwarding records over a
//! [`MessageBridge`] once the renderer reports it is ready.
//!
//! # Example
//!
//! ```rust,no_run
//! use retrace_core::bus::RecordBus;
//! use retrace_core::config::PlaybackConfig;
//! use retrace_core::playback::{BridgeUpMessage, renderer_channel, start_playback};
//!
//! # async fn run() -> retrace_core::error::Result<()> {
//! let config = PlaybackConfig::default();
//! let bus = RecordBus::default();
//! let (renderer, endpoint) = renderer_channel(config.sandbox_origin.clone());
//!
//! let handle = start_playback(renderer, &bus, config, |status| println!("{status}"));
//! endpoint.post(&BridgeUpMessage::Ready)?;
//! handle.stop();
//! handle.join().await;
//! # Ok(())
//! # }
//! ```

mod bridge;
mod session;

pub use bridge::{
    BridgeDownMessage, BridgeRecord, BridgeUpMessage, InboundMessage, MessageBridge,
    RendererEndpoint, RendererHandle, SANDBOX_LOG_TARGET, SEGMENT_SOURCE, SerialisedError,
    normalize_record, renderer_channel,
};
pub use session::{
    PlaybackSession, PlaybackStatus, RecordBuffer, RecordForwarder, StatusCallback,
    is_full_snapshot_start,
};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bus::RecordBus;
use crate::config::PlaybackConfig;

/// Start replaying the records published on `bus` into `renderer`.
///
/// Must be called from within a tokio runtime. The bus subscription is taken
/// before returning, so records published afterwards are never missed.
pub fn start_playback(
    renderer: RendererHandle,
    bus: &RecordBus,
    config: PlaybackConfig,
    mut on_status_change: impl FnMut(PlaybackStatus) + Send + 'static,
) -> PlaybackHandle {
    let (outbound, mut inbound) = renderer.into_parts();
    let mut subscription = bus.subscribe();
    let mut bridge = MessageBridge::new(outbound, config.sandbox_origin, config.view_id.clone());
    let (status_tx, status_rx) = watch::channel(PlaybackStatus::Loading);
    let mut session = PlaybackSession::new().with_status_callback(move |status| {
        status_tx.send_replace(status);
        on_status_change(status);
    });

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let view_id = config.view_id;
    let task = tokio::spawn(async move {
        info!(view_id = %view_id, subscription = %subscription.id(), "playback started");
        let mut records_open = true;
        let mut renderer_open = true;

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => break,

                record = subscription.recv(), if records_open => match record {
                    Some(record) => session.on_record(record, &mut bridge),
                    None => {
                        debug!("record bus closed");
                        records_open = false;
                    }
                },

                message = inbound.recv(), if renderer_open => match message {
                    Some(message) => {
                        if let Some(BridgeUpMessage::Ready) = bridge.receive(message) {
                            session.on_renderer_ready(&mut bridge);
                        }
                    }
                    None => {
                        debug!("renderer disconnected");
                        renderer_open = false;
                    }
                },

                else => break,
            }
        }

        info!(
            view_id = %view_id,
            status = %session.status(),
            sent = bridge.next_order_id() - 1,
            "playback stopped"
        );
    });

    PlaybackHandle {
        cancel,
        status: status_rx,
        task: Some(task),
    }
}

/// Running playback. Dropping the handle stops it.
#[derive(Debug)]
pub struct PlaybackHandle {
    cancel: CancellationToken,
    status: watch::Receiver<PlaybackStatus>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    /// Detach from the bus and the renderer. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    /// Wait until the session reaches `status`.
    ///
    /// Returns `false` if playback ended first.
    pub async fn wait_for_status(&mut self, status: PlaybackStatus) -> bool {
        self.status.wait_for(|current| *current == status).await.is_ok()
    }

    /// Wait for the playback task to finish
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "playback task failed");
            }
        }
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::json;

    use crate::types::{MetaData, Record};

    const ORIGIN: &str = "https://sandbox.example.test";

    fn config() -> PlaybackConfig {
        PlaybackConfig {
            sandbox_origin: ORIGIN.to_string(),
            view_id: "view-1".to_string(),
        }
    }

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

    async fn next_record(endpoint: &mut RendererEndpoint) -> BridgeRecord {
        let message = tokio::time::timeout(Duration::from_secs(5), endpoint.recv())
            .await
            .expect("timed out waiting for a record")
            .expect("bridge closed");
        match message {
            BridgeDownMessage::Records { mut records, .. } => records.remove(0),
        }
    }

    #[tokio::test]
    async fn test_records_flow_after_ready() {
        let bus = RecordBus::new(16);
        let (renderer, mut endpoint) = renderer_channel(ORIGIN);
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let seen = statuses.clone();
        let mut handle = start_playback(renderer, &bus, config(), move |status| {
            seen.lock().unwrap().push(status)
        });

        bus.publish(meta(1));
        bus.publish(Record::ViewEnd { timestamp: 2 });
        endpoint.post(&BridgeUpMessage::Ready).unwrap();

        assert!(handle.wait_for_status(PlaybackStatus::Ready).await);
        let first = next_record(&mut endpoint).await;
        let second = next_record(&mut endpoint).await;
        assert_eq!((first.order_id, first.record), (1, meta(1)));
        assert_eq!(second.order_id, 2);
        assert_eq!(first.view_id, "view-1");

        bus.publish(Record::ViewEnd { timestamp: 3 });
        assert_eq!(next_record(&mut endpoint).await.order_id, 3);
        assert_eq!(*statuses.lock().unwrap(), vec![PlaybackStatus::Ready]);

        handle.stop();
        handle.join().await;
    }

    #[tokio::test]
    async fn test_ready_from_other_origin_is_ignored() {
        let bus = RecordBus::new(16);
        let (renderer, endpoint) = renderer_channel(ORIGIN);
        let mut handle = start_playback(renderer, &bus, config(), |_| {});

        endpoint
            .post_from("https://evil.example.test", json!({ "type": "ready" }))
            .unwrap();
        endpoint
            .post_from(ORIGIN, json!({ "type": "log", "level": "info", "message": "booted" }))
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(handle.status(), PlaybackStatus::Loading);

        endpoint.post(&BridgeUpMessage::Ready).unwrap();
        assert!(
            handle
                .wait_for_status(PlaybackStatus::WaitingForFullSnapshot)
                .await
        );
        handle.stop();
    }

    #[tokio::test]
    async fn test_stop_detaches_bus_and_renderer() {
        let bus = RecordBus::new(16);
        let (renderer, mut endpoint) = renderer_channel(ORIGIN);
        let handle = start_playback(renderer, &bus, config(), |_| {});
        assert_eq!(bus.subscriber_count(), 1);

        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());
        handle.join().await;

        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(meta(1)), 0);
        assert!(endpoint.recv().await.is_none());
    }
}
