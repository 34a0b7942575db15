//! Host ↔ renderer message bridge
//!
//! Records travel down to the renderer wrapped in a `records` envelope, one
//! record per message, each tagged with an order id. Control messages come
//! back up (`ready`, `log`, `error`) and are only accepted from the sandbox
//! origin.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{Result, RetraceError};
use crate::record::now_ms;
use crate::types::{IncrementalData, Record};

use super::session::RecordForwarder;

/// Target renderer logs are re-emitted under
pub const SANDBOX_LOG_TARGET: &str = "retrace::sandbox";

/// Segment source reported for live records
pub const SEGMENT_SOURCE: &str = "browser";

/// Record as delivered to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRecord {
    #[serde(flatten)]
    pub record: Record,
    pub view_id: String,
    pub order_id: u64,
    pub is_seeking: bool,
    pub should_wait_for_it: bool,
    pub segment_source: String,
}

/// Host → renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BridgeDownMessage {
    Records {
        records: Vec<BridgeRecord>,
        sent_at: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialisedError {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

/// Renderer → host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BridgeUpMessage {
    Ready,
    Log { level: String, message: String },
    Error { serialised_error: SerialisedError },
}

/// Raw message posted by some context, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub origin: String,
    pub data: serde_json::Value,
}

/// Keep only the first sampled position of a mouse-move batch
pub fn normalize_record(mut record: Record) -> Record {
    if let Record::IncrementalSnapshot {
        data: IncrementalData::MouseMove { positions },
        ..
    } = &mut record
    {
        positions.truncate(1);
    }
    record
}

/// Create a connected renderer pair for a renderer living at `origin`
pub fn renderer_channel(origin: impl Into<String>) -> (RendererHandle, RendererEndpoint) {
    let origin = origin.into();
    let (down_tx, down_rx) = mpsc::unbounded_channel();
    let (up_tx, up_rx) = mpsc::unbounded_channel();
    (
        RendererHandle {
            outbound: down_tx,
            inbound: up_rx,
        },
        RendererEndpoint {
            origin,
            inbound: down_rx,
            outbound: up_tx,
        },
    )
}

/// Host side of a renderer connection
#[derive(Debug)]
pub struct RendererHandle {
    outbound: mpsc::UnboundedSender<BridgeDownMessage>,
    inbound: mpsc::UnboundedReceiver<InboundMessage>,
}

impl RendererHandle {
    pub(crate) fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedSender<BridgeDownMessage>,
        mpsc::UnboundedReceiver<InboundMessage>,
    ) {
        (self.outbound, self.inbound)
    }
}

/// Renderer side of a connection
#[derive(Debug)]
pub struct RendererEndpoint {
    origin: String,
    inbound: mpsc::UnboundedReceiver<BridgeDownMessage>,
    outbound: mpsc::UnboundedSender<InboundMessage>,
}

impl RendererEndpoint {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Next message sent by the host, `None` once the host is gone
    pub async fn recv(&mut self) -> Option<BridgeDownMessage> {
        self.inbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BridgeDownMessage> {
        self.inbound.try_recv().ok()
    }

    /// Post a control message from this renderer's origin
    pub fn post(&self, message: &BridgeUpMessage) -> Result<()> {
        let data = serde_json::to_value(message)?;
        self.post_from(self.origin.clone(), data)
    }

    /// Post raw data as if it came from `origin`
    pub fn post_from(&self, origin: impl Into<String>, data: serde_json::Value) -> Result<()> {
        self.outbound
            .send(InboundMessage {
                origin: origin.into(),
                data,
            })
            .map_err(|_| RetraceError::Bridge("host is gone".to_string()))
    }
}

/// Host end of the bridge: stamps and sends records, validates control
/// messages
#[derive(Debug)]
pub struct MessageBridge {
    expected_origin: String,
    view_id: String,
    next_order_id: u64,
    outbound: mpsc::UnboundedSender<BridgeDownMessage>,
}

impl MessageBridge {
    pub fn new(
        outbound: mpsc::UnboundedSender<BridgeDownMessage>,
        expected_origin: impl Into<String>,
        view_id: impl Into<String>,
    ) -> Self {
        Self {
            expected_origin: expected_origin.into(),
            view_id: view_id.into(),
            next_order_id: 1,
            outbound,
        }
    }

    /// Order id the next sent record will carry
    pub fn next_order_id(&self) -> u64 {
        self.next_order_id
    }

    /// Send one record to the renderer.
    ///
    /// The order id is consumed even when the renderer is gone.
    pub fn send_record(&mut self, record: Record) -> Result<()> {
        let order_id = self.next_order_id;
        self.next_order_id += 1;

        let message = BridgeDownMessage::Records {
            records: vec![BridgeRecord {
                record: normalize_record(record),
                view_id: self.view_id.clone(),
                order_id,
                is_seeking: false,
                should_wait_for_it: false,
                segment_source: SEGMENT_SOURCE.to_string(),
            }],
            sent_at: now_ms(),
        };
        self.outbound
            .send(message)
            .map_err(|_| RetraceError::Bridge(format!("renderer is gone, record {} dropped", order_id)))
    }

    /// Validate and decode a control message.
    ///
    /// Messages from another origin and unknown types yield `None`. Renderer
    /// logs and errors are re-emitted through tracing.
    pub fn receive(&self, message: InboundMessage) -> Option<BridgeUpMessage> {
        if message.origin != self.expected_origin {
            debug!(origin = %message.origin, "message from unexpected origin ignored");
            return None;
        }
        let parsed: BridgeUpMessage = match serde_json::from_value(message.data) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "unknown renderer message ignored");
                return None;
            }
        };

        match &parsed {
            BridgeUpMessage::Log { level, message } => match level.as_str() {
                "error" => error!(target: SANDBOX_LOG_TARGET, "{}", message),
                "warn" => warn!(target: SANDBOX_LOG_TARGET, "{}", message),
                _ => info!(target: SANDBOX_LOG_TARGET, "{}", message),
            },
            BridgeUpMessage::Error { serialised_error } => error!(
                target: SANDBOX_LOG_TARGET,
                stack = serialised_error.stack.as_deref().unwrap_or_default(),
                "{}: {}",
                serialised_error.name,
                serialised_error.message
            ),
            BridgeUpMessage::Ready => {}
        }
        Some(parsed)
    }
}

impl RecordForwarder for MessageBridge {
    fn forward(&mut self, record: Record) {
        if let Err(e) = self.send_record(record) {
            warn!(error = %e, "failed to send record to renderer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MousePosition, NodeId};
    use serde_json::json;

    const ORIGIN: &str = "https://sandbox.example.test";

    fn mouse_move() -> Record {
        let position = |x| MousePosition {
            id: NodeId(4),
            x,
            y: 2,
            time_offset: 0,
        };
        Record::IncrementalSnapshot {
            timestamp: 10,
            data: IncrementalData::MouseMove {
                positions: vec![position(1), position(5), position(9)],
            },
        }
    }

    fn bridge() -> (MessageBridge, RendererEndpoint) {
        let (handle, endpoint) = renderer_channel(ORIGIN);
        let (outbound, _inbound) = handle.into_parts();
        (MessageBridge::new(outbound, ORIGIN, "view-1"), endpoint)
    }

    #[test]
    fn test_order_ids_start_at_one() {
        let (mut bridge, mut endpoint) = bridge();
        bridge.send_record(Record::ViewEnd { timestamp: 1 }).unwrap();
        bridge.send_record(Record::ViewEnd { timestamp: 2 }).unwrap();

        let order_ids: Vec<u64> = std::iter::from_fn(|| endpoint.try_recv())
            .flat_map(|message| match message {
                BridgeDownMessage::Records { records, .. } => records,
            })
            .map(|record| record.order_id)
            .collect();
        assert_eq!(order_ids, vec![1, 2]);
        assert_eq!(bridge.next_order_id(), 3);
    }

    #[test]
    fn test_records_wire_format() {
        let (mut bridge, mut endpoint) = bridge();
        bridge.send_record(Record::ViewEnd { timestamp: 7 }).unwrap();

        let message = endpoint.try_recv().unwrap();
        let mut value = serde_json::to_value(&message).unwrap();
        assert!(value["sentAt"].as_i64().is_some());
        value.as_object_mut().unwrap().remove("sentAt");
        assert_eq!(
            value,
            json!({
                "type": "records",
                "records": [{
                    "type": "view_end",
                    "timestamp": 7,
                    "viewId": "view-1",
                    "orderId": 1,
                    "isSeeking": false,
                    "shouldWaitForIt": false,
                    "segmentSource": "browser"
                }]
            })
        );
    }

    #[test]
    fn test_mouse_move_keeps_first_position() {
        let normalized = normalize_record(mouse_move());
        match normalized {
            Record::IncrementalSnapshot {
                data: IncrementalData::MouseMove { positions },
                ..
            } => {
                assert_eq!(positions.len(), 1);
                assert_eq!(positions[0].x, 1);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_receive_validates_origin() {
        let (bridge, _endpoint) = bridge();
        let ready = json!({ "type": "ready" });

        assert_eq!(
            bridge.receive(InboundMessage {
                origin: "https://evil.example.test".to_string(),
                data: ready.clone(),
            }),
            None
        );
        assert_eq!(
            bridge.receive(InboundMessage {
                origin: ORIGIN.to_string(),
                data: ready,
            }),
            Some(BridgeUpMessage::Ready)
        );
    }

    #[test]
    fn test_receive_ignores_unknown_types() {
        let (bridge, _endpoint) = bridge();
        let message = InboundMessage {
            origin: ORIGIN.to_string(),
            data: json!({ "type": "resize", "width": 10 }),
        };
        assert_eq!(bridge.receive(message), None);
    }

    #[test]
    fn test_receive_decodes_errors() {
        let (bridge, _endpoint) = bridge();
        let message = InboundMessage {
            origin: ORIGIN.to_string(),
            data: json!({
                "type": "error",
                "serialisedError": { "name": "TypeError", "message": "boom", "stack": "at x" }
            }),
        };
        assert_eq!(
            bridge.receive(message),
            Some(BridgeUpMessage::Error {
                serialised_error: SerialisedError {
                    name: "TypeError".to_string(),
                    message: "boom".to_string(),
                    stack: Some("at x".to_string()),
                }
            })
        );
    }

    #[test]
    fn test_send_to_closed_renderer_is_an_error() {
        let (mut bridge, endpoint) = bridge();
        drop(endpoint);

        let err = bridge.send_record(Record::ViewEnd { timestamp: 1 }).unwrap_err();
        assert!(matches!(err, RetraceError::Bridge(_)));

        // Forwarding swallows the failure
        bridge.forward(Record::ViewEnd { timestamp: 2 });
        assert_eq!(bridge.next_order_id(), 3);
    }
}
