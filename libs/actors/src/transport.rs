//! Actor Channel Transport
//!
//! Linked endpoint pairs used for every remote actor instance. Each
//! [`MessageChannel`] yields `port1` and `port2`; whatever one port posts the
//! other receives, in send order.
//!
//! - Frames are JSON encoded [`Bytes`], never shared references
//! - Queues are unbounded: posting never waits
//! - Handing a [`Port`] to another execution context is a move. The sending
//!   side cannot touch it afterwards
//! - Dropping a port closes the channel: the peer's receiver yields `None` and
//!   its sends fail with [`ActorError::Disconnected`]

use crate::error::{ActorError, Result};
use crate::messages::{decode, encode};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

/// A freshly created pair of linked endpoints
pub struct MessageChannel {
    pub port1: Port,
    pub port2: Port,
}

impl MessageChannel {
    /// Create a new channel pair
    pub fn new() -> Self {
        let channel_id = Uuid::new_v4().simple().to_string();
        let (tx_to_2, rx_from_1) = mpsc::unbounded_channel();
        let (tx_to_1, rx_from_2) = mpsc::unbounded_channel();

        let label1: Arc<str> = Arc::from(format!("channel-{}:port1", channel_id));
        let label2: Arc<str> = Arc::from(format!("channel-{}:port2", channel_id));

        let port1 = Port {
            sender: PortSender {
                label: label1.clone(),
                tx: tx_to_2,
            },
            receiver: PortReceiver {
                label: label1,
                rx: rx_from_2,
            },
        };
        let port2 = Port {
            sender: PortSender {
                label: label2.clone(),
                tx: tx_to_1,
            },
            receiver: PortReceiver {
                label: label2,
                rx: rx_from_1,
            },
        };

        trace!(channel_id = %channel_id, "Created message channel");
        Self { port1, port2 }
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// One endpoint of a [`MessageChannel`]
pub struct Port {
    sender: PortSender,
    receiver: PortReceiver,
}

impl Port {
    /// Endpoint label for diagnostics
    pub fn label(&self) -> &str {
        &self.sender.label
    }

    /// Send a message to the peer endpoint
    pub fn post_message<T: Serialize>(&self, message: &T) -> Result<()> {
        self.sender.post_message(message)
    }

    /// Wait for the next message from the peer endpoint
    pub async fn recv_message<T: DeserializeOwned>(&mut self) -> Option<Result<T>> {
        self.receiver.recv_message().await
    }

    /// Split into an independently usable sending half and receiving half
    pub fn split(self) -> (PortSender, PortReceiver) {
        (self.sender, self.receiver)
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port").field("label", &self.label()).finish()
    }
}

/// Sending half of a [`Port`], cheap to clone
#[derive(Clone)]
pub struct PortSender {
    label: Arc<str>,
    tx: mpsc::UnboundedSender<Bytes>,
}

impl PortSender {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn post_message<T: Serialize>(&self, message: &T) -> Result<()> {
        let frame = encode(message)?;
        self.post_frame(frame)
    }

    pub fn post_frame(&self, frame: Bytes) -> Result<()> {
        let frame_len = frame.len();
        self.tx
            .send(frame)
            .map_err(|_| ActorError::disconnected(self.label.as_ref()))?;
        trace!(port = %self.label, frame_len, "Posted frame");
        Ok(())
    }

    /// True once the peer endpoint has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for PortSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortSender")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receiving half of a [`Port`]
pub struct PortReceiver {
    label: Arc<str>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl PortReceiver {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Next raw frame, `None` once the peer is gone and the queue is drained
    pub async fn recv_frame(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Next decoded message, `None` once the peer is gone and the queue is drained
    pub async fn recv_message<T: DeserializeOwned>(&mut self) -> Option<Result<T>> {
        let frame = self.recv_frame().await?;
        Some(decode(&frame))
    }
}

impl fmt::Debug for PortReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortReceiver").field("label", &self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{CallRequest, SpawnResult};
    use serde_json::json;

    #[tokio::test]
    async fn test_ports_are_linked_both_ways() {
        let MessageChannel { mut port1, mut port2 } = MessageChannel::new();

        port1.post_message(&json!({"from": 1})).unwrap();
        port2.post_message(&json!({"from": 2})).unwrap();

        let at_2: serde_json::Value = port2.recv_message().await.unwrap().unwrap();
        let at_1: serde_json::Value = port1.recv_message().await.unwrap().unwrap();
        assert_eq!(at_2, json!({"from": 1}));
        assert_eq!(at_1, json!({"from": 2}));
    }

    #[tokio::test]
    async fn test_send_order_is_preserved() {
        let MessageChannel { port1, port2 } = MessageChannel::new();
        let (_tx, mut rx) = port2.split();

        port1.post_message(&SpawnResult::ok()).unwrap();
        for call_id in 0..3 {
            port1
                .post_message(&json!({"callId": call_id, "response": call_id}))
                .unwrap();
        }

        let first: SpawnResult = rx.recv_message().await.unwrap().unwrap();
        assert_eq!(first, SpawnResult::ok());
        for expected in 0..3u64 {
            let msg: serde_json::Value = rx.recv_message().await.unwrap().unwrap();
            assert_eq!(msg["callId"], json!(expected));
        }
    }

    #[tokio::test]
    async fn test_dropping_peer_closes_channel() {
        let MessageChannel { port1, port2 } = MessageChannel::new();
        let (tx, mut rx) = port2.split();

        drop(port1);

        assert!(rx.recv_frame().await.is_none());
        assert!(tx.is_closed());
        let err = tx.post_message(&SpawnResult::ok()).unwrap_err();
        assert!(matches!(err, ActorError::Disconnected { .. }));
    }

    #[tokio::test]
    async fn test_decode_error_is_reported() {
        let MessageChannel { port1, mut port2 } = MessageChannel::new();
        port1.post_message(&json!({"unexpected": true})).unwrap();

        let result = port2.recv_message::<CallRequest>().await.unwrap();
        assert!(matches!(result, Err(ActorError::Codec(_))));
    }

    #[test]
    fn test_port_labels_identify_channel_side() {
        let channel = MessageChannel::new();
        assert!(channel.port1.label().ends_with(":port1"));
        assert!(channel.port2.label().ends_with(":port2"));
        assert_ne!(channel.port1.label(), channel.port2.label());
    }
}
