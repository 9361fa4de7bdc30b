//! Transport contract
//!
//! A [`Connector`] opens a full-duplex message stream to an endpoint and
//! hands back a [`TransportHandle`]. Each implementation runs its own I/O
//! tasks and talks to the handle through channels, so the session layer
//! sees the same interface whichever transport is active.

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;
use url::Url;

use crate::error::TransportError;

/// Which transport carried a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    WebSocket,
    XhrStreaming,
    /// In-process channel pair
    Channel,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::XhrStreaming => "xhr-streaming",
            TransportKind::Channel => "channel",
        };
        f.write_str(name)
    }
}

/// Something that happened on an open transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One application message (already unwrapped from transport framing)
    Message(String),
    /// I/O failure; the transport is unusable afterwards
    Error(String),
    /// Peer closed the stream
    Closed { code: Option<u16>, reason: String },
}

/// Command from the handle to the transport's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Data(String),
    Close,
}

/// An open transport
///
/// Dropping the handle tears the transport down as well.
pub struct TransportHandle {
    kind: TransportKind,
    outbound: mpsc::Sender<Outbound>,
    events: mpsc::Receiver<TransportEvent>,
}

impl TransportHandle {
    /// Wrap the channels of a running transport
    pub fn from_channels(
        kind: TransportKind,
        outbound: mpsc::Sender<Outbound>,
        events: mpsc::Receiver<TransportEvent>,
    ) -> Self {
        Self {
            kind,
            outbound,
            events,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Queue one message for sending
    pub async fn send(&self, data: String) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Data(data))
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Wait for the next transport event
    ///
    /// Once the transport's tasks are gone this keeps returning `Closed`.
    pub async fn recv(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Closed {
                code: None,
                reason: "transport ended".to_string(),
            },
        }
    }

    /// Ask the transport to close gracefully
    pub async fn close(self) {
        let _ = self.outbound.send(Outbound::Close).await;
    }
}

/// Opens transports to an endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport; resolves once the stream is ready for messages
    async fn open(&self, endpoint: &Url) -> Result<TransportHandle, TransportError>;

    /// Name used in logs
    fn name(&self) -> &str;
}
