//! In-process transport for single-process runs and tests
//!
//! Each `open` creates a fresh channel pair and hands the far end to the
//! [`PeerListener`], which plays the server. No framing is applied; messages
//! pass through as-is.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use url::Url;

use crate::connector::{Connector, Outbound, TransportEvent, TransportHandle, TransportKind};
use crate::error::TransportError;

/// Connector whose transports terminate in this process
pub struct ChannelConnector {
    peers: mpsc::UnboundedSender<PeerEnd>,
    refusals: Mutex<VecDeque<String>>,
    opened: AtomicUsize,
    capacity: usize,
}

impl ChannelConnector {
    /// Create a connector and the listener that receives its peers
    pub fn new() -> (Self, PeerListener) {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> (Self, PeerListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers: tx,
            refusals: Mutex::new(VecDeque::new()),
            opened: AtomicUsize::new(0),
            capacity,
        };
        (connector, PeerListener { rx })
    }

    /// Make the next `open` fail with `reason`
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.refusals.lock().push_back(reason.into());
    }

    /// Number of transports successfully opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, endpoint: &Url) -> Result<TransportHandle, TransportError> {
        if let Some(reason) = self.refusals.lock().pop_front() {
            return Err(TransportError::Connection(reason));
        }

        let (out_tx, out_rx) = mpsc::channel(self.capacity);
        let (event_tx, event_rx) = mpsc::channel(self.capacity);

        let peer = PeerEnd {
            endpoint: endpoint.clone(),
            from_client: out_rx,
            to_client: event_tx,
        };
        self.peers
            .send(peer)
            .map_err(|_| TransportError::Connection("no listener".to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(TransportHandle::from_channels(
            TransportKind::Channel,
            out_tx,
            event_rx,
        ))
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Receives the server side of every transport opened by a [`ChannelConnector`]
pub struct PeerListener {
    rx: mpsc::UnboundedReceiver<PeerEnd>,
}

impl PeerListener {
    /// Wait for the next transport to be opened
    pub async fn accept(&mut self) -> Option<PeerEnd> {
        self.rx.recv().await
    }

    pub fn try_accept(&mut self) -> Option<PeerEnd> {
        self.rx.try_recv().ok()
    }
}

/// Server side of one in-process transport
pub struct PeerEnd {
    endpoint: Url,
    from_client: mpsc::Receiver<Outbound>,
    to_client: mpsc::Sender<TransportEvent>,
}

impl PeerEnd {
    /// Endpoint the client asked for
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Next message from the client; `None` once the client closed or dropped
    pub async fn recv(&mut self) -> Option<String> {
        match self.from_client.recv().await? {
            Outbound::Data(data) => Some(data),
            Outbound::Close => None,
        }
    }

    pub fn try_recv(&mut self) -> Option<String> {
        match self.from_client.try_recv().ok()? {
            Outbound::Data(data) => Some(data),
            Outbound::Close => None,
        }
    }

    /// Deliver a message to the client; false if the client is gone
    pub async fn send(&self, text: impl Into<String>) -> bool {
        self.to_client
            .send(TransportEvent::Message(text.into()))
            .await
            .is_ok()
    }

    /// Report a transport failure to the client
    pub async fn fail(self, reason: impl Into<String>) {
        let _ = self
            .to_client
            .send(TransportEvent::Error(reason.into()))
            .await;
    }

    /// Close the transport from the server side
    pub async fn close(self, code: u16) {
        let _ = self
            .to_client
            .send(TransportEvent::Closed {
                code: Some(code),
                reason: "closed by peer".to_string(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("http://localhost:8080/ws/location").unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (connector, mut listener) = ChannelConnector::new();
        let mut handle = connector.open(&endpoint()).await.unwrap();
        let mut peer = listener.accept().await.unwrap();

        assert_eq!(peer.endpoint(), &endpoint());
        assert_eq!(handle.kind(), TransportKind::Channel);

        handle.send("ping".to_string()).await.unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some("ping"));

        assert!(peer.send("pong").await);
        assert_eq!(handle.recv().await, TransportEvent::Message("pong".to_string()));
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn test_refuse_next_only_once() {
        let (connector, mut listener) = ChannelConnector::new();
        connector.refuse_next("down");

        assert!(matches!(
            connector.open(&endpoint()).await,
            Err(TransportError::Connection(reason)) if reason == "down"
        ));
        assert!(listener.try_accept().is_none());

        assert!(connector.open(&endpoint()).await.is_ok());
        assert!(listener.try_accept().is_some());
    }

    #[tokio::test]
    async fn test_client_close_ends_peer() {
        let (connector, mut listener) = ChannelConnector::new();
        let handle = connector.open(&endpoint()).await.unwrap();
        let mut peer = listener.accept().await.unwrap();

        handle.close().await;
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_peer_close_reaches_client() {
        let (connector, mut listener) = ChannelConnector::new();
        let mut handle = connector.open(&endpoint()).await.unwrap();
        let peer = listener.accept().await.unwrap();

        peer.close(1000).await;
        assert!(matches!(
            handle.recv().await,
            TransportEvent::Closed { code: Some(1000), .. }
        ));
    }

    #[tokio::test]
    async fn test_open_without_listener_fails() {
        let (connector, listener) = ChannelConnector::new();
        drop(listener);
        assert!(connector.open(&endpoint()).await.is_err());
    }
}
