//! SockJS over a native WebSocket

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, trace, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::connector::{Connector, Outbound, TransportEvent, TransportHandle, TransportKind};
use crate::error::TransportError;
use crate::sockjs::{SessionUrl, SockJsFrame, encode_messages};

/// Opens SockJS sessions over `ws(s)://…/websocket`
pub struct WebSocketConnector {
    /// Upper bound for the upgrade plus the SockJS open frame
    open_timeout: Duration,
    /// Capacity of the event and outbound channels
    capacity: usize,
}

impl WebSocketConnector {
    pub fn new(open_timeout: Duration) -> Self {
        Self {
            open_timeout,
            capacity: 1024,
        }
    }

    async fn open_inner(&self, endpoint: &Url) -> Result<TransportHandle, TransportError> {
        let session = SessionUrl::generate(endpoint);
        let url = session.websocket_url()?;
        debug!("Opening websocket session {} at {}", session.session_id(), url);

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        // The session is usable only after the SockJS open frame
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match SockJsFrame::parse(&text)? {
                    SockJsFrame::Open => break,
                    SockJsFrame::Close { code, reason } => {
                        return Err(TransportError::Upgrade(format!(
                            "session closed during open ({}: {})",
                            code, reason
                        )));
                    }
                    other => trace!("Ignoring {:?} before open", other),
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(TransportError::Connection(
                        "socket closed before open".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }

        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(self.capacity);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(self.capacity);

        // Outgoing messages
        let error_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(cmd) = out_rx.recv().await {
                match cmd {
                    Outbound::Data(data) => {
                        let frame = match encode_messages(&[data.as_str()]) {
                            Ok(frame) => frame,
                            Err(e) => {
                                let _ = error_tx.send(TransportEvent::Error(e.to_string())).await;
                                continue;
                            }
                        };
                        if let Err(e) = write.send(Message::Text(frame.into())).await {
                            let _ = error_tx.send(TransportEvent::Error(e.to_string())).await;
                            break;
                        }
                    }
                    Outbound::Close => break,
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        // Incoming frames
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => match SockJsFrame::parse(&text) {
                        Ok(SockJsFrame::Messages(messages)) => {
                            for message in messages {
                                if event_tx.send(TransportEvent::Message(message)).await.is_err() {
                                    return;
                                }
                            }
                            continue;
                        }
                        Ok(SockJsFrame::Close { code, reason }) => TransportEvent::Closed {
                            code: Some(code),
                            reason,
                        },
                        Ok(SockJsFrame::Open) | Ok(SockJsFrame::Heartbeat) => continue,
                        Err(e) => {
                            warn!("Dropping malformed SockJS frame: {}", e);
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => TransportEvent::Closed {
                        code: frame.as_ref().map(|f| u16::from(f.code)),
                        reason: frame
                            .map(|f| f.reason.as_str().to_owned())
                            .unwrap_or_default(),
                    },
                    Ok(_) => continue,
                    Err(e) => TransportEvent::Error(e.to_string()),
                };
                let _ = event_tx.send(event).await;
                break;
            }
        });

        Ok(TransportHandle::from_channels(
            TransportKind::WebSocket,
            out_tx,
            event_rx,
        ))
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, endpoint: &Url) -> Result<TransportHandle, TransportError> {
        timeout(self.open_timeout, self.open_inner(endpoint))
            .await
            .map_err(|_| TransportError::Timeout(self.open_timeout))?
    }

    fn name(&self) -> &str {
        "websocket"
    }
}
