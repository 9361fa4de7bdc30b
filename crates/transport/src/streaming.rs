//! SockJS over chunked HTTP (`xhr_streaming` + `xhr_send`)
//!
//! Used when the websocket upgrade is unavailable. Frames arrive as
//! newline-terminated lines of one long-lived POST response; every outgoing
//! message is its own POST.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

use crate::connector::{Connector, Outbound, TransportEvent, TransportHandle, TransportKind};
use crate::error::TransportError;
use crate::sockjs::{SessionUrl, SockJsFrame, encode_messages, is_prelude};

/// Splits a chunked body into complete lines
///
/// Chunk boundaries can fall inside a multi-byte character, so bytes are
/// held until a newline arrives and only whole lines are decoded.
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<Result<String, TransportError>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(
            String::from_utf8(line)
                .map(|line| line.trim_end().to_string())
                .map_err(|e| TransportError::Framing(format!("invalid UTF-8 in stream: {}", e))),
        )
    }
}

/// Read lines until a complete frame is available
async fn next_frame<S, B>(
    body: &mut S,
    lines: &mut LineBuffer,
) -> Option<Result<SockJsFrame, TransportError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    loop {
        while let Some(line) = lines.next_line() {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            if line.is_empty() || is_prelude(&line) {
                continue;
            }
            return Some(SockJsFrame::parse(&line));
        }
        match body.next().await? {
            Ok(chunk) => lines.push(chunk.as_ref()),
            Err(e) => return Some(Err(e.into())),
        }
    }
}

/// Opens SockJS sessions over `xhr_streaming`
pub struct XhrStreamingConnector {
    client: reqwest::Client,
    open_timeout: Duration,
    capacity: usize,
}

impl XhrStreamingConnector {
    pub fn new(open_timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), open_timeout)
    }

    pub fn with_client(client: reqwest::Client, open_timeout: Duration) -> Self {
        Self {
            client,
            open_timeout,
            capacity: 1024,
        }
    }

    async fn open_inner(&self, endpoint: &Url) -> Result<TransportHandle, TransportError> {
        let session = SessionUrl::generate(endpoint);
        let receive_url = session.transport_url("xhr_streaming")?;
        let send_url = session.transport_url("xhr_send")?;
        debug!(
            "Opening xhr-streaming session {} at {}",
            session.session_id(),
            receive_url
        );

        let response = self.client.post(receive_url).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Upgrade(format!(
                "HTTP {} from xhr_streaming",
                response.status()
            )));
        }

        let mut body = Box::pin(response.bytes_stream());
        let mut lines = LineBuffer::new();

        match next_frame(&mut body, &mut lines).await {
            Some(Ok(SockJsFrame::Open)) => {}
            Some(Ok(SockJsFrame::Close { code, reason })) => {
                return Err(TransportError::Upgrade(format!(
                    "session closed during open ({}: {})",
                    code, reason
                )));
            }
            Some(Ok(other)) => {
                return Err(TransportError::Framing(format!(
                    "expected open frame, got {:?}",
                    other
                )));
            }
            Some(Err(e)) => return Err(e),
            None => {
                return Err(TransportError::Connection(
                    "stream ended before open".to_string(),
                ));
            }
        }

        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(self.capacity);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(self.capacity);

        // Incoming frames
        let reader_tx = event_tx.clone();
        let reader = tokio::spawn(async move {
            loop {
                let event = match next_frame(&mut body, &mut lines).await {
                    Some(Ok(SockJsFrame::Messages(messages))) => {
                        for message in messages {
                            if reader_tx.send(TransportEvent::Message(message)).await.is_err() {
                                return;
                            }
                        }
                        continue;
                    }
                    Some(Ok(SockJsFrame::Open)) | Some(Ok(SockJsFrame::Heartbeat)) => continue,
                    Some(Ok(SockJsFrame::Close { code, reason })) => TransportEvent::Closed {
                        code: Some(code),
                        reason,
                    },
                    Some(Err(TransportError::Framing(e))) => {
                        warn!("Dropping malformed SockJS frame: {}", e);
                        continue;
                    }
                    Some(Err(e)) => TransportEvent::Error(e.to_string()),
                    None => TransportEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    },
                };
                let _ = reader_tx.send(event).await;
                return;
            }
        });

        // Outgoing messages, one POST each
        let client = self.client.clone();
        tokio::spawn(async move {
            while let Some(cmd) = out_rx.recv().await {
                let data = match cmd {
                    Outbound::Data(data) => data,
                    Outbound::Close => break,
                };
                let result = match encode_messages(&[data.as_str()]) {
                    Ok(frame) => client
                        .post(send_url.clone())
                        .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
                        .body(frame)
                        .send()
                        .await
                        .map_err(TransportError::from)
                        .and_then(|response| {
                            if response.status().is_success() {
                                Ok(())
                            } else {
                                Err(TransportError::Send(format!(
                                    "HTTP {} from xhr_send",
                                    response.status()
                                )))
                            }
                        }),
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                    break;
                }
            }
            reader.abort();
        });

        Ok(TransportHandle::from_channels(
            TransportKind::XhrStreaming,
            out_tx,
            event_rx,
        ))
    }
}

impl Default for XhrStreamingConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Connector for XhrStreamingConnector {
    async fn open(&self, endpoint: &Url) -> Result<TransportHandle, TransportError> {
        timeout(self.open_timeout, self.open_inner(endpoint))
            .await
            .map_err(|_| TransportError::Timeout(self.open_timeout))?
    }

    fn name(&self) -> &str {
        "xhr-streaming"
    }
}
