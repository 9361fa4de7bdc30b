//! SockJS framing
//!
//! The stream endpoint speaks SockJS on every transport. Server frames are a
//! single type letter followed by an optional JSON payload:
//!
//! ```text
//! o                     session open
//! h                     heartbeat
//! a["msg1","msg2"]      one or more application messages
//! c[3000,"Go away!"]    session closed
//! ```
//!
//! Clients send a JSON array of strings. Every transport lives under
//! `{base}/{server-id}/{session-id}/{transport}`.

use rand::Rng;
use url::Url;
use uuid::Uuid;

use crate::error::TransportError;

/// One frame received from a SockJS server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    Open,
    Heartbeat,
    Messages(Vec<String>),
    Close { code: u16, reason: String },
}

impl SockJsFrame {
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let raw = raw.trim_end_matches(['\n', '\r']);
        let mut chars = raw.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Framing("empty frame".to_string()))?;
        let payload = chars.as_str();

        match kind {
            'o' => Ok(SockJsFrame::Open),
            'h' => Ok(SockJsFrame::Heartbeat),
            'a' => Ok(SockJsFrame::Messages(serde_json::from_str(payload)?)),
            // Single-message frame from older servers
            'm' => Ok(SockJsFrame::Messages(vec![serde_json::from_str(payload)?])),
            'c' => {
                let (code, reason): (u16, String) = serde_json::from_str(payload)?;
                Ok(SockJsFrame::Close { code, reason })
            }
            other => Err(TransportError::Framing(format!(
                "unknown frame type '{}'",
                other
            ))),
        }
    }
}

/// Encode outgoing messages as a SockJS client frame
pub fn encode_messages(messages: &[&str]) -> Result<String, TransportError> {
    Ok(serde_json::to_string(messages)?)
}

/// Streaming transports open with a long run of `h` to defeat proxy buffering
pub fn is_prelude(line: &str) -> bool {
    line.len() > 1 && line.bytes().all(|b| b == b'h')
}

/// Addresses of one SockJS session
#[derive(Debug, Clone)]
pub struct SessionUrl {
    base: String,
    server_id: String,
    session_id: String,
}

impl SessionUrl {
    /// Pick a random server id (000-999) and session id
    pub fn generate(endpoint: &Url) -> Self {
        let server_id = format!("{:03}", rand::thread_rng().gen_range(0..1000));
        let session_id = Uuid::new_v4().simple().to_string();
        Self::new(endpoint, server_id, session_id)
    }

    pub fn new(endpoint: &Url, server_id: String, session_id: String) -> Self {
        Self {
            base: endpoint.as_str().trim_end_matches('/').to_string(),
            server_id,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// URL of a transport under this session, e.g. `xhr_streaming`
    pub fn transport_url(&self, transport: &str) -> Result<Url, TransportError> {
        Ok(Url::parse(&format!(
            "{}/{}/{}/{}",
            self.base, self.server_id, self.session_id, transport
        ))?)
    }

    /// `ws(s)://` URL of the websocket transport
    pub fn websocket_url(&self) -> Result<Url, TransportError> {
        let mut url = self.transport_url("websocket")?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TransportError::Endpoint(format!(
                    "unsupported scheme '{}'",
                    other
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| TransportError::Endpoint(format!("cannot use scheme '{}'", scheme)))?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frames() {
        assert_eq!(SockJsFrame::parse("o").unwrap(), SockJsFrame::Open);
        assert_eq!(SockJsFrame::parse("h\n").unwrap(), SockJsFrame::Heartbeat);
        assert_eq!(
            SockJsFrame::parse(r#"a["one","two\n"]"#).unwrap(),
            SockJsFrame::Messages(vec!["one".to_string(), "two\n".to_string()])
        );
        assert_eq!(
            SockJsFrame::parse(r#"c[3000,"Go away!"]"#).unwrap(),
            SockJsFrame::Close {
                code: 3000,
                reason: "Go away!".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SockJsFrame::parse("").is_err());
        assert!(SockJsFrame::parse("x").is_err());
        assert!(SockJsFrame::parse("a[1,2]").is_err());
    }

    #[test]
    fn test_encode_messages_escapes_control_characters() {
        let frame = encode_messages(&["CONNECT\n\n\0"]).unwrap();
        assert_eq!(frame, r#"["CONNECT\n\n\u0000"]"#);
    }

    #[test]
    fn test_prelude() {
        assert!(is_prelude(&"h".repeat(2048)));
        assert!(!is_prelude("h"));
        assert!(!is_prelude("hha"));
    }

    #[test]
    fn test_session_urls() {
        let endpoint = Url::parse("http://localhost:8080/ws/location/").unwrap();
        let session = SessionUrl::new(&endpoint, "123".to_string(), "abc".to_string());

        assert_eq!(
            session.transport_url("xhr_send").unwrap().as_str(),
            "http://localhost:8080/ws/location/123/abc/xhr_send"
        );
        assert_eq!(
            session.websocket_url().unwrap().as_str(),
            "ws://localhost:8080/ws/location/123/abc/websocket"
        );
    }

    #[test]
    fn test_generated_ids() {
        let endpoint = Url::parse("https://tracker.example/ws/location").unwrap();
        let session = SessionUrl::generate(&endpoint);
        assert_eq!(session.server_id.len(), 3);
        assert!(!session.session_id().is_empty());
        assert!(session.websocket_url().unwrap().as_str().starts_with("wss://"));
    }
}
