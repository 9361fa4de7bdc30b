//! Session configuration

use geotrackr_transport::Url;
use std::time::Duration;

use crate::backoff::ReconnectPolicy;
use crate::frame::{Command, Frame};
use crate::heartbeat::HeartbeatSpec;

pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(10);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: Url,
    /// How often we offer to send heart-beats
    pub heartbeat_outgoing: Duration,
    /// How often we ask the server to send heart-beats
    pub heartbeat_incoming: Duration,
    pub reconnect: ReconnectPolicy,
    /// CONNECTING without a CONNECTED frame for this long is a failure
    pub handshake_timeout: Duration,
    /// How long `disconnect` waits for the DISCONNECT receipt
    pub disconnect_timeout: Duration,
    /// Extra CONNECT headers (credentials, tokens)
    pub connect_headers: Vec<(String, String)>,
}

impl SessionConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            heartbeat_outgoing: DEFAULT_HEARTBEAT,
            heartbeat_incoming: DEFAULT_HEARTBEAT,
            reconnect: ReconnectPolicy::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
            connect_headers: Vec::new(),
        }
    }

    /// Zero disables a direction
    pub fn with_heartbeat(mut self, outgoing: Duration, incoming: Duration) -> Self {
        self.heartbeat_outgoing = outgoing;
        self.heartbeat_incoming = incoming;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_reconnect_delay(self, delay: Duration) -> Self {
        self.with_reconnect(ReconnectPolicy::Constant(delay))
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    pub fn with_connect_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.connect_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_bearer_token(self, token: impl AsRef<str>) -> Self {
        self.with_connect_header("Authorization", format!("Bearer {}", token.as_ref()))
    }

    pub fn heartbeat_spec(&self) -> HeartbeatSpec {
        HeartbeatSpec::new(self.heartbeat_outgoing, self.heartbeat_incoming)
    }

    pub(crate) fn connect_frame(&self) -> Frame {
        let mut frame = Frame::new(Command::Connect)
            .with_header("accept-version", "1.2,1.1,1.0")
            .with_header("host", self.endpoint.host_str().unwrap_or("localhost"))
            .with_header("heart-beat", self.heartbeat_spec().header_value());
        for (name, value) in &self.connect_headers {
            frame = frame.with_header(name.clone(), value.clone());
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new(Url::parse("http://localhost:8080/ws/location").unwrap());
        assert_eq!(config.heartbeat_outgoing, Duration::from_secs(10));
        assert_eq!(config.heartbeat_incoming, Duration::from_secs(10));
        assert_eq!(config.reconnect, ReconnectPolicy::Constant(Duration::from_secs(5)));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_connect_frame() {
        let config = SessionConfig::new(Url::parse("https://tracker.example/ws/location").unwrap())
            .with_heartbeat(Duration::from_secs(4), Duration::ZERO)
            .with_bearer_token("abc");
        let frame = config.connect_frame();

        assert_eq!(frame.command, Command::Connect);
        assert_eq!(frame.header("accept-version"), Some("1.2,1.1,1.0"));
        assert_eq!(frame.header("host"), Some("tracker.example"));
        assert_eq!(frame.header("heart-beat"), Some("4000,0"));
        assert_eq!(frame.header("Authorization"), Some("Bearer abc"));
    }
}
