//! Connection state

use geotrackr_core::Timestamp;
use geotrackr_transport::{TransportKind, Url};
use std::fmt;

/// Lifecycle of the single stream connection
///
/// ```text
/// DISCONNECTED -> CONNECTING -> CONNECTED -> DISCONNECTING -> DISCONNECTED
///                     |             |
///                     +--> ERROR <--+
///                            |
///                            +--(backoff)--> CONNECTING
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Error,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnecting => "DISCONNECTING",
            ConnectionState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Snapshot of the connection, published on every change
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub state: ConnectionState,
    pub endpoint: Url,
    /// Reconnect attempts since the last successful handshake
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub connected_at: Option<Timestamp>,
    pub transport: Option<TransportKind>,
}

impl Connection {
    pub fn new(endpoint: Url) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            endpoint,
            retry_count: 0,
            last_error: None,
            connected_at: None,
            transport: None,
        }
    }
}
