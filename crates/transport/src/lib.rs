//! Transport layer for the GeoTrackr stream client
//!
//! Opens a bidirectional text-message stream to the tracking server. The
//! server speaks SockJS, so the preferred transport is a native WebSocket
//! and the fallback is chunked HTTP streaming.
//!
//! # Connectors
//!
//! - [`WebSocketConnector`] - SockJS over `ws(s)://…/websocket`
//! - [`XhrStreamingConnector`] - SockJS over `xhr_streaming` + `xhr_send`
//! - [`FallbackConnector`] - tries one connector, then another
//! - [`ChannelConnector`] - in-process, for single-process runs and tests
//!
//! Every connector yields a [`TransportHandle`]; the session layer never
//! knows which transport it is on.

pub mod channel;
pub mod connector;
pub mod error;
pub mod fallback;
pub mod sockjs;
pub mod streaming;
pub mod websocket;

pub use channel::{ChannelConnector, PeerEnd, PeerListener};
pub use connector::{Connector, TransportEvent, TransportHandle, TransportKind};
pub use error::TransportError;
pub use fallback::FallbackConnector;
pub use streaming::XhrStreamingConnector;
pub use websocket::WebSocketConnector;

pub use url::Url;
