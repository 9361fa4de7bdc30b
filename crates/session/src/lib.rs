//! STOMP session layer for the GeoTrackr stream client
//!
//! Owns the single connection to the tracking server: opens the transport,
//! performs the STOMP handshake, keeps heart-beats flowing, routes MESSAGE
//! frames to per-topic handlers and recovers from failures by reconnecting
//! and replaying every subscription.
//!
//! # Example
//!
//! ```ignore
//! let client = StompClient::spawn(config, connector, clock, diagnostics);
//! client.subscribe("/topic/location/all", |d: &Delivery| {
//!     println!("{}", d.body);
//!     Ok(())
//! }).await?;
//! client.connect().await?;
//! ```

pub mod backoff;
pub mod client;
pub mod config;
mod driver;
pub mod error;
pub mod frame;
pub mod heartbeat;
pub mod state;
pub mod subscription;

pub use backoff::ReconnectPolicy;
pub use client::StompClient;
pub use config::SessionConfig;
pub use error::{FrameError, SessionError};
pub use frame::{Command, DEFAULT_MAX_FRAME_SIZE, Frame, FrameParser, Incoming};
pub use heartbeat::{HeartbeatSpec, Negotiated};
pub use state::{Connection, ConnectionState};
pub use subscription::{AckMode, Delivery, HandlerError, MessageHandler};
