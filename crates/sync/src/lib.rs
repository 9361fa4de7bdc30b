//! GeoTrackr live sync
//!
//! Turns the raw stream into a consistent, bounded view:
//!
//! ```text
//! StompClient ──► DecoderSet ──► ReconciliationStore ──► NotificationDispatcher
//!   (topic)       (validate)      (buffers, latest,        (notifier, haptics,
//!                                  reconciled view)         snapshot refresh)
//! ```
//!
//! Consumers read through a [`StoreHandle`] and follow connectivity through
//! [`SyncClient::connectivity`].

pub mod buffer;
pub mod client;
pub mod decoder;
pub mod dispatcher;
pub mod store;
pub mod topics;

pub use buffer::{DEFAULT_CAPACITY, EventBuffer};
pub use client::{Pipeline, SyncClient, SyncClientBuilder, SyncConfig, SyncError};
pub use decoder::{
    CrossingDecoder, DecodeError, DecoderSet, EventDecoder, NoticeDecoder, PositionDecoder,
    StatusDecoder, StreamEvent,
};
pub use dispatcher::{NotificationDispatcher, RefreshCoordinator, RefreshStats};
pub use store::{
    Appended, ReconciledAssetState, ReconciliationStore, Source, StoreHandle, StoreStats,
};
pub use topics::Topics;
