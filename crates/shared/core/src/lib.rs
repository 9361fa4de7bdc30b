//! GeoTrackr Core Domain
//!
//! Pure domain types for the GeoTrackr live sync client: the events carried
//! by the stream, the outbound location update, rows of the polled asset
//! snapshot and the arrival envelope.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod events;
pub mod location;
pub mod received;
pub mod snapshot;
pub mod values;

// Re-export commonly used types at crate root
pub use events::{
    AssetKind, CrossingType, DeviceStatus, NoticeLevel, PositionEvent, SignalStatus, SystemNotice,
    ValidationError, ZoneCrossingEvent,
};
pub use location::LocationUpdate;
pub use received::Received;
pub use snapshot::AssetSnapshot;
pub use values::{AssetId, EventId, Timestamp, ZoneId, wire_time};
