use chrono::{DateTime, Utc};

pub mod wire_time;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Server-assigned identifier of a tracked asset
pub type AssetId = u64;

/// Server-assigned identifier of a zone (geofence)
pub type ZoneId = u64;

/// Server-assigned identifier of a zone-crossing event
///
/// Not guaranteed to increase across reconnects, so it is only ever used
/// for duplicate detection, never for ordering.
pub type EventId = u64;
