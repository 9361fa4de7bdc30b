//! GeoTrackr Clocks
//!
//! Arrival stamps and snapshot freshness are all taken from a [`Clock`]:
//!
//! - [`SystemClock`] reads the wall clock (production)
//! - [`ManualClock`] only moves when told to (tests, replays)
//!
//! ```ignore
//! use geotrackr_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::starting_at(start);
//! clock.advance(Duration::seconds(5));
//! assert_eq!(clock.now(), start + Duration::seconds(5));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use geotrackr_ports::Clock;
