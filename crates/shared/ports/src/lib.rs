//! GeoTrackr Ports
//!
//! Port definitions (traits) for the GeoTrackr live sync client.
//! These define the boundaries between the sync core and its collaborators:
//! time, user-facing notifications, tactile alerts and the polled asset
//! snapshot. The diagnostics channel lives here as well since every layer
//! reports swallowed errors through it.

mod clock;
mod diagnostics;
mod notify;
mod snapshot;

pub use clock::Clock;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use notify::{
    DispatchError, HapticPattern, Haptics, Notification, NotificationKind, Notifier,
};
pub use snapshot::{FetchError, SnapshotSource};
