use geotrackr_core::{AssetId, EventId, Timestamp, ZoneId};
use thiserror::Error;

/// Failure of a user-facing side effect
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

/// Presentation class of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    ZoneEnter,
    ZoneExit,
    /// Server-wide notice, not tied to a crossing
    System,
}

/// A user-facing alert
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub asset_id: Option<AssetId>,
    pub zone_id: Option<ZoneId>,
    pub event_id: Option<EventId>,
    pub occurred_at: Option<Timestamp>,
}

/// Vibration patterns in milliseconds (on, off, on, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HapticPattern {
    /// One short pulse
    Pulse,
    /// Two short pulses
    DoublePulse,
}

impl HapticPattern {
    pub fn timings_ms(&self) -> &'static [u64] {
        match self {
            HapticPattern::Pulse => &[200],
            HapticPattern::DoublePulse => &[100, 50, 100],
        }
    }
}

/// Port for showing notifications to the operator
///
/// Called inline on the stream task, so implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), DispatchError>;
}

/// Port for tactile feedback, where the host supports it
pub trait Haptics: Send + Sync {
    fn vibrate(&self, pattern: HapticPattern) -> Result<(), DispatchError>;
}
