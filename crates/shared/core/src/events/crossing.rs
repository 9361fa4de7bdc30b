use serde::{Deserialize, Serialize};

use super::{ValidationError, validate_coordinates};
use crate::values::{AssetId, EventId, Timestamp, ZoneId, wire_time};

/// Direction of a zone crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CrossingType {
    Enter,
    Exit,
}

impl CrossingType {
    /// Past-tense verb used in user-facing text
    pub fn verb(&self) -> &'static str {
        match self {
            CrossingType::Enter => "entered",
            CrossingType::Exit => "exited",
        }
    }
}

/// An asset entered or exited a zone
///
/// The server names zones "geofences" on the wire; both spellings are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneCrossingEvent {
    pub event_id: EventId,
    pub asset_id: AssetId,
    pub asset_name: String,
    #[serde(alias = "geofenceId")]
    pub zone_id: ZoneId,
    #[serde(alias = "geofenceName")]
    pub zone_name: String,
    #[serde(alias = "eventType")]
    pub crossing_type: CrossingType,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "wire_time")]
    pub timestamp: Timestamp,
    #[serde(default)]
    pub message: String,
}

impl ZoneCrossingEvent {
    /// Check the event against the domain rules
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.asset_name.trim().is_empty() {
            return Err(ValidationError::Empty("assetName"));
        }
        if self.zone_name.trim().is_empty() {
            return Err(ValidationError::Empty("zoneName"));
        }
        validate_coordinates(self.latitude, self.longitude)
    }

    /// Server-provided text, or a generated one when the server sent none
    pub fn describe(&self) -> String {
        if self.message.trim().is_empty() {
            format!(
                "{} has {} {}",
                self.asset_name,
                self.crossing_type.verb(),
                self.zone_name
            )
        } else {
            self.message.clone()
        }
    }
}
