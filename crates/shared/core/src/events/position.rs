use serde::{Deserialize, Serialize};

use super::{ValidationError, validate_coordinates};
use crate::values::{AssetId, Timestamp, wire_time};

/// Category of a tracked asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    Vehicle,
    Person,
    Device,
    Package,
    /// Any category this client does not know about yet
    #[serde(other)]
    Other,
}

/// A position report broadcast for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEvent {
    pub asset_id: AssetId,
    pub asset_name: String,
    pub asset_type: AssetKind,
    pub latitude: f64,
    pub longitude: f64,
    /// When the position was recorded (not when it arrived)
    #[serde(with = "wire_time")]
    pub timestamp: Timestamp,
    /// km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Degrees, 0-360
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellites: Option<u32>,
    /// Horizontal accuracy in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl PositionEvent {
    /// Create a position event without GPS quality metrics
    pub fn new(
        asset_id: AssetId,
        asset_name: impl Into<String>,
        asset_type: AssetKind,
        latitude: f64,
        longitude: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            asset_id,
            asset_name: asset_name.into(),
            asset_type,
            latitude,
            longitude,
            timestamp,
            speed: None,
            heading: None,
            satellites: None,
            accuracy: None,
        }
    }

    /// Check the event against the domain rules
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.asset_name.trim().is_empty() {
            return Err(ValidationError::Empty("assetName"));
        }
        validate_coordinates(self.latitude, self.longitude)?;

        if let Some(speed) = self.speed
            && (!speed.is_finite() || speed < 0.0)
        {
            return Err(ValidationError::OutOfRange {
                field: "speed",
                value: speed,
            });
        }
        if let Some(heading) = self.heading
            && (!heading.is_finite() || !(0.0..=360.0).contains(&heading))
        {
            return Err(ValidationError::OutOfRange {
                field: "heading",
                value: heading,
            });
        }
        if let Some(accuracy) = self.accuracy
            && (!accuracy.is_finite() || accuracy < 0.0)
        {
            return Err(ValidationError::OutOfRange {
                field: "accuracy",
                value: accuracy,
            });
        }
        Ok(())
    }
}
