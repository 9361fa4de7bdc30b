use serde::{Deserialize, Serialize};

use crate::events::{ValidationError, validate_coordinates};
use crate::values::{AssetId, Timestamp, wire_time};

/// Position report published by a client that is itself a position source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub asset_id: AssetId,
    pub latitude: f64,
    pub longitude: f64,
    /// Server stamps the update on receipt when absent
    #[serde(
        default,
        with = "wire_time::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<Timestamp>,
}

impl LocationUpdate {
    pub fn new(asset_id: AssetId, latitude: f64, longitude: f64) -> Self {
        Self {
            asset_id,
            latitude,
            longitude,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_coordinates(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_without_empty_timestamp() {
        let json = serde_json::to_string(&LocationUpdate::new(3, 1.5, 2.5)).unwrap();
        assert_eq!(json, r#"{"assetId":3,"latitude":1.5,"longitude":2.5}"#);
    }

    #[test]
    fn test_serializes_offset_less_timestamp() {
        let ts = wire_time::parse("2024-05-01T10:15:30Z").unwrap();
        let json = serde_json::to_string(&LocationUpdate::new(3, 1.5, 2.5).at(ts)).unwrap();
        assert!(json.contains(r#""timestamp":"2024-05-01T10:15:30.000""#));
    }

    #[test]
    fn test_validate() {
        assert!(LocationUpdate::new(1, 45.0, 200.0).validate().is_err());
        assert!(LocationUpdate::new(1, 45.0, 100.0).validate().is_ok());
    }
}
