use serde::{Deserialize, Serialize};

use crate::events::AssetKind;
use crate::values::{AssetId, Timestamp, wire_time};

/// One asset row from the polled asset list
///
/// This is the authoritative view maintained by the REST collaborator;
/// coordinates are absent for assets that never reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSnapshot {
    pub id: AssetId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub current_latitude: Option<f64>,
    #[serde(default)]
    pub current_longitude: Option<f64>,
    #[serde(default, with = "wire_time::option")]
    pub last_update: Option<Timestamp>,
    #[serde(default)]
    pub active: bool,
}

impl AssetSnapshot {
    /// Last known coordinates, if the asset ever reported
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.current_latitude, self.current_longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_row() {
        let json = r#"{"id":4,"name":"Van","type":"VEHICLE","currentLatitude":1.0,
            "currentLongitude":2.0,"lastUpdate":"2024-05-01T10:15:30","active":true}"#;
        let row: AssetSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(row.position(), Some((1.0, 2.0)));
        assert!(row.active);
    }

    #[test]
    fn test_row_without_position() {
        let json = r#"{"id":4,"name":"Van","type":"PACKAGE","active":false}"#;
        let row: AssetSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(row.position(), None);
        assert_eq!(row.last_update, None);
    }
}
