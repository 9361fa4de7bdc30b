use serde::{Deserialize, Serialize};

use crate::values::{AssetId, Timestamp, wire_time};

/// GPS link state reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Connected,
    Disconnected,
    WeakSignal,
    #[serde(other)]
    Unknown,
}

/// Device status broadcast
///
/// Every field is optional: the payload is informational and is only
/// decoded so malformed traffic shows up in diagnostics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default)]
    pub asset_id: Option<AssetId>,
    #[serde(default)]
    pub status: Option<SignalStatus>,
    #[serde(default)]
    pub satellites: Option<u32>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default, with = "wire_time::option")]
    pub timestamp: Option<Timestamp>,
}
