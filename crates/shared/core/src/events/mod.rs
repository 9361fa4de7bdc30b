mod crossing;
mod notice;
mod position;
mod status;

pub use crossing::{CrossingType, ZoneCrossingEvent};
pub use notice::{NoticeLevel, SystemNotice};
pub use position::{AssetKind, PositionEvent};
pub use status::{DeviceStatus, SignalStatus};

use thiserror::Error;

/// A field failed domain validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Check a latitude/longitude pair
pub(crate) fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::OutOfRange {
            field: "latitude",
            value: latitude,
        });
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::OutOfRange {
            field: "longitude",
            value: longitude,
        });
    }
    Ok(())
}
