//! Payload decoding and validation
//!
//! Each topic carries one event shape. Decoders are looked up per topic, so
//! new shapes are added without touching the existing ones. A payload that
//! fails parsing or validation is reported and dropped; it never reaches the
//! store.

use geotrackr_core::{DeviceStatus, PositionEvent, SystemNotice, ValidationError, ZoneCrossingEvent};
use log::debug;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::topics::Topics;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Json(String),

    #[error("Invalid event: {0}")]
    Invalid(#[from] ValidationError),

    #[error("No decoder for topic {0}")]
    UnknownTopic(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e.to_string())
    }
}

/// A decoded, validated stream payload
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Position(PositionEvent),
    Crossing(ZoneCrossingEvent),
    Status(DeviceStatus),
    Notice(SystemNotice),
}

/// Decoder for the payloads of one or more topics
pub trait EventDecoder: Send + Sync {
    fn can_decode(&self, topic: &str) -> bool;

    fn decode(&self, body: &str) -> Result<StreamEvent, DecodeError>;
}

fn parse<T: DeserializeOwned>(body: &str) -> Result<T, DecodeError> {
    Ok(serde_json::from_str(body)?)
}

pub struct PositionDecoder;

impl EventDecoder for PositionDecoder {
    fn can_decode(&self, topic: &str) -> bool {
        Topics::is_position(topic)
    }

    fn decode(&self, body: &str) -> Result<StreamEvent, DecodeError> {
        let event: PositionEvent = parse(body)?;
        event.validate()?;
        Ok(StreamEvent::Position(event))
    }
}

pub struct CrossingDecoder;

impl EventDecoder for CrossingDecoder {
    fn can_decode(&self, topic: &str) -> bool {
        Topics::is_crossing(topic)
    }

    fn decode(&self, body: &str) -> Result<StreamEvent, DecodeError> {
        let event: ZoneCrossingEvent = parse(body)?;
        event.validate()?;
        Ok(StreamEvent::Crossing(event))
    }
}

/// Device status is informational; any JSON object is accepted
pub struct StatusDecoder;

impl EventDecoder for StatusDecoder {
    fn can_decode(&self, topic: &str) -> bool {
        topic == Topics::GPS_STATUS
    }

    fn decode(&self, body: &str) -> Result<StreamEvent, DecodeError> {
        Ok(StreamEvent::Status(parse(body)?))
    }
}

pub struct NoticeDecoder;

impl EventDecoder for NoticeDecoder {
    fn can_decode(&self, topic: &str) -> bool {
        topic == Topics::NOTIFICATIONS
    }

    fn decode(&self, body: &str) -> Result<StreamEvent, DecodeError> {
        Ok(StreamEvent::Notice(parse(body)?))
    }
}

/// All decoders known to the client, first match wins
pub struct DecoderSet {
    decoders: Vec<Box<dyn EventDecoder>>,
}

impl Default for DecoderSet {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderSet {
    /// Decoders for positions, crossings, device status and notices
    pub fn new() -> Self {
        Self {
            decoders: vec![
                Box::new(PositionDecoder),
                Box::new(CrossingDecoder),
                Box::new(StatusDecoder),
                Box::new(NoticeDecoder),
            ],
        }
    }

    pub fn with_decoders(decoders: Vec<Box<dyn EventDecoder>>) -> Self {
        Self { decoders }
    }

    pub fn add_decoder(&mut self, decoder: Box<dyn EventDecoder>) {
        self.decoders.push(decoder);
    }

    pub fn decode(&self, topic: &str, body: &str) -> Result<StreamEvent, DecodeError> {
        let decoder = self
            .decoders
            .iter()
            .find(|d| d.can_decode(topic))
            .ok_or_else(|| DecodeError::UnknownTopic(topic.to_string()))?;

        let result = decoder.decode(body);
        if let Err(e) = &result {
            debug!("Rejected payload on {}: {}", topic, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrackr_core::{CrossingType, NoticeLevel, SignalStatus};

    const POSITION: &str = r#"{"assetId":7,"assetName":"Truck 7","assetType":"VEHICLE",
        "latitude":40.7,"longitude":-74.0,"timestamp":"2024-05-01T10:15:30.123",
        "speed":12.5,"heading":90.0,"satellites":9,"accuracy":3.2}"#;

    const CROSSING: &str = r#"{"eventId":31,"assetId":7,"assetName":"Truck 7",
        "geofenceId":3,"geofenceName":"Depot","eventType":"EXIT",
        "latitude":40.7,"longitude":-74.0,"timestamp":"2024-05-01T10:15:30",
        "message":"Truck 7 exited Depot"}"#;

    #[test]
    fn test_decode_position() {
        let decoders = DecoderSet::new();
        let StreamEvent::Position(event) = decoders.decode(Topics::LOCATION_ALL, POSITION).unwrap()
        else {
            panic!("expected position");
        };
        assert_eq!(event.asset_id, 7);
        assert_eq!(event.satellites, Some(9));
    }

    #[test]
    fn test_decode_crossing_on_entity_topic() {
        let decoders = DecoderSet::new();
        let StreamEvent::Crossing(event) =
            decoders.decode(&Topics::zone_events(3), CROSSING).unwrap()
        else {
            panic!("expected crossing");
        };
        assert_eq!(event.zone_id, 3);
        assert_eq!(event.crossing_type, CrossingType::Exit);
    }

    #[test]
    fn test_decode_status_and_notice() {
        let decoders = DecoderSet::new();
        assert!(matches!(
            decoders.decode(Topics::GPS_STATUS, r#"{"assetId":7,"status":"WEAK_SIGNAL"}"#),
            Ok(StreamEvent::Status(DeviceStatus { status: Some(SignalStatus::WeakSignal), .. }))
        ));
        assert!(matches!(
            decoders.decode(
                Topics::NOTIFICATIONS,
                r#"{"type":"WARNING","title":"Maintenance","message":"Back soon"}"#
            ),
            Ok(StreamEvent::Notice(SystemNotice { level: NoticeLevel::Warning, .. }))
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let decoders = DecoderSet::new();
        assert!(matches!(
            decoders.decode(Topics::LOCATION_ALL, "{not json"),
            Err(DecodeError::Json(_))
        ));
        // Position payload on the crossing topic lacks the crossing fields
        assert!(matches!(
            decoders.decode(Topics::GEOFENCE_EVENTS, POSITION),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_coordinates() {
        let decoders = DecoderSet::new();
        let body = POSITION.replace("40.7", "91.0");
        assert!(matches!(
            decoders.decode(Topics::LOCATION_ALL, &body),
            Err(DecodeError::Invalid(ValidationError::OutOfRange { field: "latitude", .. }))
        ));
    }

    #[test]
    fn test_unknown_topic() {
        let decoders = DecoderSet::new();
        assert_eq!(
            decoders.decode("/topic/other", "{}"),
            Err(DecodeError::UnknownTopic("/topic/other".to_string()))
        );
    }

    #[test]
    fn test_custom_decoder_added() {
        struct Echo;
        impl EventDecoder for Echo {
            fn can_decode(&self, topic: &str) -> bool {
                topic == "/topic/custom"
            }
            fn decode(&self, _body: &str) -> Result<StreamEvent, DecodeError> {
                Ok(StreamEvent::Status(DeviceStatus::default()))
            }
        }

        let mut decoders = DecoderSet::new();
        decoders.add_decoder(Box::new(Echo));
        assert!(decoders.decode("/topic/custom", "").is_ok());
    }
}
