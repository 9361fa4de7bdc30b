//! Destinations used on the tracking server

/// Topic names for subscriptions and the outbound destination
///
/// The `/topic/...` names are broadcast by the server; `/app/...` names are
/// handled by it.
pub struct Topics;

impl Topics {
    /// Every position update: `PositionEvent`
    pub const LOCATION_ALL: &'static str = "/topic/location/all";

    /// Zone crossings as the dashboard subscribes to them: `ZoneCrossingEvent`
    pub const GEOFENCE_EVENTS: &'static str = "/topic/geofence/events";

    /// Device signal status: `DeviceStatus`
    pub const GPS_STATUS: &'static str = "/topic/gps/status";

    /// Server-wide notices: `SystemNotice`
    pub const NOTIFICATIONS: &'static str = "/topic/notifications";

    /// Inbound position reports: `LocationUpdate`
    pub const LOCATION_UPDATE: &'static str = "/app/location/update";

    /// Positions of one asset: `/topic/location/7`
    pub fn location(asset_id: u64) -> String {
        format!("/topic/location/{}", asset_id)
    }

    /// Crossings of one asset: `/topic/events/asset/7`
    pub fn asset_events(asset_id: u64) -> String {
        format!("/topic/events/asset/{}", asset_id)
    }

    /// Crossings of one zone: `/topic/events/geofence/3`
    pub fn zone_events(zone_id: u64) -> String {
        format!("/topic/events/geofence/{}", zone_id)
    }

    /// Every zone crossing as the server broadcasts it: `ZoneCrossingEvent`
    pub const EVENTS_ALL: &'static str = "/topic/events/all";

    /// Topics a default client subscribes to
    ///
    /// Both crossing topics are included. A crossing seen on each is dropped
    /// once by its `eventId`.
    pub fn defaults() -> Vec<String> {
        [
            Self::LOCATION_ALL,
            Self::EVENTS_ALL,
            Self::GEOFENCE_EVENTS,
            Self::GPS_STATUS,
            Self::NOTIFICATIONS,
        ]
        .iter()
        .map(|t| t.to_string())
        .collect()
    }

    pub fn is_position(topic: &str) -> bool {
        topic == Self::LOCATION_ALL || topic.starts_with("/topic/location/")
    }

    pub fn is_crossing(topic: &str) -> bool {
        topic == Self::GEOFENCE_EVENTS || topic.starts_with("/topic/events/")
    }
}
