use geotrackr_core::Timestamp;

/// Source of arrival stamps
///
/// Every stamp the client records (buffered stream events, merged
/// snapshots, connection changes) goes through one shared `Clock`. Tests
/// swap in a manually driven one so snapshot-versus-stream races are
/// reproducible.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Shown in debug logs
    fn name(&self) -> &str {
        "clock"
    }
}
