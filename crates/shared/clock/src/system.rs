use chrono::Utc;
use geotrackr_core::Timestamp;
use geotrackr_ports::Clock;

/// UTC wall clock, the default for a built `SyncClient`
///
/// Stamps each stream arrival in the reconciliation buffers, the moment a
/// REST snapshot response comes back, and the session's connection
/// timestamps. Those stamps decide whether a snapshot or a later stream
/// position owns an asset's reconciled view, so they must come from one
/// clock per client.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "system clock (UTC)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stamps_follow_wall_time() {
        let clock = SystemClock::new();
        let before = Utc::now();
        let first = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let second = clock.now();

        assert!(first >= before);
        assert!(second - first >= chrono::Duration::milliseconds(9));
        assert!(second <= Utc::now());
    }
}
