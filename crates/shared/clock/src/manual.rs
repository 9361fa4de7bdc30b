use chrono::{Duration, Utc};
use geotrackr_core::Timestamp;
use geotrackr_ports::Clock;
use parking_lot::Mutex;

/// Clock that only advances when explicitly moved
///
/// Share it behind an `Arc` to drive the sync core deterministically.
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    /// Start at the current wall time
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Jump forward (or backward, with a negative duration)
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }

    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_frozen() {
        let clock = ManualClock::new();
        let t1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(clock.now(), t1);
    }

    #[test]
    fn test_advance_and_set() {
        let clock = ManualClock::new();
        let start = clock.now();

        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now() - start, Duration::seconds(5));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
