use serde::Serialize;

use crate::values::Timestamp;

/// An event stamped with its local arrival
///
/// `arrived_at` is the client's wall clock when the frame was decoded and is
/// distinct from any timestamp carried by the event itself. `sequence` is a
/// per-client arrival counter; together they are the only ordering signal
/// the client trusts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Received<T> {
    pub event: T,
    pub arrived_at: Timestamp,
    pub sequence: u64,
}

impl<T> Received<T> {
    pub fn new(event: T, arrived_at: Timestamp, sequence: u64) -> Self {
        Self {
            event,
            arrived_at,
            sequence,
        }
    }

    pub fn into_inner(self) -> T {
        self.event
    }
}
