//! Heart-beat negotiation
//!
//! Each side advertises `heart-beat: cx,cy` (client) and `sx,sy` (server),
//! in milliseconds: the first value is what it can send, the second what it
//! wants to receive. A direction is active only when both values involved
//! are non-zero, and then runs at the larger of the two.

use std::time::Duration;

use crate::error::FrameError;

/// One side's `heart-beat` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartbeatSpec {
    pub send_ms: u64,
    pub recv_ms: u64,
}

impl HeartbeatSpec {
    pub fn new(send: Duration, recv: Duration) -> Self {
        Self {
            send_ms: send.as_millis() as u64,
            recv_ms: recv.as_millis() as u64,
        }
    }

    pub fn parse(value: &str) -> Result<Self, FrameError> {
        let invalid = || FrameError::InvalidHeartbeat(value.to_string());
        let (send, recv) = value.split_once(',').ok_or_else(invalid)?;
        Ok(Self {
            send_ms: send.trim().parse().map_err(|_| invalid())?,
            recv_ms: recv.trim().parse().map_err(|_| invalid())?,
        })
    }

    pub fn header_value(&self) -> String {
        format!("{},{}", self.send_ms, self.recv_ms)
    }
}

/// Effective heart-beat timing for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiated {
    /// How often the client must send something
    pub outgoing: Option<Duration>,
    /// How often the server promised to send something
    pub incoming: Option<Duration>,
}

impl Negotiated {
    /// Silence from the server longer than this breaks the connection
    pub fn incoming_timeout(&self) -> Option<Duration> {
        self.incoming.map(|interval| interval * 2)
    }
}

pub fn negotiate(client: HeartbeatSpec, server: HeartbeatSpec) -> Negotiated {
    let pick = |a: u64, b: u64| {
        (a > 0 && b > 0).then(|| Duration::from_millis(a.max(b)))
    };
    Negotiated {
        outgoing: pick(client.send_ms, server.recv_ms),
        incoming: pick(client.recv_ms, server.send_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let spec = HeartbeatSpec::parse("10000, 5000").unwrap();
        assert_eq!(spec, HeartbeatSpec { send_ms: 10000, recv_ms: 5000 });
        assert_eq!(spec.header_value(), "10000,5000");

        assert!(HeartbeatSpec::parse("10000").is_err());
        assert!(HeartbeatSpec::parse("a,b").is_err());
    }

    #[test]
    fn test_negotiate_takes_larger_interval() {
        let client = HeartbeatSpec { send_ms: 10000, recv_ms: 10000 };
        let server = HeartbeatSpec { send_ms: 20000, recv_ms: 5000 };

        let negotiated = negotiate(client, server);
        assert_eq!(negotiated.outgoing, Some(Duration::from_secs(10)));
        assert_eq!(negotiated.incoming, Some(Duration::from_secs(20)));
        assert_eq!(negotiated.incoming_timeout(), Some(Duration::from_secs(40)));
    }

    #[test]
    fn test_zero_disables_direction() {
        let client = HeartbeatSpec { send_ms: 10000, recv_ms: 10000 };

        let negotiated = negotiate(client, HeartbeatSpec { send_ms: 0, recv_ms: 10000 });
        assert_eq!(negotiated.outgoing, Some(Duration::from_secs(10)));
        assert_eq!(negotiated.incoming, None);
        assert_eq!(negotiated.incoming_timeout(), None);

        let negotiated = negotiate(HeartbeatSpec::default(), HeartbeatSpec { send_ms: 5, recv_ms: 5 });
        assert_eq!(negotiated, Negotiated::default());
    }
}
