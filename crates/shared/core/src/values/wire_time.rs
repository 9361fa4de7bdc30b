//! Wire timestamp format
//!
//! The server emits local date-times without an offset
//! (`2024-05-01T10:15:30.123`), occasionally RFC 3339 strings, and, when its
//! JSON mapper is left on defaults, arrays of date-time parts
//! (`[2024,5,1,10,15,30,123000000]`). All of them are read as UTC.
//! Outbound timestamps are written offset-less so the server can bind them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer, de};

use super::Timestamp;

const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Text(String),
    Parts(Vec<u32>),
}

/// Parse a textual wire timestamp
pub fn parse(raw: &str) -> Option<Timestamp> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

/// Build a timestamp from `[year, month, day, hour, minute, second, nanos]`
fn from_parts(parts: &[u32]) -> Option<Timestamp> {
    let part = |i: usize| parts.get(i).copied().unwrap_or(0);
    if parts.len() < 3 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(part(0) as i32, part(1), part(2))?;
    let naive = date.and_hms_nano_opt(part(3), part(4), part(5), part(6))?;
    Some(naive.and_utc())
}

/// Format a timestamp the way the server expects it
pub fn format(ts: &Timestamp) -> String {
    ts.naive_utc().format(WIRE_FORMAT).to_string()
}

pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
    match RawTime::deserialize(deserializer)? {
        RawTime::Text(text) => {
            parse(&text).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {text}")))
        }
        RawTime::Parts(parts) => {
            from_parts(&parts).ok_or_else(|| de::Error::custom("invalid timestamp parts"))
        }
    }
}

/// Same format for `Option<Timestamp>` fields
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        ts: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => super::serialize(ts, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        match Option::<RawTime>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawTime::Text(text)) => parse(&text)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {text}"))),
            Some(RawTime::Parts(parts)) => from_parts(&parts)
                .map(Some)
                .ok_or_else(|| de::Error::custom("invalid timestamp parts")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_local_date_time() {
        let ts = parse("2024-05-01T10:15:30.123").unwrap();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn test_parse_without_fraction() {
        assert!(parse("2024-05-01T10:15:30").is_some());
    }

    #[test]
    fn test_parse_rfc3339_normalizes_to_utc() {
        let ts = parse("2024-05-01T12:15:30+02:00").unwrap();
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse("yesterday").is_none());
    }

    #[test]
    fn test_parts() {
        let ts = from_parts(&[2024, 5, 1, 10, 15, 30, 5_000_000]).unwrap();
        assert_eq!(ts.minute(), 15);
        assert_eq!(ts.timestamp_subsec_millis(), 5);
        assert!(from_parts(&[2024, 13, 1]).is_none());
    }

    #[test]
    fn test_format_is_offset_less() {
        let ts = parse("2024-05-01T10:15:30.120Z").unwrap();
        assert_eq!(format(&ts), "2024-05-01T10:15:30.120");
    }
}
