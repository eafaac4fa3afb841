//! `datetime` field encoding
//!
//! Timestamps travel as `YYYY-MM-DD HH:MM:SS.ffffff +ZZZZ`. Decoding also
//! accepts RFC 3339 so peers that emit ISO timestamps still interoperate.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer};

/// Wire format for the `datetime` field
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f %z";

/// Current time at wire precision
///
/// Truncated to microseconds so a timestamp survives an encode/decode cycle unchanged.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Render a timestamp in wire format
pub fn format(datetime: &DateTime<Utc>) -> String {
    datetime.format(FORMAT).to_string()
}

/// Parse a wire timestamp
pub fn parse(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(text, FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map(|datetime| datetime.with_timezone(&Utc))
}

/// Serde adapter used by `Header`
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse(&text).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_matches_wire_layout() {
        let datetime = Utc.with_ymd_and_hms(2016, 11, 2, 13, 5, 9).unwrap();
        assert_eq!(format(&datetime), "2016-11-02 13:05:09.000000 +0000");
    }

    #[test]
    fn test_parse_wire_and_rfc3339() {
        let wire = parse("2016-11-02 13:05:09.250000 +0000").unwrap();
        let iso = parse("2016-11-02T13:05:09.25Z").unwrap();
        assert_eq!(wire, iso);
    }

    #[test]
    fn test_parse_applies_offset() {
        let shifted = parse("2016-11-02 08:05:09.000000 -0500").unwrap();
        assert_eq!(shifted, Utc.with_ymd_and_hms(2016, 11, 2, 13, 5, 9).unwrap());
    }

    #[test]
    fn test_now_survives_format_cycle() {
        let stamp = now();
        assert_eq!(parse(&format(&stamp)).unwrap(), stamp);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("yesterday").is_err());
    }
}
