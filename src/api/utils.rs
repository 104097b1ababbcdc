//! Serde helpers for backend timestamps.
//!
//! The backend emits ISO-8601 timestamps, sometimes with an offset and sometimes
//! naive. Naive timestamps are UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de};

pub(super) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub(super) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {text}")))
}

pub(super) fn deserialize_opt_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {text}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    #[test]
    fn test_parse_timestamp() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 8, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-11-08T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-08T07:00:00-03:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-08T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-11-08 10:00:00"), Some(expected));

        let fractional = parse_timestamp("2025-11-08T10:00:00.250000").unwrap();
        assert_eq!(fractional.nanosecond(), 250_000_000);

        assert!(parse_timestamp("yesterday").is_none());
    }
}
