//! Timestamp parsing and formatting shared by documents and filters

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};

/// Parse an instant from either a full RFC 3339 timestamp or a bare
/// `YYYY-MM-DD` date.
///
/// A bare date resolves to midnight UTC on that day, which is also how the
/// index interprets date-only values. Sub-millisecond digits are truncated:
/// the index stores and compares dates at millisecond precision.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(to_millis(dt.with_timezone(&Utc)));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}': expected RFC 3339 or YYYY-MM-DD", raw))
}

/// Drop precision below one millisecond
pub fn to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

/// Render an instant the way it is written to and compared in the index
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter writing millisecond RFC 3339 strings and reading either
/// strings or epoch milliseconds.
pub mod serde_millis {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TimestampVisitor)
    }

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an RFC 3339 timestamp or epoch milliseconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse_timestamp(v).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Utc.timestamp_millis_opt(v)
                .single()
                .ok_or_else(|| E::custom(format!("epoch millis out of range: {}", v)))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            let millis = i64::try_from(v).map_err(E::custom)?;
            self.visit_i64(millis)
        }
    }
}
