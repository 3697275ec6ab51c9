//! Serde adapters for the stored representation of timestamps and optional
//! fields. Timestamps travel as seconds since the Unix epoch; optional values
//! use the legacy sentinels (`0`, `""`) instead of being omitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Converts a timestamp into epoch seconds.
pub fn to_epoch_seconds(timestamp: &DateTime<Utc>) -> f64 {
    timestamp.timestamp() as f64 + f64::from(timestamp.timestamp_subsec_nanos()) / NANOS_PER_SECOND
}

/// Converts epoch seconds back into a timestamp. Returns `None` for values
/// chrono cannot represent (NaN, infinities, out of range).
pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let mut nanos = ((seconds - whole) * NANOS_PER_SECOND).round() as i64;
    let mut secs = whole as i64;
    if nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    DateTime::from_timestamp(secs, nanos as u32)
}

fn serialize_seconds<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    if timestamp.timestamp_subsec_nanos() == 0 {
        serializer.serialize_i64(timestamp.timestamp())
    } else {
        serializer.serialize_f64(to_epoch_seconds(timestamp))
    }
}

pub mod epoch_seconds {
    use super::*;

    pub fn serialize<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_seconds(timestamp, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        from_epoch_seconds(seconds)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {seconds}")))
    }
}

/// `None` is stored as `0`; any non-positive value reads back as `None`.
pub mod optional_epoch_seconds {
    use super::*;

    pub fn serialize<S: Serializer>(
        timestamp: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match timestamp {
            Some(timestamp) => serialize_seconds(timestamp, serializer),
            None => serializer.serialize_i64(0),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let seconds = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
        if seconds <= 0.0 {
            return Ok(None);
        }
        from_epoch_seconds(seconds)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {seconds}")))
    }
}

/// `None` is stored as the empty string.
pub mod empty_string_as_none {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|value| !value.is_empty()))
    }
}
