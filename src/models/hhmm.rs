//! `HH:MM` serde adapter for `NaiveTime`, the format courses are stored and
//! exchanged in.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer};

pub const FORMAT: &str = "%H:%M";

/// Accepts `HH:MM` and, for older exports, `HH:MM:SS`.
pub fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, FORMAT).or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
}

pub fn format(time: &NaiveTime) -> String {
    time.format(FORMAT).to_string()
}

pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(time))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid time {:?}: {}", raw, e)))
}
