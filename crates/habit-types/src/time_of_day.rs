//! Serde helpers for habit times. Accepts `HH:MM` or `HH:MM:SS`, always writes `HH:MM:SS`.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer, de};

pub const STORAGE_FORMAT: &str = "%H:%M:%S";

pub fn parse(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, STORAGE_FORMAT).or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
}

pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&time.format(STORAGE_FORMAT).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(|e| de::Error::custom(format!("invalid time '{}': {}", raw, e)))
}

/// Same as the parent module for `Option<NaiveTime>` fields; pair with `#[serde(default)]`.
pub mod option {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid time '{}': {}", raw, e))),
            None => Ok(None),
        }
    }
}
