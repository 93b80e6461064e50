//! Runner age relative to a single per-run reference time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marker written when a creation timestamp could not be parsed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Age of a runner in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Age {
    Minutes(i64),
    NotAvailable,
}

impl Age {
    /// Compute the age of a runner created at `created` as seen at `now`.
    ///
    /// `now` is captured once per collection run so ages are comparable
    /// across every runner in the report. Unparseable timestamps yield
    /// [`Age::NotAvailable`].
    pub fn since(created: &str, now: DateTime<Utc>) -> Self {
        match parse_timestamp(created) {
            Some(created) => {
                let secs = (now - created).num_seconds();
                Self::Minutes(secs.div_euclid(60))
            }
            None => Self::NotAvailable,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // kubectl without an offset suffix
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(m) => write!(f, "{m}m"),
            Self::NotAvailable => write!(f, "{NOT_AVAILABLE}"),
        }
    }
}

impl FromStr for Age {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == NOT_AVAILABLE {
            return Ok(Self::NotAvailable);
        }
        s.strip_suffix('m')
            .and_then(|m| m.parse::<i64>().ok())
            .map(Self::Minutes)
            .ok_or_else(|| format!("Invalid age: {s}"))
    }
}

impl Serialize for Age {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Age {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
