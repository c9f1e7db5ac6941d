//! Human readable durations for configuration values.
//!
//! Accepts the forms operators already use for the cache TTL: a number,
//! optionally fractional, followed by a unit in short or long form
//! (`500ms`, `1.5h`, `10 minutes`, `2 hours`, `1w`, `1y`), or a bare number
//! meaning milliseconds. Units ignore case; a year is 365.25 days.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Error returned when a duration string cannot be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("Empty duration string")]
    Empty,

    #[error("Invalid number in duration: {0}")]
    InvalidNumber(String),

    #[error("Unknown duration unit '{0}'. Use one of: ms, s, m, h, d, w, y")]
    UnknownUnit(String),

    #[error("Duration out of range: {0}")]
    OutOfRange(String),
}

/// A configuration duration that round-trips through its compact string form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HumanDuration(Duration);

impl HumanDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub const fn as_duration(self) -> Duration {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for HumanDuration {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl From<HumanDuration> for Duration {
    fn from(duration: HumanDuration) -> Self {
        duration.0
    }
}

impl FromStr for HumanDuration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DurationParseError::Empty);
        }

        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (num_str, unit) = s.split_at(split);
        if num_str.is_empty() || num_str.ends_with('.') || num_str.matches('.').count() > 1 {
            return Err(DurationParseError::InvalidNumber(s.to_string()));
        }

        let unit = unit.trim().to_ascii_lowercase();
        let size = unit_millis(&unit).ok_or(DurationParseError::UnknownUnit(unit))?;

        if !num_str.contains('.') {
            let num: u64 = num_str
                .parse()
                .map_err(|_| DurationParseError::InvalidNumber(s.to_string()))?;
            let millis = num
                .checked_mul(size)
                .ok_or_else(|| DurationParseError::OutOfRange(s.to_string()))?;
            return Ok(Self(Duration::from_millis(millis)));
        }

        let num: f64 = num_str
            .parse()
            .map_err(|_| DurationParseError::InvalidNumber(s.to_string()))?;
        fractional(num, size).ok_or_else(|| DurationParseError::OutOfRange(s.to_string()))
    }
}

/// Milliseconds per unit; an empty unit means milliseconds
fn unit_millis(unit: &str) -> Option<u64> {
    let size = match unit {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1,
        "s" | "sec" | "secs" | "second" | "seconds" => 1000,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000,
        "d" | "day" | "days" => 86_400_000,
        "w" | "week" | "weeks" => 604_800_000,
        // 365.25 days
        "y" | "yr" | "yrs" | "year" | "years" => 31_557_600_000,
        _ => return None,
    };
    Some(size)
}

/// Fractional amounts are rounded to the microsecond
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn fractional(num: f64, size: u64) -> Option<HumanDuration> {
    let micros = (num * size as f64 * 1000.0).round();
    if !micros.is_finite() || micros < 0.0 || micros >= u64::MAX as f64 {
        return None;
    }
    Some(HumanDuration(Duration::from_micros(micros as u64)))
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis();
        if millis == 0 {
            return write!(f, "0ms");
        }
        for (unit, size) in [("d", 86_400_000), ("h", 3_600_000), ("m", 60_000), ("s", 1000)] {
            if millis % size == 0 {
                return write!(f, "{}{unit}", millis / size);
            }
        }
        write!(f, "{millis}ms")
    }
}

impl Serialize for HumanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HumanDurationVisitor;

        impl Visitor<'_> for HumanDurationVisitor {
            type Value = HumanDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration such as \"30s\" or \"5m\", or milliseconds")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(HumanDuration::from_millis(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(HumanDuration::from_millis)
                    .map_err(|_| E::custom("duration cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(HumanDurationVisitor)
    }
}
