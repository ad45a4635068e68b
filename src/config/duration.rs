//! Human-readable durations for YAML settings.
//!
//! Accepts `"5s"`, `"250ms"`, `"1m30s"`, `"2h"` or a bare integer number of
//! seconds. Serializes back to the shortest exact form (`"5s"`, `"250ms"`).

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;
use std::time::Duration;

use crate::error::AlarmError;

/// Parses a duration string made of `<number><unit>` segments.
pub fn parse_duration(input: &str) -> Result<Duration, AlarmError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AlarmError::config("Empty duration"));
    }

    if let Ok(seconds) = input.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(AlarmError::config(format!("Invalid duration: {}", input)));
        }

        let value: u64 = rest[..digits].parse().map_err(|e| {
            AlarmError::config_with_source(format!("Invalid duration: {}", input), e)
        })?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let segment = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            _ => {
                return Err(AlarmError::config(format!(
                    "Unknown duration unit '{}' in {}",
                    unit, input
                )))
            }
        };
        total = total
            .checked_add(segment)
            .ok_or_else(|| AlarmError::config(format!("Duration too large: {}", input)))?;
    }

    Ok(total)
}

/// Formats a duration the way [`parse_duration`] reads it back.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*duration))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration such as \"5s\" or a number of seconds")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(value))
        }

        // Non-positive values fall back to the default during validation.
        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Duration, E> {
            Ok(Duration::from_secs(value.max(0) as u64))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
            if value.trim().starts_with('-') {
                return Ok(Duration::ZERO);
            }
            parse_duration(value).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_compound_and_bare() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5 parsecs").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn test_parse_overflowing_sum() {
        let result = parse_duration("18446744073709551615s1s");
        assert!(matches!(result, Err(AlarmError::Config { .. })));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
