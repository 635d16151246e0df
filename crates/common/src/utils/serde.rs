//! Serialization utilities for breaker policy values
//!
//! Policy files express every timing in seconds (`reset_timeout = 10`,
//! `time_unit = 0.5`), matching the unit the clock arithmetic is reasoned in.
//! Integers and floats are both accepted on input; output is always a float.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde serialization result type
type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

fn secs_to_duration<E: serde::de::Error>(secs: f64) -> Result<Duration, E> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| E::custom(format!("invalid duration of {secs} seconds: {e}")))
}

/// Serialize/deserialize a `Duration` as (fractional) seconds.
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use circuit_common::duration_secs;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_secs")]
///     timeout: Duration,
/// }
///
/// let parsed: Example = serde_json::from_str(r#"{"timeout": 2.5}"#).unwrap();
/// assert_eq!(parsed.timeout, Duration::from_millis(2500));
/// ```
pub mod duration_secs {
    use super::*;

    /// Serialize a Duration as seconds (f64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    /// Deserialize seconds (integer or float) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        secs_to_duration(secs)
    }
}

/// Same as [`duration_secs`] for optional values; `None` maps to a missing or
/// null field.
pub mod option_duration_secs {
    use super::*;

    /// Serialize an optional Duration as seconds
    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize optional seconds into an optional Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) => secs_to_duration(secs).map(Some),
            None => Ok(None),
        }
    }
}

/// Parse a seconds value from free-form text (environment variables, CLI).
///
/// # Errors
/// Returns a message describing why `raw` is not a non-negative number of
/// seconds.
pub fn parse_secs(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.trim().parse().map_err(|e| format!("`{raw}` is not a number: {e}"))?;
    secs_to_duration::<serde::de::value::Error>(secs).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    //! Unit tests for seconds-based duration serde helpers.

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Policy {
        #[serde(with = "duration_secs")]
        reset_timeout: Duration,
        #[serde(default, with = "option_duration_secs")]
        backoff_cap: Option<Duration>,
    }

    #[test]
    fn test_integer_and_float_seconds_deserialize() {
        let data: Policy = serde_json::from_str(r#"{"reset_timeout":10,"backoff_cap":0.25}"#)
            .expect("Should deserialize valid JSON");

        assert_eq!(data.reset_timeout, Duration::from_secs(10));
        assert_eq!(data.backoff_cap, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_missing_optional_is_none() {
        let data: Policy = serde_json::from_str(r#"{"reset_timeout":1}"#).unwrap();
        assert_eq!(data.backoff_cap, None);

        let data: Policy =
            serde_json::from_str(r#"{"reset_timeout":1,"backoff_cap":null}"#).unwrap();
        assert_eq!(data.backoff_cap, None);
    }

    #[test]
    fn test_serialize_as_float_seconds() {
        let data = Policy {
            reset_timeout: Duration::from_millis(1500),
            backoff_cap: Some(Duration::from_secs(64)),
        };

        let json = serde_json::to_string(&data).expect("Should serialize");
        assert!(json.contains("\"reset_timeout\":1.5"), "got {json}");
        assert!(json.contains("\"backoff_cap\":64.0"), "got {json}");
    }

    #[test]
    fn test_negative_seconds_rejected() {
        let result: Result<Policy, _> = serde_json::from_str(r#"{"reset_timeout":-1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_integer_seconds() {
        let data: Policy = toml::from_str("reset_timeout = 30\nbackoff_cap = 120\n").unwrap();
        assert_eq!(data.reset_timeout, Duration::from_secs(30));
        assert_eq!(data.backoff_cap, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs(" 2.5 "), Ok(Duration::from_millis(2500)));
        assert!(parse_secs("soon").is_err());
        assert!(parse_secs("-3").is_err());
    }
}
