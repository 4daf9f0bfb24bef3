//! Parsers for the inverter's JSON response envelopes.
//!
//! Both endpoints wrap their payload in the same `Head`/`Body` envelope;
//! `archive` and `realtime` handle the two body shapes.

mod archive;
mod realtime;
mod table;

pub use archive::*;
pub use realtime::*;
pub use table::*;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Structural parse failures. These are precondition violations (caller bug
/// or protocol drift), not recoverable outcomes.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("response is not an object with Head and Body sections")]
    Envelope,
    #[error("malformed Head section: {0}")]
    Head(String),
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("device {0:?} has no Data section")]
    DeviceData(String),
    #[error("channel {0:?} has no Values section")]
    ChannelValues(String),
    #[error("invalid second-offset key {0:?}")]
    Offset(String),
    #[error("non-numeric sample value for channel {0:?}")]
    Sample(String),
    #[error("realtime response is missing the {0} marker channel")]
    Marker(&'static str),
}

/// Status block from the response head.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Status {
    pub code: i64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub user_message: String,
    /// Opaque detail blob; shape varies by firmware.
    #[serde(default)]
    pub error_detail: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawHead {
    timestamp: String,
    #[serde(default)]
    request_arguments: RawRequestArguments,
    status: Status,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRequestArguments {
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Parsed head shared by both response kinds. The requested window is only
/// present on archive responses.
#[derive(Debug, Clone)]
pub(crate) struct Head {
    pub timestamp: DateTime<FixedOffset>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub status: Status,
}

/// Split the envelope into its `Head` and `Body` objects, or fail the
/// structural precondition.
pub(crate) fn split_envelope(raw: &Value) -> Result<(&Value, &Value), ParseError> {
    let object = raw.as_object().ok_or(ParseError::Envelope)?;
    let head = object
        .get("Head")
        .filter(|v| v.is_object())
        .ok_or(ParseError::Envelope)?;
    let body = object
        .get("Body")
        .filter(|v| v.is_object())
        .ok_or(ParseError::Envelope)?;
    Ok((head, body))
}

pub(crate) fn parse_head(head: &Value) -> Result<Head, ParseError> {
    let raw = RawHead::deserialize(head).map_err(|e| ParseError::Head(e.to_string()))?;

    let start = match raw.request_arguments.start_date {
        Some(s) => Some(parse_instant(&s)?),
        None => None,
    };
    let end = match raw.request_arguments.end_date {
        Some(s) => Some(parse_instant(&s)?),
        None => None,
    };

    Ok(Head {
        timestamp: parse_instant(&raw.timestamp)?,
        start,
        end,
        status: raw.status,
    })
}

/// Parse an ISO-8601 instant, keeping whatever UTC offset the string carries.
pub(crate) fn parse_instant(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    DateTime::parse_from_rfc3339(value).map_err(|source| ParseError::Timestamp {
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_envelope_rejects_non_objects() {
        assert!(matches!(
            split_envelope(&json!("not an object")),
            Err(ParseError::Envelope)
        ));
        assert!(matches!(split_envelope(&json!({})), Err(ParseError::Envelope)));
        assert!(matches!(
            split_envelope(&json!({"Head": {}, "Body": "nope"})),
            Err(ParseError::Envelope)
        ));
    }

    #[test]
    fn test_parse_instant_keeps_offset() {
        let dt = parse_instant("2017-11-04T00:00:00+01:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 3600);
        assert_eq!(dt.to_rfc3339(), "2017-11-04T00:00:00+01:00");

        assert!(parse_instant("yesterday-ish").is_err());
    }

    #[test]
    fn test_parse_head_without_window() {
        let head = json!({
            "Timestamp": "2017-10-25T09:10:14+02:00",
            "RequestArguments": {"DeviceClass": "Inverter", "Scope": "System"},
            "Status": {"Code": 0, "Reason": "", "UserMessage": ""}
        });
        let parsed = parse_head(&head).unwrap();
        assert_eq!(parsed.status.code, 0);
        assert!(parsed.start.is_none());
        assert!(parsed.end.is_none());
    }
}
