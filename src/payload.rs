//! Decoding the isolated payload span.
//!
//! The span is decoded with `serde_json` into a generic [`Value`], so nesting
//! depth and escapes inside strings (non-ASCII mosque names, quotes) are
//! handled by a real decoder rather than field-by-field scanning.

use crate::error::{ExtractionFailure, Result};
use crate::utils::{context_window, line_col_to_offset, looks_truncated, truncate_for_log};
use serde_json::Value;
use tracing::{debug, warn};

/// Bytes of surrounding text kept either side of a decode failure.
const CONTEXT_RADIUS: usize = 40;

/// Decode `span` into a structured value.
///
/// # Errors
///
/// [`ExtractionFailure::MalformedPayload`] with the byte offset where
/// decoding stopped and the text around it.
pub fn parse(span: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(span) {
        Ok(value) => {
            debug!(bytes = span.len(), "Decoded payload");
            Ok(value)
        }
        Err(e) => {
            let offset = line_col_to_offset(span, e.line(), e.column());
            let context = context_window(span, offset, CONTEXT_RADIUS);
            let message = if looks_truncated(&e) {
                format!("payload truncated: {e}")
            } else {
                e.to_string()
            };
            warn!(
                offset,
                error = %e,
                context = %truncate_for_log(&context, 2 * CONTEXT_RADIUS),
                "Payload failed to decode"
            );
            Err(ExtractionFailure::MalformedPayload {
                offset,
                message,
                context,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_and_escaped() {
        let span = r#"{
            "name": "Mosquée \"Al-Nour\" – جامع",
            "iqamaCalendar": [{"1": ["+10", "+0", "+5", "+5", "+5", "+5"]}],
            "latitude": 36.8,
            "iqamaEnabled": true,
            "jumua": null
        }"#;
        let value = parse(span).unwrap();
        assert_eq!(value["name"], "Mosquée \"Al-Nour\" – جامع");
        assert_eq!(value["iqamaCalendar"][0]["1"][1], "+0");
        assert_eq!(value["latitude"], 36.8);
        assert!(value["jumua"].is_null());
    }

    #[test]
    fn test_parse_reports_offset_and_context() {
        let span = "{\"name\": \"A\",\n \"times\": [\"05:00\", oops]}";
        let err = parse(span).unwrap_err();
        match err {
            ExtractionFailure::MalformedPayload {
                offset, context, ..
            } => {
                assert_eq!(&span[offset..offset + 1], "o");
                assert!(context.contains("oops"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_parse_truncated() {
        let err = parse(r#"{"name": "A", "times": ["05:00""#).unwrap_err();
        match err {
            ExtractionFailure::MalformedPayload { message, .. } => {
                assert!(message.starts_with("payload truncated"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_parse_single_quotes_rejected() {
        let err = parse("{'name': 'A'}").unwrap_err();
        match err {
            ExtractionFailure::MalformedPayload { offset, .. } => assert!(offset <= 2),
            other => panic!("unexpected failure: {other:?}"),
        }
    }
}
