//! Tagged encodings for UUIDs, URIs and dates
//!
//! Each crosses the bridge as `{"type": "<tag>", "value": "<text>"}`.
//! Dates use RFC 3339 text in UTC with millisecond precision.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde_json::json;
use url::Url;
use uuid::Uuid;

use super::{MarshalError, MarshalResult, TYPE_KEY, VALUE_KEY};
use crate::ScriptValue;

/// Type tag of an encoded UUID
pub const UUID_TAG: &str = "<uuid>";
/// Type tag of an encoded URI
pub const URI_TAG: &str = "<uri>";
/// Type tag of an encoded date
pub const DATE_TAG: &str = "<date>";

pub(super) fn tagged(tag: &str, text: String) -> ScriptValue {
    json!({ TYPE_KEY: tag, VALUE_KEY: text })
}

/// Text inside a tagged mapping
pub(super) fn untag<'a>(value: &'a ScriptValue, tag: &str) -> MarshalResult<&'a str> {
    let map = value
        .as_object()
        .ok_or_else(|| MarshalError::mismatch(tag, value))?;
    if map.get(TYPE_KEY).and_then(ScriptValue::as_str) != Some(tag) {
        return Err(MarshalError::mismatch(tag, value));
    }
    map.get(VALUE_KEY)
        .and_then(ScriptValue::as_str)
        .ok_or_else(|| MarshalError::malformed(tag, "missing text value"))
}

// ============================================================================
// UUID / URI
// ============================================================================

/// Canonical upper-case hyphenated form
pub(super) fn format_uuid(uuid: &Uuid) -> String {
    uuid.hyphenated().to_string().to_uppercase()
}

/// Parse any case
pub(super) fn parse_uuid(text: &str) -> MarshalResult<Uuid> {
    Uuid::parse_str(text).map_err(|e| MarshalError::malformed(UUID_TAG, e))
}

pub(super) fn parse_uri(text: &str) -> MarshalResult<Url> {
    Url::parse(text).map_err(|e| MarshalError::malformed(URI_TAG, e))
}

// ============================================================================
// Dates
// ============================================================================

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub(super) fn format_date(time: &DateTime<Utc>) -> MarshalResult<String> {
    if !(0..=9999).contains(&time.year()) {
        return Err(MarshalError::OutOfRange {
            value: format!("year {}", time.year()),
            target: DATE_TAG.to_string(),
        });
    }
    Ok(time.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Parse RFC 3339 text, normalized to UTC with its full fraction
pub(super) fn parse_date(text: &str) -> MarshalResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| MarshalError::malformed(DATE_TAG, format!("{}: {}", text, e)))
}
