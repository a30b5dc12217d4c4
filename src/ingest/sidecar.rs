//! Decoding of the JSON metadata files saved next to downloaded posts.
//!
//! Downloaders disagree on field names, so every field is optional and
//! resolved through a fixed fallback chain. A value only counts as present
//! when it is truthy: `null`, `false`, `0`, `""`, `[]` and `{}` fall through to
//! the next candidate.

use serde::Deserialize;
use serde_json::Value;

use crate::ingest::error::SkipReason;

const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Default, Deserialize)]
struct RawSidecar {
    timestamp: Option<Value>,
    saved_at: Option<Value>,
    user_name: Option<Value>,
    user: Option<Value>,
    text: Option<Value>,
    url: Option<Value>,
    avatar_url: Option<Value>,
    user_icon: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SidecarMeta {
    pub timestamp: i64,
    pub author: String,
    pub text: String,
    pub url: String,
    pub avatar_url: String,
}

impl SidecarMeta {
    pub fn decode(bytes: &[u8], post_id: &str) -> Result<Self, SkipReason> {
        let value: Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(SkipReason::NotAnObject);
        }
        let raw = RawSidecar::deserialize(value)?;

        let timestamp = first_present(&[&raw.timestamp, &raw.saved_at])
            .map(coerce_i64)
            .unwrap_or(0);
        let author = first_present(&[&raw.user_name, &raw.user])
            .map(text_of)
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        let text = first_present(&[&raw.text]).map(text_of).unwrap_or_default();
        let url = first_present(&[&raw.url])
            .map(text_of)
            .unwrap_or_else(|| format!("https://twitter.com/{}/status/{}", author, post_id));
        let avatar_url = first_present(&[&raw.avatar_url, &raw.user_icon])
            .map(text_of)
            .unwrap_or_default();

        Ok(Self { timestamp, author, text, url, avatar_url })
    }
}

fn first_present<'a>(candidates: &[&'a Option<Value>]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|c| c.as_ref())
        .find(|v| is_truthy(v))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integer coercion: floats truncate, numeric strings parse, anything else is 0.
fn coerce_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "20230101123456789";

    #[test]
    fn test_full_sidecar() {
        let json = br#"{"timestamp": 1700000000000, "user_name": "alice", "text": "hello",
            "url": "https://x.com/alice/status/1", "avatar_url": "https://img/a.png"}"#;
        let meta = SidecarMeta::decode(json, ID).unwrap();
        assert_eq!(meta.timestamp, 1700000000000);
        assert_eq!(meta.author, "alice");
        assert_eq!(meta.text, "hello");
        assert_eq!(meta.url, "https://x.com/alice/status/1");
        assert_eq!(meta.avatar_url, "https://img/a.png");
    }

    #[test]
    fn test_fallbacks() {
        let json = br#"{"timestamp": 0, "saved_at": "1690000000000", "user": "bob", "user_icon": "i.png"}"#;
        let meta = SidecarMeta::decode(json, ID).unwrap();
        assert_eq!(meta.timestamp, 1690000000000);
        assert_eq!(meta.author, "bob");
        assert_eq!(meta.text, "");
        assert_eq!(meta.url, format!("https://twitter.com/bob/status/{}", ID));
        assert_eq!(meta.avatar_url, "i.png");
    }

    #[test]
    fn test_empty_object_defaults() {
        let meta = SidecarMeta::decode(b"{}", ID).unwrap();
        assert_eq!(meta.timestamp, 0);
        assert_eq!(meta.author, "Unknown");
        assert_eq!(meta.url, format!("https://twitter.com/Unknown/status/{}", ID));
    }

    #[test]
    fn test_non_numeric_timestamp_is_zero() {
        let meta = SidecarMeta::decode(br#"{"timestamp": "yesterday"}"#, ID).unwrap();
        assert_eq!(meta.timestamp, 0);
        let meta = SidecarMeta::decode(br#"{"timestamp": 12.9}"#, ID).unwrap();
        assert_eq!(meta.timestamp, 12);
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(matches!(SidecarMeta::decode(b"[1, 2]", ID), Err(SkipReason::NotAnObject)));
        assert!(matches!(SidecarMeta::decode(b"{not json", ID), Err(SkipReason::Json(_))));
    }
}
