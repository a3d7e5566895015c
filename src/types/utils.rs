//! Small helpers shared by the type modules and the storage layer.

use serde::Serialize;
use std::fmt::Display;

/// String field of a JSON object, if present and a string
pub fn json_string(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(String::from)
}

/// "real estate" -> "Real estate"
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

/// Lenient parsing for CRM-supplied enum strings.
///
/// Unknown values resolve to the type's fallback and are logged once at warn level.
pub trait ParseWithDefault: Sized {
    const TYPE_NAME: &'static str;

    fn fallback() -> Self;

    fn try_parse(s: &str) -> Option<Self>;

    fn parse_or_default(s: &str) -> Self {
        Self::try_parse(s).unwrap_or_else(|| {
            tracing::warn!("Unrecognized {} '{}', using fallback", Self::TYPE_NAME, s);
            Self::fallback()
        })
    }
}

/// Serde name of a unit enum variant, without the JSON quotes
pub fn enum_to_str<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

/// Turn an error into `None`, logging it with `context`
pub fn log_filter_warn<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    result
        .map_err(|e| tracing::warn!("{}: {}", context, e))
        .ok()
}
