//! Parameter extraction helpers for tool implementations.
//!
//! Validation failures return a ready-made error [`ToolOutput`] so tools can
//! hand the model a structured correction instead of raising.

use serde_json::Value;

use foreman_core::tools::{ToolOutput, error_result};

/// Extract a required string parameter, or an error result naming it.
pub fn require_str(params: &Value, key: &str) -> Result<String, ToolOutput> {
    match params.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_owned()),
        Some(_) => Err(error_result(format!(
            "Parameter \"{key}\" must be a non-empty string"
        ))),
        None => Err(error_result(format!("Missing required parameter: {key}"))),
    }
}

/// Extract an optional string parameter.
#[must_use]
pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(String::from)
}

/// Extract an optional unsigned integer parameter.
#[must_use]
pub fn optional_u64(params: &Value, key: &str) -> Option<u64> {
    params.get(key).and_then(Value::as_u64)
}

/// Extract an optional array of strings.
#[must_use]
pub fn optional_str_array(params: &Value, key: &str) -> Option<Vec<String>> {
    params.get(key).and_then(Value::as_array).map(|arr| {
        arr.iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect()
    })
}
