// Data models for the storefront API

pub mod auth;
pub mod envelope;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept either a JSON string or number and keep it as text
///
/// Expiry markers arrive as `"15m"`, `"900"` or `900` depending on the
/// endpoint; they are advisory and stored verbatim. Null becomes empty.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
