//! Helpers shared by the per-family wire translations.

use model::{ClientError, ClientResult};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Deserializes a wire value, reporting failures as malformed responses.
pub(crate) fn decode<T: DeserializeOwned>(context: &str, value: Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::malformed(context, e.to_string()))
}

/// Unwraps a field the translation cannot do without.
pub(crate) fn required<T>(context: &str, field: &str, value: Option<T>) -> ClientResult<T> {
    value.ok_or_else(|| {
        ClientError::malformed(context, format!("missing required field `{field}`"))
    })
}

/// Treats an empty string the same as an absent one, as the host does.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
