//! Typed access to free-form transition metadata.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::WorkflowError;

/// Deserializes transition metadata into `T`. `null` yields `T::default()`.
///
/// # Errors
///
/// Returns a validation error on the `metadata` field when the payload does
/// not match `T`.
pub fn read_metadata<T: DeserializeOwned + Default>(metadata: &Value) -> Result<T, WorkflowError> {
    if metadata.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(metadata.clone())
        .map_err(|e| WorkflowError::field("metadata", e.to_string()))
}

/// Trims a free text value, mapping blank strings to `None`.
#[must_use]
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
