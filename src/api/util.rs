use serde::{Deserialize, Deserializer};

use super::err::{ApiError, ApiResult};


/// `PUT` replaces an object and requires all writable fields, `PATCH` accepts
/// any subset of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateMode {
    Put,
    Patch,
}

impl UpdateMode {
    /// Checks that the field is given if this is a `PUT` request.
    pub(crate) fn check<T>(self, value: Option<T>, field: &'static str) -> ApiResult<Option<T>> {
        match (self, value) {
            (Self::Put, None) => Err(required_error(field)),
            (_, value) => Ok(value),
        }
    }
}

/// Returns the value or a "field is required" error.
pub(crate) fn required<T>(value: Option<T>, field: &'static str) -> ApiResult<T> {
    value.ok_or_else(|| required_error(field))
}

fn required_error(field: &'static str) -> ApiError {
    ApiError::field(field, "This field is required.")
}

/// Deserializer for fields that distinguish "missing" (`None`) from `null`
/// (`Some(None)`). Needs `#[serde(default)]` on the field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
