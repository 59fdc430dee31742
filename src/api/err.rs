//! API error handling.
//!
//! We define our own error to use for all endpoints. It has `From` impls to be
//! created from other common errors that occur (e.g. DB errors). This module
//! also offers a couple macros to easily create an error.
//!
//! Errors are sent to clients as JSON: either `{"detail": "..."}` or, for
//! errors about a specific input field, `{"<field>": ["..."]}`.

use hyper::StatusCode;
use std::fmt;

use crate::prelude::*;


pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) msg: String,
    pub(crate) kind: ApiErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    /// The arguments passed to an endpoint are invalid somehow. If the error
    /// is about one specific field of the request body, it is named here.
    InvalidInput { field: Option<&'static str> },

    /// The request requires a logged in user, but there is none.
    NotAuthenticated,

    /// The user is logged in, but not allowed to do what they asked for.
    PermissionDenied,

    /// The requested object does not exist or is not visible to the user.
    NotFound,

    /// The route exists, but not with this HTTP method.
    MethodNotAllowed,

    /// The request body exceeds the configured limit.
    PayloadTooLarge,

    /// Some server error out of control of the API user.
    InternalServerError,
}

impl ApiErrorKind {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    /// An input error about the given field of the request.
    pub(crate) fn field(field: &'static str, msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            kind: ApiErrorKind::InvalidInput { field: Some(field) },
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// The JSON body sent to the client for this error.
    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self.kind {
            ApiErrorKind::InvalidInput { field: Some(field) } => {
                let mut map = serde_json::Map::new();
                map.insert(field.to_owned(), serde_json::json!([&self.msg]));
                serde_json::Value::Object(map)
            }
            _ => serde_json::json!({ "detail": &self.msg }),
        }
    }

    /// Whether this error is about the given input field.
    pub(crate) fn is_about_field(&self, name: &str) -> bool {
        matches!(self.kind, ApiErrorKind::InvalidInput { field: Some(f) } if f == name)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ApiErrorKind::InvalidInput { field: Some(field) } => {
                write!(f, "{}: {}", field, self.msg)
            }
            _ => self.msg.fmt(f),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<tokio_postgres::Error> for ApiError {
    fn from(src: tokio_postgres::Error) -> Self {
        // At this point, it's very likely that the error is sent back to the
        // user. And this is the last time we can get detailed information
        // about it.
        error!("DB Error when executing query: {src}");
        debug!("Detailed error: {src:#?}");

        Self {
            msg: "A server error occurred.".into(),
            kind: ApiErrorKind::InternalServerError,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(src: anyhow::Error) -> Self {
        error!("Internal error while handling API request: {src:?}");

        Self {
            msg: "A server error occurred.".into(),
            kind: ApiErrorKind::InternalServerError,
        }
    }
}


// ===== Helper macros to easily create errors ==================================================

/// Creates an `ApiError` with a `format!` like syntax.
macro_rules! api_err {
    (InvalidInput, field = $field:literal, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::InvalidInput { field: Some($field) },
        }
    };
    (InvalidInput, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::InvalidInput { field: None },
        }
    };
    ($kind:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::$kind,
        }
    };
}

macro_rules! invalid_input {
    ($($t:tt)+) => { $crate::api::err::api_err!(InvalidInput, $($t)*) };
}

macro_rules! not_authenticated {
    ($($t:tt)+) => { $crate::api::err::api_err!(NotAuthenticated, $($t)*) };
}

macro_rules! permission_denied {
    ($($t:tt)+) => { $crate::api::err::api_err!(PermissionDenied, $($t)*) };
}

macro_rules! not_found {
    ($($t:tt)+) => { $crate::api::err::api_err!(NotFound, $($t)*) };
}

pub(crate) use api_err;
pub(crate) use invalid_input;
pub(crate) use not_authenticated;
pub(crate) use permission_denied;
pub(crate) use not_found;


// ===== Helper macro to inspect DbError ==================================================

/// Helps you map some special DB errors to specific API errors (instead of a
/// generic "internal server error"). Usage:
///
/// ```ignore
/// // `result` needs to be `Result<T, tokio_postgres::error::Error>`.
/// map_db_err!(result, {
///     if constraint == "users_username_key" => invalid_input!(field = "username", "taken"),
///     if /* field */ == /* value */ => /* expression returning ApiError */,
///     // ...
/// })
/// ```
///
/// The macro returns `Result<T, ApiError>`.
macro_rules! map_db_err {
    ($result:expr, { $(
        if $field:ident == $value:expr => $then:expr
    ),* $(,)? }) => {
        match $result {
            Ok(v) => Ok(v),
            Err(e) => {
                if let Some(db_error) = e.as_db_error() {
                    let new_err: $crate::api::err::ApiError = if false { unreachable!() }
                    $(
                        else if db_error.$field()
                            == $crate::api::err::map_db_err!(@wrap $field $value)
                        { $then.into() }
                    )*
                    else { e.into() };
                    Err(new_err)
                } else {
                    Err(e.into())
                }
            }
        }
    };
    (@wrap constraint $value:expr) => { Some($value) };
}

pub(crate) use map_db_err;
