use bytes::Bytes;
use http_body_util::Full;
use hyper::{StatusCode, header};

use crate::{api::{Reply, err::ApiError}, prelude::*};
use super::Response;


pub(crate) fn service_unavailable() -> Response {
    json(
        StatusCode::SERVICE_UNAVAILABLE,
        &serde_json::json!({
            "detail": "Server error: service unavailable. Potentially try again later.",
        }),
    )
}

pub(crate) fn internal_server_error() -> Response {
    json(
        StatusCode::INTERNAL_SERVER_ERROR,
        &serde_json::json!({ "detail": "A server error occurred." }),
    )
}

pub(crate) fn not_found() -> Response {
    json(StatusCode::NOT_FOUND, &serde_json::json!({ "detail": "Not found." }))
}

pub(crate) fn error(err: &ApiError) -> Response {
    json(err.status(), &err.to_json())
}

/// Converts a successful API reply into the HTTP response.
pub(crate) fn reply(reply: Reply) -> Response {
    let mut response = match &reply.body {
        Some(body) => json(reply.status, body),
        None => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = reply.status;
            response
        }
    };

    if let Some(cookie) = &reply.cookie {
        // A `Cookie` always serializes to a valid header value, except for
        // control characters, which we never put into cookies.
        match header::HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => {
                error!("Failed to build set-cookie header: {e}");
                return internal_server_error();
            }
        }
    }

    response
}

pub(crate) fn json(status: StatusCode, body: &serde_json::Value) -> Response {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
