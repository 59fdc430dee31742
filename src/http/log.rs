//! This module contains a bunch of small inline modules to make it possible to
//! easily filter out individual log messages with out filter system.

use hyper::{body::Incoming, Request};
use crate::prelude::*;

pub mod req {
    use super::*;

    pub fn log(req: &Request<Incoming>) {
        trace!(
            method = ?req.method(),
            path = req.uri().path_and_query().map_or("", |pq| pq.as_str()),
            "Incoming HTTP request",
        );
    }
}

pub mod headers {
    use std::fmt::Write;
    use super::*;

    /// Logs all request headers, except for the cookie header which carries
    /// the session ID.
    pub fn log(req: &Request<Incoming>) {
        let mut out = String::new();
        for (name, value) in req.headers() {
            let value = if name == hyper::header::COOKIE {
                "<redacted>".into()
            } else {
                String::from_utf8_lossy(value.as_bytes())
            };
            let _ = write!(out, "\n  {}: {}", name, value);
        }
        trace!("HTTP Headers: {}", out);
    }
}
