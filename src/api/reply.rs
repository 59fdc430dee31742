use std::future::Future;

use cookie::Cookie;
use futures::future::BoxFuture;
use hyper::StatusCode;
use serde::Serialize;

use crate::prelude::*;
use super::err::ApiResult;


/// A successful API response.
pub(crate) struct Reply {
    pub(crate) status: StatusCode,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) cookie: Option<Cookie<'static>>,

    /// Work to do once the transaction of the request has been committed.
    pub(crate) after_commit: Option<BoxFuture<'static, ()>>,
}

impl Reply {
    pub(crate) fn json(status: StatusCode, value: &impl Serialize) -> ApiResult<Self> {
        let body = serde_json::to_value(value).context("failed to serialize API response")?;
        Ok(Self {
            status,
            body: Some(body),
            cookie: None,
            after_commit: None,
        })
    }

    /// `200 OK` with the given body.
    pub(crate) fn ok(value: &impl Serialize) -> ApiResult<Self> {
        Self::json(StatusCode::OK, value)
    }

    /// `201 Created` with the given body.
    pub(crate) fn created(value: &impl Serialize) -> ApiResult<Self> {
        Self::json(StatusCode::CREATED, value)
    }

    pub(crate) fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
            cookie: None,
            after_commit: None,
        }
    }

    pub(crate) fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookie = Some(cookie);
        self
    }

    pub(crate) fn after_commit(mut self, task: impl Future<Output = ()> + Send + 'static) -> Self {
        self.after_commit = Some(Box::pin(task));
        self
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("status", &self.status)
            .field("body", &self.body)
            .field("cookie", &self.cookie)
            .field("after_commit", &self.after_commit.is_some())
            .finish()
    }
}
