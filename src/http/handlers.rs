use std::{sync::Arc, time::Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;

use crate::{
    api::{self, Route, err::api_err},
    auth::AuthContext,
    db::{self, Transaction},
    prelude::*,
};
use super::{Context, Request, Response, response};


/// This is the main HTTP entry point, called for each incoming request.
pub(super) async fn handle(req: Request, ctx: Arc<Context>) -> Response {
    super::log::req::log(&req);
    if ctx.config.log.log_http_headers {
        super::log::headers::log(&req);
    }

    let Some(route) = Route::from_path(req.uri().path()) else {
        debug!("Responding with 404 to {:?} '{}'", req.method(), req.uri().path());
        return response::not_found();
    };

    handle_api(req, route, &ctx).await
}

/// Handles a request to one of the API routes. Each request gets its own
/// transaction, which is only committed if the request succeeded.
async fn handle_api(req: Request, route: Route, ctx: &Context) -> Response {
    let before = Instant::now();
    let (parts, body) = req.into_parts();

    let body = match read_body(body, ctx.config.http.max_body_size).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    // Get a connection for this request.
    let mut connection = match db::get_conn_or_service_unavailable(&ctx.db_pool).await {
        Ok(c) => c,
        Err(response) => return response,
    };

    let tx = match connection.transaction().await {
        Ok(tx) => Transaction::new(tx),
        Err(e) => {
            error!("Failed to start transaction for API request: {}", e);
            return response::internal_server_error();
        }
    };

    let auth = match AuthContext::new(&parts.headers, &ctx.config.auth, &tx).await {
        Ok(auth) => auth,
        Err(e) => {
            error!("DB error when checking user session: {}", e);
            return response::internal_server_error();
        }
    };

    let request = api::Request {
        method: parts.method,
        route,
        path: parts.uri.path().to_owned(),
        query: parts.uri.query().map(ToOwned::to_owned),
        body,
    };
    let api_context = api::Context {
        db: tx,
        auth,
        config: Arc::clone(&ctx.config),
        telegram: ctx.telegram.clone(),
    };

    let result = api::handle(&request, &api_context).await;
    let num_queries = api_context.db.num_queries();
    let username = api_context.auth.debug_log_username();

    let out = match result {
        Ok(mut reply) => match api_context.db.commit().await {
            Ok(()) => {
                if let Some(task) = reply.after_commit.take() {
                    tokio::spawn(task);
                }
                response::reply(reply)
            }

            // Otherwise, we would like to retry a couple times, but for now
            // we just immediately reply 5xx.
            Err(e) => {
                error!("Failed to commit transaction for API request: {}", e);
                response::service_unavailable()
            }
        },
        Err(e) => {
            if let Err(e) = api_context.db.rollback().await {
                warn!("Failed to roll back transaction for API request: {}", e);
            }
            debug!("API request by {username} failed: {e}");
            response::error(&e)
        }
    };

    debug!(
        "Finished {} {} for {username} in {:.2?} (with {} SQL queries) -> {}",
        request.method,
        request.path,
        before.elapsed(),
        num_queries,
        out.status(),
    );

    out
}

/// Reads the whole request body, but at most `limit` bytes.
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, Response>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            debug!("Request body exceeds limit of {limit} bytes");
            let err = api_err!(PayloadTooLarge, "Request body is larger than {} bytes.", limit);
            Err(response::error(&err))
        }
        Err(e) => {
            warn!("Failed to read request body: {e}");
            Err(response::error(&api_err!(InvalidInput, "Failed to read request body.")))
        }
    }
}


#[cfg(test)]
mod tests {
    use http_body_util::Full;
    use hyper::StatusCode;
    use super::*;

    #[tokio::test]
    async fn body_within_limit() {
        let body = read_body(Full::new(Bytes::from_static(b"{\"title\": \"x\"}")), 16).await.unwrap();
        assert_eq!(&body[..], b"{\"title\": \"x\"}");
    }

    #[tokio::test]
    async fn body_too_large() {
        let response = read_body(Full::new(Bytes::from(vec![b'x'; 17])), 16).await.unwrap_err();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
