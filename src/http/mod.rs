//! The HTTP server, handler and routes.
//!
//! This file itself contains fairly little business logic and just sets up the
//! `hyper` server and catches errors. The main logic is in `handlers.rs`.

use bytes::Bytes;
use deadpool_postgres::Pool;
use http_body_util::Full;
use hyper::{body::Incoming, service::service_fn};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use std::{
    convert::Infallible,
    fs,
    future::Future,
    net::{IpAddr, SocketAddr},
    os::unix::fs::PermissionsExt,
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::Arc,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, UnixListener},
};

use crate::{bot::TelegramClient, config::Config, prelude::*};
use self::handlers::handle;


mod handlers;
mod log;
pub(crate) mod response;


/// HTTP server configuration.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    /// The TCP port the HTTP server should listen on.
    #[config(default = 3080)]
    pub(crate) port: u16,

    /// The bind address to listen on.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,

    /// Unix domain socket to listen on. Specifying this will overwrite
    /// the TCP configuration. Example: "/tmp/todolist.socket".
    pub(crate) unix_socket: Option<PathBuf>,

    /// Unix domain socket file permissions.
    #[config(default = 0o755)]
    pub(crate) unix_socket_permissions: u32,

    /// Maximum size of request bodies in bytes. Larger requests are answered
    /// with "413 Payload Too Large".
    #[config(default = 1048576)]
    pub(crate) max_body_size: usize,
}

impl HttpConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_body_size == 0 {
            bail!("`http.max_body_size` must not be 0");
        }
        if self.unix_socket_permissions > 0o777 {
            bail!("`http.unix_socket_permissions` is not a valid file mode (must be <= 0o777)");
        }

        Ok(())
    }
}


// Our requests and responses always use the hyper provided body types.
pub(crate) type Response<T = Full<Bytes>> = hyper::Response<T>;
type Request<T = Incoming> = hyper::Request<T>;


/// Context that the request handler has access to.
pub(crate) struct Context {
    pub(crate) db_pool: Pool,
    pub(crate) config: Arc<Config>,
    pub(crate) telegram: Option<TelegramClient>,
}


/// Starts the HTTP server. The future returned by this function must be awaited
/// to actually run it.
pub(crate) async fn serve(config: Arc<Config>, db: Pool) -> Result<()> {
    let telegram = TelegramClient::from_config(&config.bot)
        .context("failed to create Telegram client")?;
    if telegram.is_none() {
        info!("No bot token configured: chats will not be notified about verifications");
    }

    let http_config = config.http.clone();
    let ctx = Arc::new(Context {
        db_pool: db,
        config,
        telegram,
    });

    // Start the server with our service.
    if let Some(unix_socket) = &http_config.unix_socket {
        // Bind to Unix domain socket.
        if unix_socket.exists() {
            fs::remove_file(unix_socket)?;
        }
        let listener = UnixListener::bind(unix_socket)
            .with_context(|| format!("failed to bind to '{}'", unix_socket.display()))?;
        info!("Listening on unix://{}", unix_socket.display());
        let permissions = fs::Permissions::from_mode(http_config.unix_socket_permissions);
        fs::set_permissions(unix_socket, permissions)?;

        loop {
            match listener.accept().await {
                Ok((stream, _)) => serve_connection(stream, &ctx),
                Err(e) => warn!("Failed to accept connection: {e}"),
            }
        }
    } else {
        // Bind to TCP socket.
        let addr = SocketAddr::new(http_config.address, http_config.port);
        let listener = TcpListener::bind(addr).await
            .with_context(|| format!("failed to bind to {addr}"))?;
        info!("Listening on http://{}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => serve_connection(stream, &ctx),
                Err(e) => warn!("Failed to accept connection: {e}"),
            }
        }
    }
}

/// Spawns a task serving all requests of one connection. HTTP/1 and HTTP/2
/// are both supported.
fn serve_connection<S>(stream: S, ctx: &Arc<Context>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        // All our logic is encoded in the function `handle`. The only thing we
        // are doing here is to pass the context to that function, and clone
        // its `Arc` accordingly.
        let service = service_fn(move |req| handle_internal_errors(handle(req, Arc::clone(&ctx))));

        let result = auto::Builder::new(TokioExecutor::new())
            .serve_connection(TokioIo::new(stream), service)
            .await;
        if let Err(e) = result {
            debug!("Error while serving HTTP connection: {e}");
        }
    });
}

/// This just wraps another future and catches all panics that might occur when
/// resolving/polling that given future. This ensures that we always answer with
/// `500` instead of just crashing the thread and closing the connection.
async fn handle_internal_errors(
    future: impl Future<Output = Response>,
) -> Result<Response, Infallible> {
    // The `AssertUnwindSafe` is unfortunately necessary. The whole story of
    // unwind safety is strange. What we are basically saying here is: "if the
    // future panicks, the global/remaining application state is not 'broken'.
    // It is safe to continue with the program in case of a panic."
    //
    // Hyper catches panics for us anyway, so this changes nothing except that
    // our response is better.
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => Ok(response),
        Err(panic) => {
            // The `panic` information is just an `Any` object representing the
            // value the panic was invoked with. For most panics (which use
            // `panic!` like `println!`), this is either `&str` or `String`.
            let msg = panic.downcast_ref::<String>()
                .map(|s| s.as_str())
                .or(panic.downcast_ref::<&str>().copied());

            match msg {
                Some(msg) => error!("INTERNAL SERVER ERROR: HTTP handler panicked: '{}'", msg),
                None => error!("INTERNAL SERVER ERROR: HTTP handler panicked"),
            }

            Ok(response::internal_server_error())
        }
    }
}
