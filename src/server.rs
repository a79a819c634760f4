//! HTTP host and graceful shutdown.
//!
//! The server has one job: give every request a [`ResponseWriter`] and hand
//! it to the application's [`Handler`]. There is no router. Put
//! [`middleware`](crate::middleware::middleware) in front of the handler to
//! get tracked writers.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C (or the future passed to
//! [`Server::serve_with_shutdown`]) the server:
//! 1. Stops `listener.accept()` — no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from `serve`, which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::close;
use crate::conn::{ConnWriter, ResponseBody};
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler, Request};

/// Default size of the per-response write buffer, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Default number of body chunks that may queue between handler and client.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

enum Bind {
    Addr(SocketAddr),
    Listener(TcpListener),
}

/// The HTTP server.
///
/// ```rust,no_run
/// use tally::{Request, ResponseWriter, Server};
/// use tally::middleware::{middleware, trace};
///
/// fn hello(w: &mut dyn ResponseWriter, _req: &Request) {
///     let _ = w.write_str("hello");
/// }
///
/// # async fn run() -> Result<(), tally::Error> {
/// Server::bind("0.0.0.0:3000")?
///     .buffer_size(8 * 1024)
///     .serve(middleware(trace(hello)))
///     .await
/// # }
/// ```
pub struct Server {
    bind: Bind,
    buffer_size: usize,
    channel_capacity: usize,
}

/// Per-request settings shared by every connection task.
#[derive(Clone, Copy, Debug)]
struct Limits {
    buffer_size: usize,
    channel_capacity: usize,
}

impl Server {
    /// Configures the server to bind to `addr` when serving starts.
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr: SocketAddr = addr.parse()?;
        Ok(Self::with(Bind::Addr(addr)))
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self::with(Bind::Listener(listener))
    }

    fn with(bind: Bind) -> Self {
        Self {
            bind,
            buffer_size: DEFAULT_BUFFER_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Bytes a response may buffer before its head is committed and the
    /// body starts streaming. Responses that fit are sent with a
    /// `content-length`. Clamped to at least 1.
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes.max(1);
        self
    }

    /// Body chunks that may wait for a slow client before writes block.
    /// Clamped to at least 1.
    pub fn channel_capacity(mut self, chunks: usize) -> Self {
        self.channel_capacity = chunks.max(1);
        self
    }

    /// Serves `handler` until SIGTERM or Ctrl-C, then drains and returns.
    pub async fn serve(self, handler: impl Handler) -> Result<(), Error> {
        self.serve_with_shutdown(handler, shutdown_signal()).await
    }

    /// Serves `handler` until `signal` resolves, then drains and returns.
    pub async fn serve_with_shutdown(
        self,
        handler: impl Handler,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        let addr = listener.local_addr()?;

        let handler: BoxedHandler = Arc::new(handler);
        let limits = Limits {
            buffer_size: self.buffer_size,
            channel_capacity: self.channel_capacity,
        };

        info!(%addr, "tally listening");

        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let handler = Arc::clone(&handler);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let handler = Arc::clone(&handler);
                            async move { dispatch(handler, limits, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection_with_upgrades(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tally stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Runs one request through the handler and builds hyper's response from
/// what the handler writes.
///
/// Returns as soon as the head is committed; the body keeps streaming from
/// the handler thread after that.
async fn dispatch(
    handler: BoxedHandler,
    limits: Limits,
    mut req: hyper::Request<Incoming>,
) -> Result<http::Response<ResponseBody>, Infallible> {
    let upgrade = hyper::upgrade::on(&mut req);
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(bare(http::StatusCode::BAD_REQUEST));
        }
    };
    let req = Request::from_parts(parts, body);

    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(limits.channel_capacity);
    let (signal, notify) = close::channel();
    let (done_tx, done_rx) = oneshot::channel::<()>();

    // Fires close-notify when hyper drops the body, i.e. the client is gone.
    // Stops watching once the handler is done so the body can end.
    let watched = body_tx.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = watched.closed() => {
                debug!("client closed the connection");
                signal.close();
            }
            _ = done_rx => {}
        }
    });

    tokio::task::spawn_blocking(move || {
        let mut writer = ConnWriter::new(head_tx, body_tx, upgrade, notify, limits.buffer_size);
        handler.serve(&mut writer, &req);
        if let Err(e) = writer.finish() {
            debug!("response not fully delivered: {e}");
        }
        drop(done_tx);
    });

    match head_rx.await {
        Ok((status, headers)) => {
            let mut res = http::Response::new(ResponseBody::channel(body_rx));
            *res.status_mut() = status;
            *res.headers_mut() = headers;
            Ok(res)
        }
        Err(_) => {
            error!("handler panicked before writing a response");
            Ok(bare(http::StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

fn bare(status: http::StatusCode) -> http::Response<ResponseBody> {
    let mut res = http::Response::new(ResponseBody::empty());
    *res.status_mut() = status;
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A signal that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
