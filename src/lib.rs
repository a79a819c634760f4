//! # tally
//!
//! A response writer that keeps count.
//!
//! Handlers write their response through a [`ResponseWriter`]: a status, some
//! headers, then body bytes. [`TrackingWriter`] wraps any such writer and
//! answers three questions along the way:
//!
//! - has the head gone out? — [`WriteStats::written`]
//! - with which status? — [`WriteStats::status`]
//! - how many body bytes so far? — [`WriteStats::len`]
//!
//! [`middleware::middleware`] installs one per request in front of a handler.
//! Everything else (flushing, hijacking the connection, noticing the client
//! leave) is passed straight through to the wrapped writer.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use tally::{Request, ResponseWriter, Server, WriteStats};
//! use tally::middleware::{middleware, trace};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tally::Error> {
//!     Server::bind("0.0.0.0:3000")?
//!         .serve(middleware(trace(home)))
//!         .await
//! }
//!
//! fn home(w: &mut dyn ResponseWriter, _req: &Request) {
//!     if !w.stats().is_some_and(|s| s.written()) {
//!         let _ = w.write_str("Welcome to the home page!\n");
//!     }
//!     let status = w.stats().and_then(|s| s.status()).unwrap_or(StatusCode::OK);
//!     let _ = w.write_str(&format!("Status: {}\n", status.as_u16()));
//! }
//! ```
//!
//! ## Testing handlers
//!
//! [`Recorder`] is an in-memory writer: run a handler against it and inspect
//! the status, headers and body it recorded.

mod conn;
mod error;
mod handler;
mod recorder;
mod server;
mod tracking;
mod writer;

pub mod close;
pub mod middleware;

pub use close::{CloseNotify, CloseSignal};
pub use error::{Capability, Error};
pub use handler::{Handler, Request};
pub use hyper::upgrade::OnUpgrade;
pub use recorder::Recorder;
pub use server::{DEFAULT_BUFFER_SIZE, DEFAULT_CHANNEL_CAPACITY, Server};
pub use tracking::TrackingWriter;
pub use writer::{ResponseWriter, WriteStats, error};
