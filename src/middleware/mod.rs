//! Middleware layer.
//!
//! Middleware wraps a [`Handler`] in another `Handler`. [`middleware`] is the
//! one that matters here: it swaps the incoming writer for a
//! [`TrackingWriter`] so everything downstream can ask what has been written.
//!
//! ```rust
//! use http::StatusCode;
//! use tally::{Request, ResponseWriter, WriteStats};
//! use tally::middleware::middleware;
//!
//! fn home(w: &mut dyn ResponseWriter, _req: &Request) {
//!     let written = w.stats().is_some_and(|s| s.written());
//!     if !written {
//!         w.write_str("Welcome to the home page!\n").unwrap();
//!     }
//!     let status = w.stats().and_then(|s| s.status()).unwrap_or(StatusCode::OK);
//!     w.write_str(&format!("Status: {}\n", status.as_u16())).unwrap();
//! }
//!
//! let app = middleware(home);
//! # let _ = app;
//! ```
//!
//! [`trace`](trace()) adds a per-request span with status, size and latency.

mod trace;

pub use trace::{Trace, trace};

use crate::handler::{Handler, Request};
use crate::tracking::TrackingWriter;
use crate::writer::ResponseWriter;

/// Wraps `next` so it always receives a [`TrackingWriter`].
pub fn middleware<H: Handler>(next: H) -> Tracking<H> {
    Tracking { next }
}

/// Handler returned by [`middleware`].
///
/// Builds one fresh [`TrackingWriter`] per request around the incoming writer
/// and passes it, with the untouched request, to the next handler.
#[derive(Clone, Debug)]
pub struct Tracking<H> {
    next: H,
}

impl<H: Handler> Handler for Tracking<H> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request) {
        let mut tracked = TrackingWriter::new(w);
        self.next.serve(&mut tracked, req);
    }
}
