//! Handler trait.
//!
//! A handler receives the response writer and the request, and writes its
//! response through the writer. It returns nothing: whatever went through the
//! writer *is* the response.
//!
//! ```text
//! fn hello(w: &mut dyn ResponseWriter, req: &Request) { … }   ← user writes this
//!        ↓ Server::serve(middleware(hello))
//! Arc::new(Tracking { next: hello })                          ← BoxedHandler
//!        ↓ per request, on a blocking-pool thread
//! handler.serve(&mut conn_writer, &req)                        ← one vtable call
//! ```
//!
//! Handlers run on tokio's blocking pool, so plain blocking code is fine
//! inside them. Each request gets its own thread for as long as the handler
//! runs.

use std::sync::Arc;

use bytes::Bytes;

use crate::writer::ResponseWriter;

/// An incoming request with its body already read.
pub type Request = http::Request<Bytes>;

/// A type-erased handler shared across concurrent requests.
pub(crate) type BoxedHandler = Arc<dyn Handler>;

/// Responds to one request by writing through `w`.
///
/// Implemented for every `Fn(&mut dyn ResponseWriter, &Request)`, so plain
/// functions work as handlers. Middleware implements it on a struct that holds
/// the next handler.
pub trait Handler: Send + Sync + 'static {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseWriter, &Request) + Send + Sync + 'static,
{
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request) {
        self(w, req)
    }
}
