//! Per-request tracing.

use std::time::Instant;

use http::StatusCode;
use tracing::{info, info_span};

use crate::handler::{Handler, Request};
use crate::tracking::TrackingWriter;
use crate::writer::{ResponseWriter, WriteStats};

/// Wraps `next` in a span carrying method and path, and logs the outcome.
///
/// Once `next` returns, one `info` event records `status`, `bytes` and
/// `latency_ms`. A response with no status written is logged as `200`, which
/// is what the host sends for it.
///
/// If the incoming writer already keeps [`WriteStats`] (it sits behind
/// [`middleware`](super::middleware)), those are read. Otherwise a
/// [`TrackingWriter`] is added for the duration of the call.
pub fn trace<H: Handler>(next: H) -> Trace<H> {
    Trace { next }
}

/// Handler returned by [`trace`].
#[derive(Clone, Debug)]
pub struct Trace<H> {
    next: H,
}

impl<H: Handler> Handler for Trace<H> {
    fn serve(&self, w: &mut dyn ResponseWriter, req: &Request) {
        let span = info_span!("request", method = %req.method(), path = %req.uri().path());
        let _enter = span.enter();
        let started = Instant::now();

        if w.stats().is_some() {
            self.next.serve(w, req);
            if let Some(stats) = w.stats() {
                record(stats, started);
            }
        } else {
            let mut tracked = TrackingWriter::new(w);
            self.next.serve(&mut tracked, req);
            record(&tracked, started);
        }
    }
}

fn record(stats: &dyn WriteStats, started: Instant) {
    let status = stats.status().unwrap_or(StatusCode::OK);
    info!(
        status = status.as_u16(),
        bytes = stats.len(),
        latency_ms = started.elapsed().as_secs_f64() * 1000.0,
        "request completed"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::middleware::middleware;
    use crate::Recorder;

    #[test]
    fn passes_response_through() {
        let handler = trace(|w: &mut dyn ResponseWriter, _req: &Request| {
            w.write_header(StatusCode::ACCEPTED);
            w.write_str("queued").unwrap();
        });
        let mut rec = Recorder::new();
        handler.serve(&mut rec, &Request::new(Bytes::new()));

        assert_eq!(rec.status(), StatusCode::ACCEPTED);
        assert_eq!(rec.body(), b"queued");
    }

    #[test]
    fn next_is_tracked_without_outer_middleware() {
        let handler = trace(|w: &mut dyn ResponseWriter, _req: &Request| {
            assert!(w.stats().is_some());
        });
        handler.serve(&mut Recorder::new(), &Request::new(Bytes::new()));
    }

    #[test]
    fn reuses_outer_tracking_writer() {
        // With an outer TrackingWriter, the inner writer seen by `next` must be
        // that same one: its count includes bytes written before `trace` ran.
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in = Arc::clone(&seen);
        let inner = trace(move |w: &mut dyn ResponseWriter, _req: &Request| {
            let stats = w.stats().expect("tracked");
            seen_in.store(stats.len(), Ordering::SeqCst);
        });
        let handler = middleware(move |w: &mut dyn ResponseWriter, req: &Request| {
            w.write(b"prefix").unwrap();
            inner.serve(w, req);
        });

        handler.serve(&mut Recorder::new(), &Request::new(Bytes::new()));
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }
}
