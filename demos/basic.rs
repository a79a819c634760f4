//! Minimal tally example — a tracked, traced handler and a streaming one.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/
//!   curl -i http://localhost:3000/fail
//!   curl -N http://localhost:3000/ticks

use std::thread;
use std::time::Duration;

use http::StatusCode;
use tally::middleware::{middleware, trace};
use tally::{Request, ResponseWriter, Server, WriteStats, error};

#[tokio::main]
async fn main() -> Result<(), tally::Error> {
    tracing_subscriber::fmt::init();

    Server::bind("0.0.0.0:3000")?
        .serve(middleware(trace(app)))
        .await
}

fn app(w: &mut dyn ResponseWriter, req: &Request) {
    match req.uri().path() {
        "/"      => home(w),
        "/fail"  => { let _ = error(w, "Something failed", StatusCode::INTERNAL_SERVER_ERROR); }
        "/ticks" => ticks(w),
        _        => { let _ = error(w, "not found", StatusCode::NOT_FOUND); }
    }
}

// GET / — reads the tracked state back out of the writer.
fn home(w: &mut dyn ResponseWriter) {
    if !w.stats().is_some_and(|s| s.written()) {
        let _ = w.write_str("Welcome to the home page!\n");
    }
    let (status, len) = w
        .stats()
        .map(|s| (s.status().unwrap_or(StatusCode::OK), s.len()))
        .unwrap_or((StatusCode::OK, 0));
    let _ = w.write_str(&format!("Status: {}, {len} bytes so far\n", status.as_u16()));
}

// GET /ticks — flushes each line and stops early if the client leaves.
fn ticks(w: &mut dyn ResponseWriter) {
    let notify = w.close_notify().ok();
    for i in 0..10 {
        if notify.as_ref().is_some_and(|n| n.is_closed()) {
            return;
        }
        if w.write_str(&format!("tick {i}\n")).is_err() || w.flush().is_err() {
            return;
        }
        thread::sleep(Duration::from_millis(500));
    }
}
