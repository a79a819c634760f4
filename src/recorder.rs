//! In-memory response writer for tests.

use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};

use crate::close::{self, CloseNotify, CloseSignal};
use crate::error::{Capability, Error};
use crate::writer::ResponseWriter;

/// Records what a handler writes instead of sending it anywhere.
///
/// Behaves like a connection-backed writer where it matters to tests:
///
/// - the status reads `200 OK` until one is written,
/// - only the first status write counts,
/// - a body write or flush without a status implies `200 OK`.
///
/// Supports flushing. Close-notification is opt-in via
/// [`Recorder::with_close_notify`]; hijacking is not supported.
#[derive(Debug)]
pub struct Recorder {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    wrote_header: bool,
    flushed: bool,
    close: Option<CloseSignal>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            wrote_header: false,
            flushed: false,
            close: None,
        }
    }

    /// A recorder that also hands out [`CloseNotify`] receivers.
    pub fn with_close_notify() -> Self {
        let (signal, _) = close::channel();
        Self { close: Some(signal), ..Self::new() }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn flushed(&self) -> bool { self.flushed }

    /// Whether a status was written, explicitly or implied by a body write.
    pub fn wrote_header(&self) -> bool { self.wrote_header }

    /// Lossy UTF-8 view of the body.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_body(self) -> Bytes {
        self.body.freeze()
    }

    /// Simulates the client going away. No-op without close-notify support.
    pub fn close_client(&self) {
        if let Some(signal) = &self.close {
            signal.close();
        }
    }
}

impl Default for Recorder {
    fn default() -> Self { Self::new() }
}

impl ResponseWriter for Recorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.wrote_header {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.wrote_header {
            return;
        }
        self.status = status;
        self.wrote_header = true;
    }

    fn flush(&mut self) -> Result<(), Error> {
        if !self.wrote_header {
            self.write_header(StatusCode::OK);
        }
        self.flushed = true;
        Ok(())
    }

    fn close_notify(&mut self) -> Result<CloseNotify, Error> {
        self.close
            .as_ref()
            .map(CloseSignal::subscribe)
            .ok_or(Error::Unsupported(Capability::CloseNotify))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let rec = Recorder::new();
        assert_eq!(rec.status(), StatusCode::OK);
        assert!(!rec.wrote_header());
        assert!(!rec.flushed());
        assert!(rec.body().is_empty());
    }

    #[test]
    fn first_status_wins() {
        let mut rec = Recorder::new();
        rec.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        rec.write_header(StatusCode::OK);
        assert_eq!(rec.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn write_implies_ok() {
        let mut rec = Recorder::new();
        rec.write(b"data").unwrap();
        rec.write_header(StatusCode::NOT_FOUND);
        assert!(rec.wrote_header());
        assert_eq!(rec.status(), StatusCode::OK);
        assert_eq!(rec.body_string(), "data");
    }

    #[test]
    fn flush_marks_flushed() {
        let mut rec = Recorder::new();
        rec.flush().unwrap();
        assert!(rec.flushed());
        assert!(rec.wrote_header());
    }

    #[test]
    fn close_notify_is_opt_in() {
        let mut plain = Recorder::new();
        assert!(matches!(
            plain.close_notify(),
            Err(Error::Unsupported(Capability::CloseNotify))
        ));

        let mut rec = Recorder::with_close_notify();
        let notify = rec.close_notify().unwrap();
        assert!(!notify.is_closed());
        rec.close_client();
        assert!(notify.is_closed());
    }
}
