//! The tracking response writer.
//!
//! [`TrackingWriter`] wraps another [`ResponseWriter`] and remembers two
//! things as writes pass through it: the status that was sent and how many
//! body bytes the inner writer accepted. Everything else is forwarded
//! untouched.
//!
//! ```rust
//! use http::StatusCode;
//! use tally::{Recorder, ResponseWriter, TrackingWriter, WriteStats};
//!
//! let mut w = TrackingWriter::new(Recorder::new());
//! assert!(!w.written());
//!
//! w.write_str("hello").unwrap();
//! assert_eq!(w.status(), Some(StatusCode::OK));
//! assert_eq!(w.len(), 5);
//! ```

use std::io;

use http::{HeaderMap, StatusCode};
use hyper::upgrade::OnUpgrade;

use crate::close::CloseNotify;
use crate::error::Error;
use crate::writer::{ResponseWriter, WriteStats};

/// A [`ResponseWriter`] that records status and body length.
///
/// One per request. The first body write on an untouched writer sends an
/// implicit `200 OK` head before any bytes go out.
///
/// Status writes are always forwarded, including repeated ones: the inner
/// writer decides whether a second head is meaningful. The recorded status is
/// the last one written.
#[derive(Debug)]
pub struct TrackingWriter<W> {
    inner: W,
    status: Option<StatusCode>,
    len: usize,
}

impl<W: ResponseWriter> TrackingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, status: None, len: 0 }
    }

    pub fn get_ref(&self) -> &W { &self.inner }

    /// Writing through the returned reference bypasses the bookkeeping.
    pub fn get_mut(&mut self) -> &mut W { &mut self.inner }

    pub fn into_inner(self) -> W { self.inner }

    fn write_default_header(&mut self) {
        if !self.written() {
            self.write_header(StatusCode::OK);
        }
    }
}

impl<W: ResponseWriter> WriteStats for TrackingWriter<W> {
    fn len(&self) -> usize {
        self.len
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl<W: ResponseWriter> ResponseWriter for TrackingWriter<W> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_default_header();
        let n = self.inner.write(buf)?;
        self.len += n;
        Ok(n)
    }

    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.write_default_header();
        let n = self.inner.write_str(s)?;
        self.len += n;
        Ok(n)
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.inner.write_header(status);
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush()
    }

    fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        self.inner.hijack()
    }

    fn close_notify(&mut self) -> Result<CloseNotify, Error> {
        self.inner.close_notify()
    }

    fn stats(&self) -> Option<&dyn WriteStats> {
        Some(self)
    }
}
