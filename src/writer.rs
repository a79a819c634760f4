//! The response-writer capability.
//!
//! [`ResponseWriter`] is what a handler writes its response through. The host
//! server implements it over a live connection, [`Recorder`](crate::Recorder)
//! implements it in memory, and [`TrackingWriter`](crate::TrackingWriter)
//! implements it by wrapping another writer.
//!
//! Writes and status writes are mandatory. Flushing, hijacking and
//! close-notification are optional: the provided methods answer
//! [`Error::Unsupported`] and writers that can do better override them.

use std::io;

use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue, X_CONTENT_TYPE_OPTIONS};
use http::StatusCode;
use hyper::upgrade::OnUpgrade;

use crate::close::CloseNotify;
use crate::error::{Capability, Error};

/// Writes an HTTP response: status, headers, then body bytes.
pub trait ResponseWriter {
    /// Headers to be sent with the response.
    ///
    /// Changes made after the head has gone out have no effect.
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Writes body bytes, returning how many were accepted.
    ///
    /// Follows the [`std::io::Write::write`] convention: a short write is
    /// `Ok(n)` with `n < buf.len()`, and `Err` means nothing was accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Writes a UTF-8 string into the body.
    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.write(s.as_bytes())
    }

    /// Sends the response head with `status`.
    fn write_header(&mut self, status: StatusCode);

    /// Sends buffered body bytes now; [`Error::Unsupported`] if the writer cannot flush.
    fn flush(&mut self) -> Result<(), Error> {
        Err(Error::Unsupported(Capability::Flush))
    }

    /// Takes over the underlying connection.
    ///
    /// The returned future resolves to the raw connection once a
    /// `101 Switching Protocols` head has been sent.
    fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        Err(Error::Unsupported(Capability::Hijack))
    }

    /// Watches for the client going away; [`Error::Unsupported`] if the writer cannot tell.
    fn close_notify(&mut self) -> Result<CloseNotify, Error> {
        Err(Error::Unsupported(Capability::CloseNotify))
    }

    /// Write bookkeeping, if this writer keeps any.
    ///
    /// Handlers only see `&mut dyn ResponseWriter`; this is how they reach the
    /// counters of a [`TrackingWriter`](crate::TrackingWriter) installed by
    /// [`middleware`](crate::middleware::middleware).
    fn stats(&self) -> Option<&dyn WriteStats> {
        None
    }
}

/// Observable write state of a response.
pub trait WriteStats {
    /// Body bytes written so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The recorded status, `None` until a status or body write happens.
    fn status(&self) -> Option<StatusCode>;

    /// Whether the head has been written.
    fn written(&self) -> bool {
        self.status().is_some()
    }
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    fn headers(&self) -> &HeaderMap { (**self).headers() }
    fn headers_mut(&mut self) -> &mut HeaderMap { (**self).headers_mut() }
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { (**self).write(buf) }
    fn write_str(&mut self, s: &str) -> io::Result<usize> { (**self).write_str(s) }
    fn write_header(&mut self, status: StatusCode) { (**self).write_header(status) }
    fn flush(&mut self) -> Result<(), Error> { (**self).flush() }
    fn hijack(&mut self) -> Result<OnUpgrade, Error> { (**self).hijack() }
    fn close_notify(&mut self) -> Result<CloseNotify, Error> { (**self).close_notify() }
    fn stats(&self) -> Option<&dyn WriteStats> { (**self).stats() }
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for Box<W> {
    fn headers(&self) -> &HeaderMap { (**self).headers() }
    fn headers_mut(&mut self) -> &mut HeaderMap { (**self).headers_mut() }
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { (**self).write(buf) }
    fn write_str(&mut self, s: &str) -> io::Result<usize> { (**self).write_str(s) }
    fn write_header(&mut self, status: StatusCode) { (**self).write_header(status) }
    fn flush(&mut self) -> Result<(), Error> { (**self).flush() }
    fn hijack(&mut self) -> Result<OnUpgrade, Error> { (**self).hijack() }
    fn close_notify(&mut self) -> Result<CloseNotify, Error> { (**self).close_notify() }
    fn stats(&self) -> Option<&dyn WriteStats> { (**self).stats() }
}

/// Replies with a plain-text error: `status`, then `message` and a newline.
///
/// Any `content-type` already set is replaced. Does not end the handler; the
/// caller should return after this.
pub fn error(w: &mut dyn ResponseWriter, message: &str, status: StatusCode) -> io::Result<usize> {
    let headers = w.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    w.write_header(status);
    w.write_str(&format!("{message}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Recorder;

    #[test]
    fn error_sets_plain_text_and_status() {
        let mut rec = Recorder::new();
        error(&mut rec, "Something failed", StatusCode::INTERNAL_SERVER_ERROR).unwrap();

        assert_eq!(rec.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(rec.body(), b"Something failed\n");
        assert_eq!(rec.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(rec.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[test]
    fn optional_capabilities_default_to_unsupported() {
        struct Bare(HeaderMap);
        impl ResponseWriter for Bare {
            fn headers(&self) -> &HeaderMap { &self.0 }
            fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.0 }
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> { Ok(buf.len()) }
            fn write_header(&mut self, _status: StatusCode) {}
        }

        let mut w = Bare(HeaderMap::new());
        assert!(matches!(w.flush(), Err(Error::Unsupported(Capability::Flush))));
        assert!(matches!(w.hijack(), Err(Error::Unsupported(Capability::Hijack))));
        assert!(matches!(w.close_notify(), Err(Error::Unsupported(Capability::CloseNotify))));
        assert!(w.stats().is_none());
        assert_eq!(w.write_str("abc").unwrap(), 3);
    }
}
