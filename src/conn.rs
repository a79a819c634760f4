//! Response writer backed by a live hyper connection.
//!
//! The handler runs on a blocking-pool thread while hyper waits on the async
//! side. They meet through two channels:
//!
//! ```text
//!  handler thread                          dispatch task / hyper
//!  ──────────────                          ─────────────────────
//!  write_header / headers_mut ──┐
//!  write → buf (≤ buffer_size)  ├─ commit ─▶ head: oneshot<(status, headers)>
//!  flush / full buf / finish ───┘            → http::Response<ResponseBody>
//!        send chunk ─────────────────────▶ body: mpsc<Bytes> → ResponseBody
//! ```
//!
//! Nothing reaches the client before the head is committed. Small responses
//! stay in the buffer until the handler returns and go out with a
//! `content-length`; larger ones are streamed chunk by chunk.

use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, HeaderValue};
use http::{HeaderMap, StatusCode};
use hyper::body::{Body, Frame};
use hyper::upgrade::OnUpgrade;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::close::CloseNotify;
use crate::error::Error;
use crate::writer::ResponseWriter;

/// Status and headers, handed to the dispatch task on commit.
pub(crate) type Head = (StatusCode, HeaderMap);

/// The [`ResponseWriter`] handlers see when running under [`Server`](crate::Server).
pub(crate) struct ConnWriter {
    headers: HeaderMap,
    status: Option<StatusCode>,
    /// `Some` until the head is committed.
    head: Option<oneshot::Sender<Head>>,
    buf: BytesMut,
    buffer_size: usize,
    body: mpsc::Sender<Bytes>,
    upgrade: Option<OnUpgrade>,
    close: CloseNotify,
}

impl ConnWriter {
    pub(crate) fn new(
        head: oneshot::Sender<Head>,
        body: mpsc::Sender<Bytes>,
        upgrade: OnUpgrade,
        close: CloseNotify,
        buffer_size: usize,
    ) -> Self {
        Self {
            headers: HeaderMap::new(),
            status: None,
            head: Some(head),
            buf: BytesMut::with_capacity(buffer_size),
            buffer_size,
            body,
            upgrade: Some(upgrade),
            close,
        }
    }

    /// Completes the response once the handler has returned.
    ///
    /// An uncommitted response is still whole, so its length is known.
    pub(crate) fn finish(mut self) -> io::Result<()> {
        let status = *self.status.get_or_insert(StatusCode::OK);
        if self.head.is_some()
            && body_allowed(status)
            && !self.headers.contains_key(CONTENT_LENGTH)
        {
            self.headers.insert(CONTENT_LENGTH, HeaderValue::from(self.buf.len()));
        }
        self.commit();
        self.send_buffered()
    }

    fn commit(&mut self) {
        let Some(head) = self.head.take() else { return };
        let status = self.status.unwrap_or(StatusCode::OK);
        if head.send((status, std::mem::take(&mut self.headers))).is_err() {
            debug!("client went away before the response head was sent");
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = self.buf.split().freeze();
        self.body.blocking_send(chunk).map_err(|_| client_gone())
    }
}

impl ResponseWriter for ConnWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        if self.body.is_closed() {
            return Err(client_gone());
        }
        self.buf.extend_from_slice(buf);
        if self.buf.len() >= self.buffer_size {
            self.commit();
            self.send_buffered()?;
        }
        Ok(buf.len())
    }

    fn write_header(&mut self, status: StatusCode) {
        if let Some(first) = self.status {
            warn!(first = first.as_u16(), ignored = status.as_u16(), "superfluous write_header call");
            return;
        }
        self.status = Some(status);
    }

    fn flush(&mut self) -> Result<(), Error> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.commit();
        Ok(self.send_buffered()?)
    }

    fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        let upgrade = self.upgrade.take().ok_or(Error::Hijacked)?;
        debug!("connection hijacked");
        Ok(upgrade)
    }

    fn close_notify(&mut self) -> Result<CloseNotify, Error> {
        Ok(self.close.clone())
    }
}

fn client_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client closed the connection")
}

/// Statuses that never carry a body (RFC 9110 §6.4.1).
fn body_allowed(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

// ── ResponseBody ──────────────────────────────────────────────────────────────

/// Response body fed by a [`ConnWriter`] on another thread.
///
/// Ends when every sender is dropped. Dropping the body (hyper does this when
/// the client disconnects) closes the channel, which is how the writer and
/// the close watcher learn the client is gone.
pub(crate) struct ResponseBody {
    rx: Option<mpsc::Receiver<Bytes>>,
}

impl ResponseBody {
    pub(crate) fn channel(rx: mpsc::Receiver<Bytes>) -> Self {
        Self { rx: Some(rx) }
    }

    pub(crate) fn empty() -> Self {
        Self { rx: None }
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut().rx.as_mut() {
            Some(rx) => rx.poll_recv(cx).map(|chunk| chunk.map(|b| Ok(Frame::data(b)))),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.rx.is_none()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;
    use crate::close;

    struct Parts {
        writer: ConnWriter,
        head: oneshot::Receiver<Head>,
        body: ResponseBody,
    }

    fn conn(buffer_size: usize) -> Parts {
        let (head_tx, head) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(16);
        let (_signal, notify) = close::channel();
        let upgrade = hyper::upgrade::on(http::Request::new(()));
        Parts {
            writer: ConnWriter::new(head_tx, body_tx, upgrade, notify, buffer_size),
            head,
            body: ResponseBody::channel(body_rx),
        }
    }

    async fn collect(body: ResponseBody) -> Bytes {
        body.collect().await.unwrap().to_bytes()
    }

    /// Runs `f` on a blocking thread, where `blocking_send` is allowed.
    async fn on_blocking<F: FnOnce() + Send + 'static>(f: F) {
        tokio::task::spawn_blocking(f).await.unwrap();
    }

    #[tokio::test]
    async fn small_body_gets_content_length() {
        let Parts { mut writer, head, body } = conn(4096);
        on_blocking(move || {
            writer.write(b"hello").unwrap();
            writer.finish().unwrap();
        })
        .await;

        let (status, headers) = head.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_LENGTH], "5");
        assert_eq!(collect(body).await, "hello");
    }

    #[tokio::test]
    async fn nothing_written_is_empty_ok() {
        let Parts { writer, head, body } = conn(4096);
        on_blocking(move || writer.finish().unwrap()).await;

        let (status, headers) = head.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_LENGTH], "0");
        assert!(collect(body).await.is_empty());
    }

    #[tokio::test]
    async fn no_content_has_no_length() {
        let Parts { mut writer, head, .. } = conn(4096);
        on_blocking(move || {
            writer.write_header(StatusCode::NO_CONTENT);
            writer.finish().unwrap();
        })
        .await;

        let (status, headers) = head.await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(!headers.contains_key(CONTENT_LENGTH));
    }

    #[tokio::test]
    async fn first_status_wins() {
        let Parts { mut writer, head, .. } = conn(4096);
        on_blocking(move || {
            writer.write_header(StatusCode::CREATED);
            writer.write_header(StatusCode::BAD_GATEWAY);
            writer.finish().unwrap();
        })
        .await;

        assert_eq!(head.await.unwrap().0, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn large_bodies_stream_in_chunks() {
        let Parts { mut writer, mut head, body } = conn(4);
        on_blocking(move || {
            writer.headers_mut().insert("x-kind", HeaderValue::from_static("stream"));
            writer.write(b"abcdef").unwrap();
            // Committed by the full buffer: later header edits do not travel.
            writer.headers_mut().insert("x-late", HeaderValue::from_static("1"));
            writer.write(b"gh").unwrap();
            writer.finish().unwrap();
        })
        .await;

        let (status, headers) = head.try_recv().unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-kind"], "stream");
        assert!(!headers.contains_key("x-late"));
        assert!(!headers.contains_key(CONTENT_LENGTH));
        assert_eq!(collect(body).await, "abcdefgh");
    }

    #[tokio::test]
    async fn flush_commits_head() {
        let Parts { mut writer, mut head, body } = conn(4096);
        on_blocking(move || {
            writer.write(b"part").unwrap();
            writer.flush().unwrap();
            writer.finish().unwrap();
        })
        .await;

        assert!(!head.try_recv().unwrap().1.contains_key(CONTENT_LENGTH));
        assert_eq!(collect(body).await, "part");
    }

    #[tokio::test]
    async fn writes_fail_once_client_is_gone() {
        let Parts { mut writer, body, .. } = conn(4096);
        drop(body);
        on_blocking(move || {
            let err = writer.write(b"late").unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        })
        .await;
    }

    #[tokio::test]
    async fn hijack_only_once() {
        let Parts { mut writer, .. } = conn(4096);
        assert!(writer.hijack().is_ok());
        assert!(matches!(writer.hijack(), Err(Error::Hijacked)));
    }

    #[tokio::test]
    async fn empty_body_ends_immediately() {
        let body = ResponseBody::empty();
        assert!(body.is_end_stream());
        assert!(collect(body).await.is_empty());
    }
}
