//! Streaming HTTP/1.1 response writer.
//!
//! Unlike a buffered response builder, [`ResponseWriter`] writes the status
//! line and headers up front and then streams the body through its
//! [`BodySink`] impl, so a large file is never held in memory. Two framing
//! modes are supported: `Content-Length` when the body size is known ahead
//! of time, and chunked transfer encoding when it is not (compressed
//! bodies).

use std::io;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{BodySink, Headers, StatusCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Identity,
    Chunked,
}

/// Writes one HTTP response to a borrowed transport.
///
/// A writer is created per exchange and tracks whether the response head
/// has been written and whether the body was terminated cleanly. The
/// connection loop uses [`must_close`](Self::must_close) to decide whether
/// the connection can be reused: an aborted body stream poisons the
/// connection because the peer can no longer find the message boundary.
pub struct ResponseWriter<'a> {
    stream: &'a mut (dyn AsyncWrite + Unpin + Send),
    keep_alive: bool,
    started: bool,
    finished: bool,
    framing: Framing,
}

impl<'a> ResponseWriter<'a> {
    /// Creates a writer over a borrowed transport.
    ///
    /// `keep_alive` is the connection reuse decision taken from the request;
    /// it controls the `Connection` header on whatever response is written.
    pub fn new(stream: &'a mut (dyn AsyncWrite + Unpin + Send), keep_alive: bool) -> Self {
        Self {
            stream,
            keep_alive,
            started: false,
            finished: false,
            framing: Framing::Identity,
        }
    }

    /// Returns `true` once the status line and headers have been written.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Returns `true` once the body has been terminated cleanly.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Returns `true` if the connection must be closed after this exchange,
    /// either because keep-alive is off or because the response never
    /// completed cleanly.
    pub fn must_close(&self) -> bool {
        !(self.started && self.finished && self.keep_alive)
    }

    /// Sends a complete response for `status` using its default body text.
    ///
    /// This is the whole exchange for non-200 outcomes: status line,
    /// headers, and the short status page (empty for 200).
    pub async fn send_status(&mut self, status: StatusCode) -> io::Result<()> {
        let body = status.default_body();
        let mut head = self.head_prefix(status);

        if !body.is_empty() {
            head.put(&b"Content-Type: text/plain; charset=utf-8\r\n"[..]);
        }
        head.put(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        head.put(body.as_bytes());

        self.started = true;
        self.stream.write_all(&head).await?;
        self.stream.flush().await?;
        self.finished = true;
        Ok(())
    }

    /// Writes the response head and arms the body sink.
    ///
    /// With `content_length` known the body is framed as-is; otherwise
    /// chunked transfer encoding is used. Body bytes then flow through the
    /// [`BodySink`] impl and the response is terminated by
    /// [`finish`](BodySink::finish).
    pub async fn send_head(
        &mut self,
        status: StatusCode,
        headers: &Headers,
        content_length: Option<u64>,
    ) -> io::Result<()> {
        let mut head = self.head_prefix(status);

        for (name, value) in headers.iter() {
            head.put(format!("{name}: {value}\r\n").as_bytes());
        }

        match content_length {
            Some(len) => {
                self.framing = Framing::Identity;
                head.put(format!("Content-Length: {len}\r\n").as_bytes());
            }
            None => {
                self.framing = Framing::Chunked;
                head.put(&b"Transfer-Encoding: chunked\r\n"[..]);
            }
        }
        head.put(&b"\r\n"[..]);

        self.started = true;
        self.stream.write_all(&head).await
    }

    fn head_prefix(&self, status: StatusCode) -> BytesMut {
        let mut head = BytesMut::with_capacity(128);
        head.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                status.as_u16(),
                status.canonical_reason()
            )
            .as_bytes(),
        );
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        head.put(format!("Connection: {connection}\r\n").as_bytes());
        head
    }
}

impl BodySink for ResponseWriter<'_> {
    async fn send(&mut self, chunk: &[u8]) -> io::Result<()> {
        if !self.started || self.finished {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "body chunk outside an open response",
            ));
        }
        if chunk.is_empty() {
            // An empty chunk would terminate a chunked body early.
            return Ok(());
        }
        match self.framing {
            Framing::Identity => self.stream.write_all(chunk).await,
            Framing::Chunked => {
                let mut frame = BytesMut::with_capacity(chunk.len() + 16);
                frame.put(format!("{:X}\r\n", chunk.len()).as_bytes());
                frame.put(chunk);
                frame.put(&b"\r\n"[..]);
                self.stream.write_all(&frame).await
            }
        }
    }

    async fn finish(&mut self) -> io::Result<()> {
        if self.framing == Framing::Chunked {
            self.stream.write_all(b"0\r\n\r\n").await?;
        }
        self.stream.flush().await?;
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn text(cursor: &Cursor<Vec<u8>>) -> String {
        String::from_utf8(cursor.get_ref().clone()).unwrap()
    }

    #[tokio::test]
    async fn status_response_carries_default_body() {
        let mut out = Cursor::new(Vec::new());
        let mut writer = ResponseWriter::new(&mut out, true);
        writer.send_status(StatusCode::NotFound).await.unwrap();
        assert!(!writer.must_close());

        let s = text(&out);
        assert!(s.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(s.contains("Connection: keep-alive\r\n"));
        assert!(s.contains("Content-Length: 9\r\n"));
        assert!(s.ends_with("\r\n\r\nNot Found"));
    }

    #[tokio::test]
    async fn ok_status_has_empty_body() {
        let mut out = Cursor::new(Vec::new());
        let mut writer = ResponseWriter::new(&mut out, true);
        writer.send_status(StatusCode::Ok).await.unwrap();

        let s = text(&out);
        assert!(s.contains("Content-Length: 0\r\n"));
        assert!(!s.contains("Content-Type"));
    }

    #[tokio::test]
    async fn identity_body_with_content_length() {
        let mut out = Cursor::new(Vec::new());
        let mut writer = ResponseWriter::new(&mut out, true);
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");

        writer
            .send_head(StatusCode::Ok, &headers, Some(5))
            .await
            .unwrap();
        writer.send(b"hello").await.unwrap();
        writer.finish().await.unwrap();
        assert!(!writer.must_close());

        let s = text(&out);
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn chunked_body_frames_and_terminates() {
        let mut out = Cursor::new(Vec::new());
        let mut writer = ResponseWriter::new(&mut out, false);

        writer
            .send_head(StatusCode::Ok, &Headers::new(), None)
            .await
            .unwrap();
        writer.send(b"hello world, ").await.unwrap();
        writer.send(b"again").await.unwrap();
        writer.finish().await.unwrap();

        let s = text(&out);
        assert!(s.contains("Transfer-Encoding: chunked\r\n"));
        assert!(s.contains("Connection: close\r\n"));
        assert!(s.contains("D\r\nhello world, \r\n"));
        assert!(s.contains("5\r\nagain\r\n"));
        assert!(s.ends_with("0\r\n\r\n"));
    }

    #[tokio::test]
    async fn aborted_stream_poisons_connection() {
        let mut out = Cursor::new(Vec::new());
        let mut writer = ResponseWriter::new(&mut out, true);
        writer
            .send_head(StatusCode::Ok, &Headers::new(), None)
            .await
            .unwrap();
        writer.send(b"partial").await.unwrap();
        // No finish — simulate a failed pipe.
        assert!(writer.must_close());
    }

    #[tokio::test]
    async fn body_outside_open_response_is_rejected() {
        let mut out = Cursor::new(Vec::new());
        let mut writer = ResponseWriter::new(&mut out, true);
        assert!(writer.send(b"oops").await.is_err());
    }
}
