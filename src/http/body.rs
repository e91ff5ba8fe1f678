//! Streaming response-body sink.
//!
//! [`BodySink`] is the seam between the outcome pipe and the transport:
//! the pipe pushes body chunks without knowing whether they end up framed
//! as a `Content-Length` body, a chunked transfer, or an in-memory buffer
//! in tests.

use std::future::Future;
use std::io;

/// A unidirectional sink for response body bytes.
///
/// Each `send` awaits the underlying transport, so backpressure from a slow
/// peer propagates to the producer. `finish` terminates the body (writing
/// the chunked trailer where applicable) and flushes.
pub trait BodySink: Send {
    /// Writes one body chunk. Implementations may assume `chunk` is non-empty.
    fn send(&mut self, chunk: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Terminates the body and flushes the transport.
    fn finish(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// In-memory sink, mainly useful in tests and for delegates that build a
/// body before deciding how to send it.
impl BodySink for Vec<u8> {
    async fn send(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}
