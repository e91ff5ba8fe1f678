//! Resolution outcomes and the outcome-to-response byte pipe.
//!
//! [`Outcome`] is the immutable value produced by one resolution call:
//! either a file to serve, a terminal status code, or the marker that a
//! sub-router delegate already took over the response. A served file is
//! opened lazily — only when [`Outcome::pipe`] actually consumes it — so
//! outcomes that are discarded (e.g. replaced by a delegate) never touch a
//! file descriptor.

use std::io::Write;
use std::mem;
use std::path::{Path, PathBuf};

use flate2::write::{GzEncoder, ZlibEncoder};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::config::CompressionOptions;
use crate::http::{BodySink, StatusCode};

/// Read granularity for the file-to-sink pipe.
const PIPE_CHUNK_SIZE: usize = 64 * 1024;

/// A content coding applied to the body stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    /// The zlib container, as HTTP `deflate` means per RFC 9110 §8.4.1.2.
    Deflate,
}

impl Encoding {
    /// Returns the coding name as used in `Content-Encoding`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }
}

/// Errors raised while piping a resolved file to the response sink.
///
/// Resolution itself never produces these — forbidden and not-found are
/// decisions, not faults, and travel as [`Outcome`] values. Pipe errors are
/// genuine I/O faults on one of the three pipeline stages.
#[derive(Debug, Error)]
pub enum PipeError {
    #[error("outcome has no byte source to pipe")]
    NoByteSource,

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read source file: {0}")]
    Read(#[source] std::io::Error),

    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("failed to write to sink: {0}")]
    Write(#[source] std::io::Error),
}

/// The immutable result of resolving one request path.
///
/// Constructed once per resolution, consumed at most once by the dispatch
/// pipeline, then discarded.
///
/// # Examples
///
/// ```
/// use fsroute::outcome::Outcome;
/// use fsroute::http::StatusCode;
///
/// let outcome = Outcome::file("/srv/index.html");
/// assert_eq!(outcome.code(), 200);
///
/// let outcome = Outcome::status(StatusCode::NotFound);
/// assert_eq!(outcome.code(), 404);
/// assert!(outcome.resolved_path().is_none());
///
/// // The zero sentinel: a delegate owns the response now.
/// assert_eq!(Outcome::Delegated.code(), 0);
/// ```
#[derive(Debug)]
pub enum Outcome {
    /// Serve this file with status 200. The byte source is opened when the
    /// outcome is piped, never earlier.
    File { path: PathBuf },
    /// Answer with a bare status code and its default body.
    Status(StatusCode),
    /// A sub-router delegate took over; the dispatcher must not touch the
    /// response. Reported as code `0`.
    Delegated,
}

impl Outcome {
    /// Creates a 200 outcome for the given resolved path.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Creates a terminal status outcome.
    pub fn status(code: StatusCode) -> Self {
        Self::Status(code)
    }

    /// Returns the numeric status code, with `0` for the delegated sentinel.
    pub fn code(&self) -> u16 {
        match self {
            Self::File { .. } => 200,
            Self::Status(code) => code.as_u16(),
            Self::Delegated => 0,
        }
    }

    /// Returns the resolved filesystem path, present only for 200 outcomes.
    pub fn resolved_path(&self) -> Option<&Path> {
        match self {
            Self::File { path } => Some(path),
            _ => None,
        }
    }

    /// Streams the resolved file into `sink`, optionally through a
    /// compressor.
    ///
    /// The file is read in fixed-size chunks and every chunk is awaited
    /// into the sink before the next read, so backpressure from the peer
    /// reaches the file read and nothing larger than one chunk is buffered.
    /// An error on any stage aborts the whole pipeline and the open file
    /// descriptor is released on return.
    ///
    /// # Errors
    ///
    /// [`PipeError::NoByteSource`] if this outcome is not a 200-with-path;
    /// otherwise the failing pipeline stage (open, read, compress, write).
    pub async fn pipe<S: BodySink>(
        &self,
        sink: &mut S,
        encoding: Option<Encoding>,
        options: CompressionOptions,
    ) -> Result<(), PipeError> {
        let path = match self {
            Self::File { path } => path,
            _ => return Err(PipeError::NoByteSource),
        };

        let mut file = File::open(path).await.map_err(|source| PipeError::Open {
            path: path.clone(),
            source,
        })?;

        let mut transform = Transform::new(encoding, options);
        let mut buf = vec![0u8; PIPE_CHUNK_SIZE];

        loop {
            let n = file.read(&mut buf).await.map_err(PipeError::Read)?;
            if n == 0 {
                break;
            }
            let ready = transform.push(&buf[..n]).map_err(PipeError::Compress)?;
            if !ready.is_empty() {
                sink.send(&ready).await.map_err(PipeError::Write)?;
            }
        }

        let tail = transform.finish().map_err(PipeError::Compress)?;
        if !tail.is_empty() {
            sink.send(&tail).await.map_err(PipeError::Write)?;
        }
        sink.finish().await.map_err(PipeError::Write)
    }
}

/// Incremental content-coding stage of the pipe.
///
/// The flate2 encoders are synchronous writers; driving them chunk-by-chunk
/// and draining their output buffer after each push keeps the pipeline
/// streaming without blocking the runtime for longer than one chunk.
enum Transform {
    Identity,
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(ZlibEncoder<Vec<u8>>),
}

impl Transform {
    fn new(encoding: Option<Encoding>, options: CompressionOptions) -> Self {
        match encoding {
            None => Self::Identity,
            Some(Encoding::Gzip) => {
                Self::Gzip(GzEncoder::new(Vec::new(), options.flate2_level()))
            }
            Some(Encoding::Deflate) => {
                Self::Deflate(ZlibEncoder::new(Vec::new(), options.flate2_level()))
            }
        }
    }

    /// Feeds one input chunk and returns whatever output is ready.
    fn push(&mut self, chunk: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Identity => Ok(chunk.to_vec()),
            Self::Gzip(encoder) => {
                encoder.write_all(chunk)?;
                Ok(mem::take(encoder.get_mut()))
            }
            Self::Deflate(encoder) => {
                encoder.write_all(chunk)?;
                Ok(mem::take(encoder.get_mut()))
            }
        }
    }

    /// Flushes the encoder and returns the final output bytes.
    fn finish(self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Identity => Ok(Vec::new()),
            Self::Gzip(encoder) => encoder.finish(),
            Self::Deflate(encoder) => encoder.finish(),
        }
    }
}
