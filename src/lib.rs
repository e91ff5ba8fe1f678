//! # fsroute
//!
//! A filesystem-backed HTTP request resolver: given a request path and a
//! base directory, decide whether to serve a static file, fall back to a
//! directory's default page, delegate to a registered sub-router, or
//! answer with a bare status code — then stream the winning file to the
//! client, optionally through gzip or deflate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fsroute::{Router, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RouterConfig::new("/srv/www");
//!     let router = Arc::new(Router::new(config));
//!     let addr = router.start("0.0.0.0:8080").await?;
//!     println!("serving on http://{addr}");
//!     // ... run until shutdown, then:
//!     // router.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## How a request is answered
//!
//! 1. The optional before-hook may intercept the exchange entirely.
//! 2. The request path is sanitized (no `..` escapes) and joined onto the
//!    base directory.
//! 3. The [`Resolver`] checks private patterns first — a match is a final
//!    403 with no filesystem access — then looks for a regular file, then
//!    falls back to the configured default pages.
//! 4. A 404 on a directory (or on a missing entry whose parent holds a
//!    sub-router marker) hands the exchange to a registered [`SubRouter`].
//! 5. The resulting [`Outcome`] is streamed: content type from the
//!    extension table, content encoding negotiated against
//!    `Accept-Encoding`, body piped chunk by chunk.

pub mod config;
pub mod delegate;
pub mod http;
pub mod outcome;
pub mod resolver;
pub mod router;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{CompressionOptions, RouterConfig};
pub use delegate::{BoxError, DelegateError, DelegateRegistry, SubRouter};
pub use http::{BodySink, Headers, Method, Request, ResponseWriter, StatusCode};
pub use outcome::{Encoding, Outcome, PipeError};
pub use resolver::Resolver;
pub use router::{BeforeHook, Router, RouterError};
