//! The dispatcher — owns configuration, the listening lifecycle, and the
//! per-request flow.
//!
//! Per request the flow is: before-hook → resolve → sub-router discovery on
//! a miss → result notification → translate the [`Outcome`] into response
//! bytes. Hooks are explicit injected handlers with fixed cardinality: at
//! most one [`BeforeHook`] interceptor that can short-circuit routing, and
//! any number of passive result/error observers.
//!
//! The request/response pair lives on the connection task's stack and is
//! passed down the call chain; the router itself holds no per-request
//! state, so one instance serves any number of concurrent requests.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RouterConfig;
use crate::delegate::{DelegateError, DelegateRegistry, SubRouter};
use crate::http::request::RequestError;
use crate::http::{Headers, Request, ResponseWriter, StatusCode};
use crate::outcome::{Encoding, Outcome, PipeError};
use crate::resolver::Resolver;

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// Errors produced by the router.
///
/// Resolution decisions (403/404) are not errors — they travel as
/// [`Outcome`] values. These are the genuine faults of the I/O phases:
/// binding, transport, delegation, and body streaming.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("listener transport error: {0}")]
    Transport(#[source] std::io::Error),

    #[error("sub-router delegation failed: {0}")]
    Delegate(#[from] DelegateError),

    #[error("response streaming failed: {0}")]
    Stream(#[from] PipeError),
}

/// The zero-or-one interceptor run before resolution.
///
/// Returning `true` means the hook handled the exchange itself: the
/// dispatcher stops immediately and writes nothing, trusting the hook to
/// have completed (or deliberately dropped) the response.
pub trait BeforeHook: Send + Sync {
    fn call<'a>(
        &'a self,
        request: &'a Request,
        response: &'a mut ResponseWriter<'_>,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

type ResultObserver = Box<dyn Fn(&Outcome) + Send + Sync>;
type ErrorObserver = Box<dyn Fn(&RouterError) + Send + Sync>;

struct Listening {
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Filesystem-backed HTTP dispatcher.
///
/// Configure with [`RouterConfig`], attach hooks and sub-router handlers
/// with the consuming builder methods, wrap in an [`Arc`], then
/// [`start`](Self::start) it.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use fsroute::{Router, RouterConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let router = Arc::new(Router::new(RouterConfig::new("/srv/www")));
///     let addr = router.start("0.0.0.0:8080").await?;
///     println!("serving on http://{addr}");
///     # Ok(())
/// }
/// ```
pub struct Router {
    config: Arc<RouterConfig>,
    resolver: Resolver,
    delegates: DelegateRegistry,
    before: Option<Arc<dyn BeforeHook>>,
    result_observers: Vec<ResultObserver>,
    error_observers: Vec<ErrorObserver>,
    listening: Mutex<Option<Listening>>,
}

impl Router {
    /// Creates a router over the given configuration.
    pub fn new(config: RouterConfig) -> Self {
        let config = Arc::new(config);
        Self {
            resolver: Resolver::new(Arc::clone(&config)),
            config,
            delegates: DelegateRegistry::new(),
            before: None,
            result_observers: Vec::new(),
            error_observers: Vec::new(),
            listening: Mutex::new(None),
        }
    }

    /// Sets the before-routing interceptor, replacing any previous one.
    #[must_use]
    pub fn with_before(mut self, hook: impl BeforeHook + 'static) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Adds a passive observer notified with every resolution outcome.
    #[must_use]
    pub fn on_result(mut self, observer: impl Fn(&Outcome) + Send + Sync + 'static) -> Self {
        self.result_observers.push(Box::new(observer));
        self
    }

    /// Adds a passive observer notified with every router error.
    ///
    /// With no error observers registered, errors fall through to the
    /// default diagnostic channel (`tracing::error!`) instead of being
    /// dropped.
    #[must_use]
    pub fn on_error(mut self, observer: impl Fn(&RouterError) + Send + Sync + 'static) -> Self {
        self.error_observers.push(Box::new(observer));
        self
    }

    /// Binds a sub-router handler to a marker filename.
    #[must_use]
    pub fn register_sub_router(
        mut self,
        filename: impl Into<String>,
        handler: impl SubRouter + 'static,
    ) -> Self {
        self.delegates.register(filename, Arc::new(handler));
        self
    }

    /// Returns the configuration this router serves.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Returns the bound address while the router is listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening
            .lock()
            .unwrap()
            .as_ref()
            .map(|l| l.local_addr)
    }

    /// Binds the listening socket and starts accepting connections.
    ///
    /// Idempotent: if the router is already listening, the existing bound
    /// address is returned and nothing else happens. Concurrent calls race
    /// to one binding; the losers close their sockets and return the
    /// winner's address. After [`stop`](Self::stop) the router can be
    /// started again.
    ///
    /// # Errors
    ///
    /// [`RouterError::Bind`] if the address cannot be bound.
    pub async fn start(self: &Arc<Self>, addr: impl AsRef<str>) -> Result<SocketAddr, RouterError> {
        if let Some(listening) = self.listening.lock().unwrap().as_ref() {
            return Ok(listening.local_addr);
        }

        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RouterError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let router = Arc::clone(self);
        let task = tokio::spawn(async move { router.accept_loop(listener).await });

        // Re-check under the lock: a concurrent start may have stored its
        // own binding while this one was awaiting the bind.
        {
            let mut listening = self.listening.lock().unwrap();
            if let Some(existing) = listening.as_ref() {
                task.abort();
                return Ok(existing.local_addr);
            }
            *listening = Some(Listening { task, local_addr });
        }
        info!(address = %local_addr, "fsroute listening");
        Ok(local_addr)
    }

    /// Closes the listening socket and clears the internal handle.
    ///
    /// In-flight connections finish on their own tasks; only the accept
    /// loop is torn down. A subsequent [`start`](Self::start) binds anew.
    pub fn stop(&self) {
        if let Some(listening) = self.listening.lock().unwrap().take() {
            listening.task.abort();
            info!(address = %listening.local_addr, "fsroute stopped");
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!(peer = %peer_addr, "connection accepted");
                    let router = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = router.handle_connection(stream, peer_addr).await {
                            warn!(peer = %peer_addr, error = %e, "connection closed with error");
                        }
                    });
                }
                Err(e) => {
                    // Unconsumed transport errors are fatal to the listener.
                    let err = RouterError::Transport(e);
                    if !self.notify_error(&err) {
                        error!(error = %err, "listener error with no error observer — shutting down");
                        self.listening.lock().unwrap().take();
                        break;
                    }
                }
            }
        }
    }

    /// Handles a single TCP connection over its lifetime.
    ///
    /// HTTP/1.1 connections are persistent by default: one request per loop
    /// iteration until the peer closes, signals `Connection: close`, or a
    /// response aborts mid-body.
    async fn handle_connection(
        &self,
        mut stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), std::io::Error> {
        let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

        loop {
            // Serve every complete request already buffered before going
            // back to the socket, so pipelined requests are not stalled
            // behind the next read.
            while !buf.is_empty() {
                let (request, body_offset) = match Request::parse(&buf) {
                    Ok(pair) => pair,
                    Err(RequestError::Incomplete) => {
                        // Headers not yet fully received — read more data.
                        break;
                    }
                    Err(e) => {
                        warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                        let mut response = ResponseWriter::new(&mut stream, false);
                        response.send_status(StatusCode::BadRequest).await?;
                        return Ok(());
                    }
                };

                // Wait for the full body to arrive if Content-Length is set.
                let content_length = request.content_length().unwrap_or(0);
                let Some(total_needed) = body_offset.checked_add(content_length) else {
                    warn!(peer = %peer_addr, "content-length overflow — sending 413");
                    let mut response = ResponseWriter::new(&mut stream, false);
                    response.send_status(StatusCode::PayloadTooLarge).await?;
                    return Ok(());
                };
                if buf.len() < total_needed {
                    break;
                }

                debug!(
                    peer = %peer_addr,
                    method = %request.method(),
                    path = %request.path(),
                    "dispatching request"
                );

                let must_close = {
                    let mut response = ResponseWriter::new(&mut stream, request.is_keep_alive());
                    self.route(&request, &mut response).await;
                    response.must_close()
                };

                // Drop the consumed request bytes from the buffer.
                let _ = buf.split_to(total_needed);

                if must_close {
                    debug!(peer = %peer_addr, "closing connection");
                    return Ok(());
                }
            }

            let bytes_read = stream.read_buf(&mut buf).await?;

            if bytes_read == 0 {
                debug!(peer = %peer_addr, "connection closed by peer");
                break;
            }

            // Guard against excessively large requests.
            if buf.len() > MAX_REQUEST_SIZE {
                warn!(peer = %peer_addr, "request too large — sending 413");
                let mut response = ResponseWriter::new(&mut stream, false);
                response.send_status(StatusCode::PayloadTooLarge).await?;
                break;
            }
        }

        Ok(())
    }

    /// Dispatches one exchange: hook, resolve, delegate, respond.
    pub async fn route(&self, request: &Request, response: &mut ResponseWriter<'_>) {
        if let Some(hook) = &self.before {
            if hook.call(request, response).await {
                debug!(path = request.path(), "request intercepted by before hook");
                return;
            }
        }

        let joined = self.config.join_request_path(request.path());
        let mut outcome = self.resolver.resolve(&joined).await;

        // Sub-router discovery is a second, independent decision after a
        // resolution miss. A 403 never reaches here: private paths are
        // final and get no further filesystem access.
        if outcome.code() == 404 {
            if let Some(directory) = delegate_directory(&joined).await {
                if let Some(found) = self
                    .delegates
                    .discover(&directory, self.config.sub_router_names())
                    .await
                {
                    outcome = match self.delegates.get(&found.filename) {
                        Some(handler) => match handler.call(self, request, response).await {
                            Ok(()) => Outcome::Delegated,
                            Err(e) => {
                                self.notify_error(&RouterError::Delegate(DelegateError::Handler(
                                    e,
                                )));
                                Outcome::status(StatusCode::InternalServerError)
                            }
                        },
                        None => {
                            self.notify_error(&RouterError::Delegate(
                                DelegateError::Unregistered { path: found.path },
                            ));
                            Outcome::status(StatusCode::InternalServerError)
                        }
                    };
                }
            }
        }

        for observer in &self.result_observers {
            observer(&outcome);
        }

        match &outcome {
            // The delegate owns the response; write nothing.
            Outcome::Delegated => {}
            Outcome::Status(status) => {
                if let Err(e) = response.send_status(*status).await {
                    self.notify_error(&RouterError::Io(e));
                }
            }
            Outcome::File { .. } => self.respond_file(request, response, &outcome).await,
        }
    }

    /// Streams a 200 outcome: content-type and content-encoding headers,
    /// then the body pipe.
    async fn respond_file(
        &self,
        request: &Request,
        response: &mut ResponseWriter<'_>,
        outcome: &Outcome,
    ) {
        let Some(path) = outcome.resolved_path() else {
            return;
        };

        // Stat up front so a vanished file can still fall back to a clean
        // 500 before any header bytes are out.
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(source) => {
                self.notify_error(&RouterError::Stream(PipeError::Open {
                    path: path.to_path_buf(),
                    source,
                }));
                if let Err(e) = response.send_status(StatusCode::InternalServerError).await {
                    self.notify_error(&RouterError::Io(e));
                }
                return;
            }
        };

        let mut headers = Headers::new();
        if let Some(mime) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.config.content_type(ext))
        {
            headers.insert("Content-Type", mime);
        }

        let encoding = self.negotiate_encoding(request);
        let content_length = match encoding {
            Some(encoding) => {
                headers.insert("Content-Encoding", encoding.as_str());
                // Compressed size is unknown; the body goes out chunked.
                None
            }
            None => Some(metadata.len()),
        };

        if let Err(e) = response
            .send_head(StatusCode::Ok, &headers, content_length)
            .await
        {
            self.notify_error(&RouterError::Io(e));
            return;
        }

        if let Err(e) = outcome
            .pipe(response, encoding, self.config.compression_options())
            .await
        {
            // Headers are already out: the connection is poisoned and the
            // connection loop will terminate it. No retry.
            self.notify_error(&RouterError::Stream(e));
        }
    }

    fn negotiate_encoding(&self, request: &Request) -> Option<Encoding> {
        if self.config.gzip_enabled() && request.accepts_encoding("gzip") {
            Some(Encoding::Gzip)
        } else if self.config.deflate_enabled() && request.accepts_encoding("deflate") {
            Some(Encoding::Deflate)
        } else {
            None
        }
    }

    /// Notifies error observers; returns `true` if anyone consumed the
    /// error. Without observers the error goes to the log so it is never
    /// silently dropped.
    fn notify_error(&self, error: &RouterError) -> bool {
        if self.error_observers.is_empty() {
            error!(error = %error, "unhandled router error");
            return false;
        }
        for observer in &self.error_observers {
            observer(error);
        }
        true
    }
}

/// Picks the directory scanned for sub-router markers: the requested path
/// itself when it is an existing directory, otherwise its parent.
async fn delegate_directory(joined: &Path) -> Option<PathBuf> {
    match tokio::fs::metadata(joined).await {
        Ok(metadata) if metadata.is_dir() => Some(joined.to_path_buf()),
        _ => joined.parent().map(Path::to_path_buf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(accept_encoding: Option<&str>) -> Request {
        let raw = match accept_encoding {
            Some(v) => format!("GET / HTTP/1.1\r\nAccept-Encoding: {v}\r\n\r\n"),
            None => "GET / HTTP/1.1\r\nHost: x\r\n\r\n".to_owned(),
        };
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[test]
    fn gzip_wins_over_deflate() {
        let router = Router::new(RouterConfig::new("/srv"));
        let req = request_with(Some("deflate, gzip"));
        assert_eq!(router.negotiate_encoding(&req), Some(Encoding::Gzip));
    }

    #[test]
    fn deflate_when_gzip_disabled() {
        let router = Router::new(RouterConfig::new("/srv").gzip(false));
        let req = request_with(Some("gzip, deflate"));
        assert_eq!(router.negotiate_encoding(&req), Some(Encoding::Deflate));
    }

    #[test]
    fn identity_when_nothing_accepted() {
        let router = Router::new(RouterConfig::new("/srv"));
        let req = request_with(None);
        assert_eq!(router.negotiate_encoding(&req), None);

        let req = request_with(Some("br"));
        assert_eq!(router.negotiate_encoding(&req), None);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_rearms() {
        let router = Arc::new(Router::new(RouterConfig::new("/srv")));

        let first = router.start("127.0.0.1:0").await.unwrap();
        let second = router.start("127.0.0.1:0").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(router.local_addr(), Some(first));

        router.stop();
        assert_eq!(router.local_addr(), None);

        let third = router.start("127.0.0.1:0").await.unwrap();
        assert_ne!(third.port(), 0);
        router.stop();
    }

    #[tokio::test]
    async fn concurrent_starts_share_one_binding() {
        let router = Arc::new(Router::new(RouterConfig::new("/srv")));

        let (first, second) =
            tokio::join!(router.start("127.0.0.1:0"), router.start("127.0.0.1:0"));
        assert_eq!(first.unwrap(), second.unwrap());

        router.stop();
    }

    #[tokio::test]
    async fn delegate_directory_prefers_existing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(
            delegate_directory(dir.path()).await,
            Some(dir.path().to_path_buf())
        );

        let missing = dir.path().join("missing.txt");
        assert_eq!(
            delegate_directory(&missing).await,
            Some(dir.path().to_path_buf())
        );
    }
}
