//! Sub-router delegation — registered capabilities discovered by filename.
//!
//! A directory can opt out of static resolution by containing a marker
//! file (one of the configured sub-router filenames). When the dispatcher
//! falls through to a 404 on such a directory, the marker's *registered
//! handler* — not the file's contents — takes over the in-flight response.
//! Handlers are bound up front in [`DelegateRegistry`], so delegation is a
//! capability lookup rather than code loading from a served path.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::http::{Request, ResponseWriter};
use crate::router::Router;

/// Boxed error type handlers may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while dispatching to a sub-router delegate.
#[derive(Debug, Error)]
pub enum DelegateError {
    /// A marker file was discovered but nothing is registered under its name.
    #[error("sub-router marker {path} has no registered handler")]
    Unregistered { path: PathBuf },

    /// The registered handler itself failed.
    #[error("sub-router handler failed: {0}")]
    Handler(#[source] BoxError),
}

/// A sub-router delegate.
///
/// The handler receives the live [`Router`] plus the in-flight exchange and
/// assumes full responsibility for completing the response; the dispatcher
/// writes nothing further once a delegate has been invoked. What the
/// handler does internally is its own business.
///
/// The boxed-future shape keeps the trait object-safe so handlers of
/// different concrete types can share one registry.
pub trait SubRouter: Send + Sync {
    /// Handles the exchange. A returned error becomes a 500 outcome plus an
    /// error notification; the handler must not have started the response
    /// in that case.
    fn call<'a>(
        &'a self,
        router: &'a Router,
        request: &'a Request,
        response: &'a mut ResponseWriter<'_>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>>;
}

/// A discovered delegation point: which marker filename matched and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub filename: String,
    pub path: PathBuf,
}

/// Filename-to-handler bindings for sub-router delegation.
#[derive(Default, Clone)]
pub struct DelegateRegistry {
    handlers: HashMap<String, Arc<dyn SubRouter>>,
}

impl DelegateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a handler to a marker filename, replacing any previous binding.
    pub fn register(&mut self, filename: impl Into<String>, handler: Arc<dyn SubRouter>) {
        self.handlers.insert(filename.into(), handler);
    }

    /// Returns the handler bound to a marker filename, if any.
    pub fn get(&self, filename: &str) -> Option<Arc<dyn SubRouter>> {
        self.handlers.get(filename).cloned()
    }

    /// Returns `true` if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Scans `directory` for the first marker filename (in configured
    /// order) that exists on disk.
    ///
    /// Discovery is purely a filesystem decision; whether a handler is
    /// actually registered for the discovered name is the caller's problem,
    /// so an orphaned marker still surfaces as a delegation attempt (and
    /// then a 500) instead of silently degrading to 404.
    pub async fn discover(&self, directory: &Path, filenames: &[String]) -> Option<Discovered> {
        for filename in filenames {
            let path = directory.join(filename);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!(marker = %path.display(), "sub-router marker discovered");
                return Some(Discovered {
                    filename: filename.clone(),
                    path,
                });
            }
        }
        None
    }
}

impl std::fmt::Debug for DelegateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("DelegateRegistry")
            .field("handlers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Noop;

    impl SubRouter for Noop {
        fn call<'a>(
            &'a self,
            _router: &'a Router,
            _request: &'a Request,
            _response: &'a mut ResponseWriter<'_>,
        ) -> Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = DelegateRegistry::new();
        assert!(registry.is_empty());
        registry.register(".router", Arc::new(Noop));
        assert!(registry.get(".router").is_some());
        assert!(registry.get(".route").is_none());
    }

    #[tokio::test]
    async fn discovery_follows_configured_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".route"), "").unwrap();
        std::fs::write(dir.path().join(".router"), "").unwrap();

        let registry = DelegateRegistry::new();
        let found = registry
            .discover(dir.path(), &names(&[".router", ".route"]))
            .await
            .unwrap();
        assert_eq!(found.filename, ".router");
        assert_eq!(found.path, dir.path().join(".router"));
    }

    #[tokio::test]
    async fn discovery_misses_when_no_marker_exists() {
        let dir = TempDir::new().unwrap();
        let registry = DelegateRegistry::new();
        assert!(
            registry
                .discover(dir.path(), &names(&[".router"]))
                .await
                .is_none()
        );
    }
}
