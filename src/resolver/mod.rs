//! Path resolution — pure decision logic from path plus filesystem state
//! to an [`Outcome`].
//!
//! The resolver never performs response I/O and never raises: forbidden and
//! not-found are ordinary return values. The privacy check runs before any
//! filesystem access, so a private path answers 403 whether or not it
//! exists — existence is never leaked.
//!
//! One deliberate quirk is inherited from the resolution rules: a path that
//! exists but is not a regular file (a directory) and a path that does not
//! exist at all both fall into default-page resolution, rooted at the path
//! itself in the first case and at its parent directory in the second.

use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use crate::config::RouterConfig;
use crate::http::StatusCode;
use crate::outcome::Outcome;

/// Resolves absolute filesystem paths to outcomes using a shared,
/// read-only configuration.
///
/// Cheap to clone; every concurrent request can hold its own handle.
#[derive(Debug, Clone)]
pub struct Resolver {
    config: Arc<RouterConfig>,
}

impl Resolver {
    /// Creates a resolver over the given configuration.
    pub fn new(config: Arc<RouterConfig>) -> Self {
        Self { config }
    }

    /// Resolves an absolute path to an outcome.
    ///
    /// In order: private-pattern check (no filesystem access), then
    /// existence check, then regular-file check, with default-page fallback
    /// for directories and missing targets.
    pub async fn resolve(&self, absolute: &Path) -> Outcome {
        let directory = absolute.parent().unwrap_or(absolute);
        let filename = absolute
            .file_name()
            .map(|f| f.to_string_lossy())
            .unwrap_or_default();

        // Every component of the requested path is subject to the
        // directory patterns, so requesting a private directory itself is
        // just as forbidden as requesting something inside it.
        let path_str = absolute.to_string_lossy();
        let private_dir = self
            .config
            .split_components(&path_str)
            .any(|component| self.config.is_private_directory(component));

        if private_dir || self.config.is_private_file(&filename) {
            trace!(path = %absolute.display(), "private pattern matched");
            return Outcome::status(StatusCode::Forbidden);
        }

        match tokio::fs::metadata(absolute).await {
            Ok(meta) if meta.is_file() => Outcome::file(absolute),
            // Exists but is not a regular file: look for a default page
            // inside it.
            Ok(_) => self.resolve_default_page(absolute).await,
            // Missing: look for a default page in the parent directory.
            Err(_) => self.resolve_default_page(directory).await,
        }
    }

    /// Searches `directory` for the first configured default page that
    /// exists, in list order. No tie-breaking beyond list position.
    pub async fn resolve_default_page(&self, directory: &Path) -> Outcome {
        for page in self.config.default_page_names() {
            let candidate = directory.join(page);
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                trace!(page = %candidate.display(), "default page found");
                return Outcome::file(candidate);
            }
        }
        Outcome::status(StatusCode::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use regex::Regex;
    use tempfile::TempDir;

    fn resolver_for(dir: &TempDir) -> Resolver {
        let config = RouterConfig::new(dir.path())
            .clear_private_patterns()
            .private_directory(Regex::new("^secret$").unwrap())
            .private_file(Regex::new(r"(?i)^credentials\.txt$").unwrap());
        Resolver::new(Arc::new(config))
    }

    #[tokio::test]
    async fn existing_regular_file_resolves_to_itself() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("page.html");
        std::fs::write(&file, "<html>").unwrap();

        let outcome = resolver_for(&dir).resolve(&file).await;
        assert_eq!(outcome.code(), 200);
        assert_eq!(outcome.resolved_path(), Some(file.as_path()));
    }

    #[tokio::test]
    async fn private_directory_forbids_even_nonexistent_paths() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_for(&dir);

        // Neither the directory nor the file exists; the pattern alone decides.
        let outcome = resolver
            .resolve(&dir.path().join("secret/anything.txt"))
            .await;
        assert_eq!(outcome.code(), 403);
    }

    #[tokio::test]
    async fn private_directory_requested_directly_is_forbidden() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("secret")).unwrap();
        std::fs::write(dir.path().join("secret/index.html"), "hidden").unwrap();

        // The directory exists and holds a default page, but the pattern
        // on the final component decides first.
        let outcome = resolver_for(&dir).resolve(&dir.path().join("secret")).await;
        assert_eq!(outcome.code(), 403);
    }

    #[tokio::test]
    async fn private_file_is_forbidden() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("CREDENTIALS.TXT");
        std::fs::write(&file, "hunter2").unwrap();

        let outcome = resolver_for(&dir).resolve(&file).await;
        assert_eq!(outcome.code(), 403);
    }

    #[tokio::test]
    async fn first_default_page_in_list_order_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("default.html"), "b").unwrap();
        std::fs::write(dir.path().join("default.htm"), "c").unwrap();

        // index.html and index.htm are absent; default.html is earlier in
        // the configured order than default.htm.
        let outcome = resolver_for(&dir).resolve(dir.path()).await;
        assert_eq!(outcome.code(), 200);
        assert_eq!(
            outcome.resolved_path(),
            Some(dir.path().join("default.html").as_path())
        );
    }

    #[tokio::test]
    async fn directory_without_default_page_is_not_found() {
        let dir = TempDir::new().unwrap();
        let outcome = resolver_for(&dir).resolve(dir.path()).await;
        assert_eq!(outcome.code(), 404);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_parent_default_page() {
        // A missing file and an existing directory take the same fallback
        // route into default-page resolution — surprising, but preserved:
        // directory-index semantics rely on it.
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "index").unwrap();

        let outcome = resolver_for(&dir)
            .resolve(&dir.path().join("no-such-file.txt"))
            .await;
        assert_eq!(outcome.code(), 200);
        assert_eq!(
            outcome.resolved_path(),
            Some(dir.path().join("index.html").as_path())
        );
    }

    #[tokio::test]
    async fn missing_file_without_default_page_is_not_found() {
        let dir = TempDir::new().unwrap();
        let outcome = resolver_for(&dir)
            .resolve(&dir.path().join("missing.txt"))
            .await;
        assert_eq!(outcome.code(), 404);
    }

    #[tokio::test]
    async fn resolution_is_idempotent_on_stable_state() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").unwrap();
        let resolver = resolver_for(&dir);

        let first = resolver.resolve(&file).await;
        let second = resolver.resolve(&file).await;
        assert_eq!(first.code(), second.code());
        assert_eq!(first.resolved_path(), second.resolved_path());
    }
}
