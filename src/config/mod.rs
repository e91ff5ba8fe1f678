//! Router configuration — immutable after construction.
//!
//! [`RouterConfig`] carries everything the resolution algorithm and the
//! dispatcher need: the base directory, the default-page search order,
//! private-path matchers, the content-type table, sub-router marker
//! filenames, and the compression toggles. Build one with the consuming
//! builder methods and hand it to [`Router::new`](crate::Router::new);
//! after that it is shared read-only across all in-flight requests.
//!
//! # Examples
//!
//! ```
//! use fsroute::config::RouterConfig;
//! use regex::Regex;
//!
//! let config = RouterConfig::new("/srv/www")
//!     .default_pages(["index.html", "default.html"])
//!     .private_directory(Regex::new(r"^\.git$").unwrap())
//!     .gzip(true)
//!     .deflate(false);
//!
//! assert!(config.is_private_directory(".git"));
//! assert_eq!(config.content_type("txt"), Some("text/plain"));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use flate2::Compression;
use regex::Regex;

/// Fallback filenames tried, in order, when a directory is requested.
const DEFAULT_PAGES: &[&str] = &["index.html", "index.htm", "default.html", "default.htm"];

/// Marker filenames that signal a sub-router delegate in a directory.
const DEFAULT_SUB_ROUTERS: &[&str] = &[".router", ".route"];

/// File-name patterns that are never served.
const DEFAULT_PRIVATE_FILES: &[&str] = &[r"(?i)^\.env(\..*)?$", r"^\.ht"];

/// Directory-component patterns that forbid the whole path.
const DEFAULT_PRIVATE_DIRECTORIES: &[&str] = &[r"^\.git$", r"(?i)^node_modules$"];

/// Extension → MIME type table.
const DEFAULT_CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("wasm", "application/wasm"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

/// Tuning knobs for the streaming compressors.
#[derive(Debug, Clone, Copy)]
pub struct CompressionOptions {
    /// zlib compression level, 0 (store) through 9 (best).
    pub level: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl CompressionOptions {
    pub(crate) fn flate2_level(self) -> Compression {
        Compression::new(self.level)
    }
}

/// Immutable configuration for a [`Router`](crate::Router).
///
/// Constructed once via [`RouterConfig::new`] plus the consuming builder
/// methods; never mutated afterwards. All pattern checks and table lookups
/// used by the resolver live here so the resolution algorithm itself stays
/// pure decision logic.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    base_path: PathBuf,
    default_pages: Vec<String>,
    private_files: Vec<Regex>,
    private_directories: Vec<Regex>,
    content_types: HashMap<String, String>,
    sub_router_filenames: Vec<String>,
    separator: Regex,
    gzip_enabled: bool,
    deflate_enabled: bool,
    compression: CompressionOptions,
}

impl RouterConfig {
    /// Creates a configuration rooted at `base_path` with the default
    /// pages, matchers, and content-type table.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            default_pages: DEFAULT_PAGES.iter().map(|s| s.to_string()).collect(),
            private_files: compile_patterns(DEFAULT_PRIVATE_FILES),
            private_directories: compile_patterns(DEFAULT_PRIVATE_DIRECTORIES),
            content_types: DEFAULT_CONTENT_TYPES
                .iter()
                .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
                .collect(),
            sub_router_filenames: DEFAULT_SUB_ROUTERS.iter().map(|s| s.to_string()).collect(),
            // Both separators so Windows-style joins still split into components.
            separator: Regex::new(r"[/\\]").unwrap(),
            gzip_enabled: true,
            deflate_enabled: true,
            compression: CompressionOptions::default(),
        }
    }

    /// Replaces the default-page search order.
    #[must_use]
    pub fn default_pages<I, S>(mut self, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_pages = pages.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a private-file matcher. Filenames matching any such pattern are
    /// always answered with 403, whether or not they exist.
    #[must_use]
    pub fn private_file(mut self, pattern: Regex) -> Self {
        self.private_files.push(pattern);
        self
    }

    /// Adds a private-directory matcher, applied to every component of the
    /// requested path's directory.
    #[must_use]
    pub fn private_directory(mut self, pattern: Regex) -> Self {
        self.private_directories.push(pattern);
        self
    }

    /// Clears the built-in private matchers (both file and directory).
    #[must_use]
    pub fn clear_private_patterns(mut self) -> Self {
        self.private_files.clear();
        self.private_directories.clear();
        self
    }

    /// Adds or overrides a content-type table entry. The extension is
    /// stored without a leading dot.
    #[must_use]
    pub fn content_type_entry(
        mut self,
        extension: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        self.content_types.insert(extension.into(), mime.into());
        self
    }

    /// Replaces the sub-router marker filename list.
    #[must_use]
    pub fn sub_router_filenames<I, S>(mut self, filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_router_filenames = filenames.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the pattern used to split a directory path into components
    /// for private-directory checks.
    #[must_use]
    pub fn separator(mut self, pattern: Regex) -> Self {
        self.separator = pattern;
        self
    }

    /// Enables or disables gzip content-encoding.
    #[must_use]
    pub fn gzip(mut self, enabled: bool) -> Self {
        self.gzip_enabled = enabled;
        self
    }

    /// Enables or disables deflate content-encoding.
    #[must_use]
    pub fn deflate(mut self, enabled: bool) -> Self {
        self.deflate_enabled = enabled;
        self
    }

    /// Sets the compression tuning options.
    #[must_use]
    pub fn compression(mut self, options: CompressionOptions) -> Self {
        self.compression = options;
        self
    }

    /// Returns the root directory all request paths resolve against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the configured default-page filenames, in search order.
    pub fn default_page_names(&self) -> &[String] {
        &self.default_pages
    }

    /// Returns the configured sub-router marker filenames, in search order.
    pub fn sub_router_names(&self) -> &[String] {
        &self.sub_router_filenames
    }

    /// Returns `true` if any private-directory pattern matches `component`.
    pub fn is_private_directory(&self, component: &str) -> bool {
        self.private_directories.iter().any(|p| p.is_match(component))
    }

    /// Returns `true` if any private-file pattern matches `filename`.
    pub fn is_private_file(&self, filename: &str) -> bool {
        self.private_files.iter().any(|p| p.is_match(filename))
    }

    /// Splits a directory path into non-empty components using the
    /// configured separator pattern.
    pub fn split_components<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = &'a str> {
        self.separator.split(dir).filter(|c| !c.is_empty())
    }

    /// Looks up the MIME type for a bare file extension (no leading dot).
    pub fn content_type(&self, extension: &str) -> Option<&str> {
        self.content_types.get(extension).map(String::as_str)
    }

    /// Returns `true` if gzip responses are enabled.
    pub fn gzip_enabled(&self) -> bool {
        self.gzip_enabled
    }

    /// Returns `true` if deflate responses are enabled.
    pub fn deflate_enabled(&self) -> bool {
        self.deflate_enabled
    }

    /// Returns the compression tuning options.
    pub fn compression_options(&self) -> CompressionOptions {
        self.compression
    }

    /// Joins a raw request path onto the base path, dropping empty, `.`,
    /// and `..` segments so the result can never escape the base directory.
    pub fn join_request_path(&self, request_path: &str) -> PathBuf {
        let mut joined = self.base_path.clone();
        for segment in request_path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                continue;
            }
            joined.push(segment);
        }
        joined
    }
}

fn compile_patterns(patterns: &[&str]) -> Vec<Regex> {
    // Built-in patterns are compile-time constants; a failure here is a
    // programming error, not user input.
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
}
