//! File Serving Module
//!
//! Ties the cache, the freshness check, the streaming pipeline and the
//! watcher together into the single "serve this file" outcome.
//!
//! ```text
//! request ─▶ resolve ─▶ cache hit? ─yes─▶ 304 | segmented cached body
//!                          │no
//!                          ▼
//!                   stat ─▶ 304 | pipeline (tee fills cache) + watch
//! ```

use std::io;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::cache::ByteCache;
use crate::config::Config;
use crate::delivery::cached_response;
use crate::error::{ConfigError, Result, ServeError};
use crate::files::{self, cache_key};
use crate::freshness::{http_date, Freshness, FreshnessChecker};
use crate::pipeline::{
    self, accepts_gzip, response_channel, CacheFill, PipelineError, Tee, Transforms,
    CHANNEL_DEPTH,
};
use crate::tasks::FileWatchInvalidator;

/// Serves files from one root directory through one cache.
#[derive(Debug)]
pub struct FileServer {
    root: PathBuf,
    mount: String,
    caching: bool,
    cache: ByteCache,
    freshness: FreshnessChecker,
    invalidator: Option<FileWatchInvalidator>,
    cache_control: HeaderValue,
    extra_headers: Vec<(header::HeaderName, HeaderValue)>,
    gzip: bool,
    minify: bool,
    hidden: bool,
    subdirs: bool,
    not_found_page: Option<PathBuf>,
}

impl FileServer {
    /// Builds a server for `config.root`, which must be an existing directory.
    pub fn new(config: &Config, cache: ByteCache) -> std::result::Result<Self, ConfigError> {
        let root = std::fs::canonicalize(&config.root).map_err(|source| ConfigError::Root {
            path: config.root.display().to_string(),
            source,
        })?;
        if !root.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "STATIC_ROOT '{}' is not a directory",
                root.display()
            )));
        }

        let cache_control = HeaderValue::from_str(&config.cache_control())
            .map_err(|_| ConfigError::Invalid("Unrepresentable Cache-Control".to_string()))?;

        let not_found_page = config
            .not_found_page
            .as_ref()
            .map(|page| {
                std::fs::canonicalize(page).map_err(|e| {
                    ConfigError::Invalid(format!("NOT_FOUND_PAGE '{}': {}", page.display(), e))
                })
            })
            .transpose()?;

        Ok(Self {
            root,
            mount: config.mount.clone(),
            caching: config.cache_enabled && !cache.config().is_disabled(),
            cache,
            freshness: FreshnessChecker::new(config.max_age),
            invalidator: None,
            cache_control,
            extra_headers: config.headers.clone(),
            gzip: config.gzip,
            minify: config.minify,
            hidden: config.hidden,
            subdirs: config.subdirs,
            not_found_page,
        })
    }

    /// Registers freshly read files with `invalidator`.
    pub fn with_invalidator(mut self, invalidator: FileWatchInvalidator) -> Self {
        self.invalidator = Some(invalidator);
        self
    }

    /// Canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &ByteCache {
        &self.cache
    }

    // == Serve ==
    /// Answers one request for `uri_path`.
    ///
    /// A configured not-found page replaces the body of every 404.
    pub async fn serve(&self, method: &Method, uri_path: &str, request: &HeaderMap) -> Result<Response> {
        match self.serve_file(method, uri_path, request).await {
            Err(ServeError::NotFound(requested)) => match &self.not_found_page {
                Some(page) => match not_found_response(page, *method == Method::HEAD).await {
                    Some(response) => Ok(response),
                    None => Err(ServeError::NotFound(requested)),
                },
                None => Err(ServeError::NotFound(requested)),
            },
            other => other,
        }
    }

    async fn serve_file(&self, method: &Method, uri_path: &str, request: &HeaderMap) -> Result<Response> {
        let head_only = match *method {
            Method::GET => false,
            Method::HEAD => true,
            _ => return Err(ServeError::MethodNotAllowed(method.to_string())),
        };

        let path = files::resolve(&self.root, &self.mount, uri_path, self.hidden)?;
        if !self.subdirs && !self.is_top_level(&path) {
            return Err(ServeError::Forbidden(uri_path.to_string()));
        }

        let key = cache_key(&path);
        let client_gzip = accepts_gzip(
            request
                .get(header::ACCEPT_ENCODING)
                .and_then(|v| v.to_str().ok()),
        );

        // A gzip body this client cannot decode is skipped, and the fresh
        // read it gets instead must not overwrite the cached one.
        let mut fill = self.caching;
        if self.caching {
            if let Some(entry) = self.cache.get(&key).await {
                if entry.is_gzip() && !client_gzip {
                    debug!(key = %key, "Cached body is gzip, client refuses it");
                    fill = false;
                } else {
                    if let Some(last_modified) = entry.last_modified() {
                        if self.freshness.check_request(last_modified, request) == Freshness::Fresh {
                            return Ok(not_modified());
                        }
                    }
                    debug!(key = %key, len = entry.len(), "Cache hit");
                    let threshold = self.cache.config().segment_threshold;
                    return Ok(cached_response(entry, threshold, head_only));
                }
            }
        }

        self.serve_from_disk(&path, key, request, client_gzip, head_only, fill)
            .await
            .map_err(|e| as_requested(e, uri_path))
    }

    /// Whether `path` sits directly in the root directory.
    fn is_top_level(&self, path: &Path) -> bool {
        path.strip_prefix(&self.root)
            .map(|relative| relative.components().count() <= 1)
            .unwrap_or(false)
    }

    async fn serve_from_disk(
        &self,
        path: &Path,
        key: String,
        request: &HeaderMap,
        client_gzip: bool,
        head_only: bool,
        fill: bool,
    ) -> Result<Response> {
        let meta = files::stat(path).await?;
        let last_modified = http_date(meta.modified);

        if self.freshness.check_request(&last_modified, request) == Freshness::Fresh {
            return Ok(not_modified());
        }

        let content_type = files::content_type(path);
        let transforms = Transforms::plan(path, &content_type, self.minify, self.gzip, client_gzip);
        let mut headers = self.response_headers(&content_type, &last_modified, &transforms)?;

        if head_only {
            if transforms.is_identity() {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.len));
            }
            let mut response = (StatusCode::OK, Body::empty()).into_response();
            *response.headers_mut() = headers;
            return Ok(response);
        }

        let source = files::open(path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ServeError::NotFound(path.display().to_string()),
            _ => ServeError::Stream(e),
        })?;

        // An untransformed body keeps the file's size, so an oversized file
        // is known up front
        let fill = fill && !(transforms.is_identity() && meta.len > self.cache.config().max_bytes as u64);

        let tee = if fill {
            let mut cache_fill = CacheFill::new(self.cache.clone(), key, headers.clone());
            if let Some(invalidator) = &self.invalidator {
                cache_fill = cache_fill.watching(invalidator.clone(), path.to_path_buf());
            }
            Tee::filling(cache_fill)
        } else {
            Tee::passthrough()
        };

        debug!(
            path = %path.display(),
            minify = transforms.minify.is_some(),
            gzip = transforms.gzip,
            fill,
            "Cache miss, streaming from disk"
        );

        let (writer, pending) = response_channel(CHANNEL_DEPTH);
        let body = transforms.apply(source);
        let file = path.display().to_string();
        tokio::spawn(async move {
            match pipeline::run(body, writer, headers, tee).await {
                Ok(sent) => debug!(path = %file, sent, "Stream complete"),
                Err(PipelineError::SinkClosed) => {
                    debug!(path = %file, "Client went away, cache fill skipped")
                }
                Err(PipelineError::Stream(e)) => warn!(path = %file, "Stream failed: {}", e),
            }
        });

        Ok(pending.into_response(StatusCode::OK).await)
    }

    fn response_headers(
        &self,
        content_type: &str,
        last_modified: &str,
        transforms: &Transforms,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header_value(content_type)?);
        headers.insert(header::LAST_MODIFIED, header_value(last_modified)?);
        headers.insert(header::CACHE_CONTROL, self.cache_control.clone());

        if transforms.gzip {
            headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }
        if self.gzip && files::is_compressible(content_type) {
            headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
        }
        for (name, value) in &self.extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| ServeError::Internal(format!("Bad header value '{}'", value)))
}

/// Reports a missing file under the path the client asked for.
fn as_requested(error: ServeError, uri_path: &str) -> ServeError {
    match error {
        ServeError::NotFound(_) => ServeError::NotFound(uri_path.to_string()),
        other => other,
    }
}

/// The configured not-found page with a 404 status, or None if it cannot be read.
async fn not_found_response(page: &Path, head_only: bool) -> Option<Response> {
    let data = match tokio::fs::read(page).await {
        Ok(data) => data,
        Err(e) => {
            warn!(page = %page.display(), "Cannot read not-found page: {}", e);
            return None;
        }
    };

    let content_type = HeaderValue::from_str(&files::content_type(page)).ok()?;
    let length = HeaderValue::from(data.len());
    let body = if head_only { Body::empty() } else { Body::from(data) };

    let mut response = (StatusCode::NOT_FOUND, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, length);
    Some(response)
}

/// A 304 with no body and no headers.
fn not_modified() -> Response {
    StatusCode::NOT_MODIFIED.into_response()
}
