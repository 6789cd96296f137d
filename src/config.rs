//! Configuration Module
//!
//! Handles loading and validating server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};

use crate::error::ConfigError;

// == Cache Config ==
/// Construction-time limits for the byte cache.
///
/// Immutable once a cache has been built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Inactivity duration after which an unaccessed entry is evicted
    pub ttl: Duration,
    /// Hard cap on cached item count (0 disables caching)
    pub max_entries: usize,
    /// Hard cap on total cached bytes (0 disables caching)
    pub max_bytes: usize,
    /// Cached bodies at or above this size are delivered in segments
    pub segment_threshold: usize,
}

impl CacheConfig {
    /// Checks the limits once, before any cache is built from them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::Invalid("CACHE_TTL must be greater than 0".to_string()));
        }
        if self.segment_threshold == 0 {
            return Err(ConfigError::Invalid(
                "SEGMENT_THRESHOLD must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true when no entry could ever be accepted.
    pub fn is_disabled(&self) -> bool {
        self.max_entries == 0 || self.max_bytes == 0
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(900),
            max_entries: 1000,
            max_bytes: 100 * 1024 * 1024,
            segment_threshold: 200 * 1024,
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the files are served from
    pub root: PathBuf,
    /// URL prefix the files are served under
    pub mount: String,
    /// HTTP server port
    pub server_port: u16,
    /// Whether the in-memory cache is used at all
    pub cache_enabled: bool,
    /// Cache limits
    pub cache: CacheConfig,
    /// Client max-age in seconds, 0 disables conditional requests
    pub max_age: u64,
    /// Invalidate cached files when they change on disk
    pub watch_files: bool,
    /// Gzip compressible responses for clients that accept it
    pub gzip: bool,
    /// Minify scripts and stylesheets
    pub minify: bool,
    /// Serve dot-files
    pub hidden: bool,
    /// Serve files below the first directory level
    pub subdirs: bool,
    /// Page sent with every 404 instead of the JSON error
    pub not_found_page: Option<PathBuf>,
    /// Background TTL sweep interval in seconds
    pub sweep_interval: u64,
    /// Static headers added to every file response
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STATIC_ROOT` - Directory to serve (default: `.`)
    /// - `MOUNT_PATH` - URL prefix (default: `/`)
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `CACHE_ENABLED` - Use the in-memory cache (default: true)
    /// - `CACHE_TTL` - Inactivity TTL in seconds (default: 900)
    /// - `CACHE_MAX_ENTRIES` - Maximum cached files (default: 1000)
    /// - `CACHE_MAX_BYTES` - Maximum cached bytes (default: 100 MiB)
    /// - `SEGMENT_THRESHOLD` - Segmented delivery threshold in bytes (default: 200 KiB)
    /// - `MAX_AGE` - Client max-age in seconds (default: 172800)
    /// - `WATCH_FILES` - Invalidate on change (default: true)
    /// - `GZIP` - Enable gzip (default: true)
    /// - `MINIFY` - Minify js/css (default: false)
    /// - `SERVE_HIDDEN` - Serve dot-files (default: false)
    /// - `SERVE_SUBDIRS` - Serve files in subdirectories of the root (default: true)
    /// - `NOT_FOUND_PAGE` - File sent as the body of 404 responses (default: none)
    /// - `SWEEP_INTERVAL` - TTL sweep frequency in seconds (default: 1)
    /// - `EXTRA_HEADERS` - `Name=value;Name2=value2` (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cache = CacheConfig {
            ttl: Duration::from_secs(env_or("CACHE_TTL", defaults.cache.ttl.as_secs())),
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache.max_entries),
            max_bytes: env_or("CACHE_MAX_BYTES", defaults.cache.max_bytes),
            segment_threshold: env_or("SEGMENT_THRESHOLD", defaults.cache.segment_threshold),
        };

        let headers = match env::var("EXTRA_HEADERS") {
            Ok(raw) => parse_headers(&raw)?,
            Err(_) => Vec::new(),
        };

        let config = Self {
            root: env::var("STATIC_ROOT").map(PathBuf::from).unwrap_or(defaults.root),
            mount: env::var("MOUNT_PATH").unwrap_or(defaults.mount),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cache_enabled: env_flag("CACHE_ENABLED", defaults.cache_enabled),
            cache,
            max_age: env_or("MAX_AGE", defaults.max_age),
            watch_files: env_flag("WATCH_FILES", defaults.watch_files),
            gzip: env_flag("GZIP", defaults.gzip),
            minify: env_flag("MINIFY", defaults.minify),
            hidden: env_flag("SERVE_HIDDEN", defaults.hidden),
            subdirs: env_flag("SERVE_SUBDIRS", defaults.subdirs),
            not_found_page: env::var("NOT_FOUND_PAGE").ok().map(PathBuf::from),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            headers,
        };
        config.validate()?;
        Ok(config)
    }

    /// Default configuration serving the given directory.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Validates the whole configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        if !self.mount.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "MOUNT_PATH must start with '/', got '{}'",
                self.mount
            )));
        }
        if self.sweep_interval == 0 {
            return Err(ConfigError::Invalid(
                "SWEEP_INTERVAL must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Value of the `Cache-Control` header for file responses.
    pub fn cache_control(&self) -> String {
        if self.max_age > 0 {
            format!("public, max-age={}, must-revalidate", self.max_age)
        } else {
            "no-store, no-cache, must-revalidate".to_string()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            mount: "/".to_string(),
            server_port: 8080,
            cache_enabled: true,
            cache: CacheConfig::default(),
            max_age: 172_800,
            watch_files: true,
            gzip: true,
            minify: false,
            hidden: false,
            subdirs: true,
            not_found_page: None,
            sweep_interval: 1,
            headers: Vec::new(),
        }
    }
}

// == Helpers ==
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name).ok().as_deref().map(str::trim) {
        Some("1") | Some("true") | Some("yes") | Some("on") => true,
        Some("0") | Some("false") | Some("no") | Some("off") => false,
        _ => default,
    }
}

/// Parses `Name=value;Name2=value2` into header pairs.
pub fn parse_headers(raw: &str) -> Result<Vec<(HeaderName, HeaderValue)>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::Invalid(format!("Malformed header '{}'", pair)))?;
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| ConfigError::Invalid(format!("Invalid header name '{}'", name)))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|_| ConfigError::Invalid(format!("Invalid header value '{}'", value)))?;
            Ok((name, value))
        })
        .collect()
}
