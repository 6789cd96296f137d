//! Filesystem access for served files.
//!
//! Maps request paths onto the root directory and exposes the three things
//! the server needs from the disk: a stat, a lazy byte stream and a content type.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use futures::StreamExt;
use tokio_util::io::ReaderStream;

use crate::error::ServeError;
use crate::pipeline::ByteStream;

/// Read buffer size for file streams.
const READ_CHUNK: usize = 64 * 1024;

/// What a stat tells us about a servable file.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub modified: SystemTime,
    pub len: u64,
}

// == Resolve ==
/// Turns a request path into the canonical file path under `root`.
///
/// `root` must already be canonical. The mount prefix is stripped, the path
/// is percent-decoded, and empty or `.` segments are dropped so equivalent
/// URLs land on one key. `..` segments and, unless `hidden` is set, dot-files
/// are refused.
pub fn resolve(root: &Path, mount: &str, uri_path: &str, hidden: bool) -> Result<PathBuf, ServeError> {
    let decoded = urlencoding::decode(uri_path)
        .map_err(|_| ServeError::NotFound(uri_path.to_string()))?;

    let relative = strip_mount(&decoded, mount)
        .ok_or_else(|| ServeError::NotFound(uri_path.to_string()))?;

    let mut path = root.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(ServeError::Forbidden(uri_path.to_string())),
            s if s.contains('\\') || s.contains('\0') => {
                return Err(ServeError::Forbidden(uri_path.to_string()))
            }
            s if !hidden && s.starts_with('.') => {
                return Err(ServeError::Forbidden(uri_path.to_string()))
            }
            s => path.push(s),
        }
    }

    // A segment like "C:" could still replace the root on some platforms
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        || !path.starts_with(root)
    {
        return Err(ServeError::Forbidden(uri_path.to_string()));
    }

    Ok(path)
}

fn strip_mount<'a>(path: &'a str, mount: &str) -> Option<&'a str> {
    let mount = mount.trim_end_matches('/');
    if mount.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(mount)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Cache key for a resolved path.
pub fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// == Stat ==
/// Stats a path, failing with `NotFound` unless it is a regular file.
pub async fn stat(path: &Path) -> Result<FileMeta, ServeError> {
    let not_found = || ServeError::NotFound(path.display().to_string());

    let meta = tokio::fs::metadata(path).await.map_err(|_| not_found())?;
    if !meta.is_file() {
        return Err(not_found());
    }

    Ok(FileMeta {
        modified: meta.modified()?,
        len: meta.len(),
    })
}

// == Open ==
/// Opens a file as a lazy, single-pass byte stream.
pub async fn open(path: &Path) -> io::Result<ByteStream> {
    let file = tokio::fs::File::open(path).await?;
    Ok(ReaderStream::with_capacity(file, READ_CHUNK).boxed())
}

// == Content Types ==
/// Content type by extension, `application/octet-stream` when unknown.
pub fn content_type(path: &Path) -> String {
    match extension(path).as_deref() {
        Some("js") | Some("mjs") => "text/javascript".to_string(),
        _ => mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

/// Whether a content type is worth compressing.
pub fn is_compressible(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.starts_with("text/")
        || matches!(
            essence.as_str(),
            "application/javascript" | "application/json" | "application/xml" | "image/svg+xml"
        )
}

/// Lowercased file extension.
pub fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/srv/www")
    }

    #[test]
    fn test_resolve_simple_path() {
        let path = resolve(&root(), "/", "/css/site.css", false).unwrap();
        assert_eq!(path, PathBuf::from("/srv/www/css/site.css"));
    }

    #[test]
    fn test_equivalent_urls_share_a_key() {
        let a = resolve(&root(), "/", "/css/site.css", false).unwrap();
        let b = resolve(&root(), "/", "//css/./site.css", false).unwrap();
        let c = resolve(&root(), "/", "/css%2Fsite.css", false).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_percent_decoding() {
        let path = resolve(&root(), "/", "/my%20file.txt", false).unwrap();
        assert_eq!(path, PathBuf::from("/srv/www/my file.txt"));
    }

    #[test]
    fn test_parent_segments_forbidden() {
        assert!(matches!(
            resolve(&root(), "/", "/../etc/passwd", false),
            Err(ServeError::Forbidden(_))
        ));
        assert!(matches!(
            resolve(&root(), "/", "/a/%2e%2e/%2e%2e/etc/passwd", false),
            Err(ServeError::Forbidden(_))
        ));
    }

    #[test]
    fn test_hidden_files() {
        assert!(matches!(
            resolve(&root(), "/", "/.env", false),
            Err(ServeError::Forbidden(_))
        ));
        assert!(matches!(
            resolve(&root(), "/", "/.git/config", false),
            Err(ServeError::Forbidden(_))
        ));
        assert!(resolve(&root(), "/", "/.env", true).is_ok());
    }

    #[test]
    fn test_mount_prefix() {
        let path = resolve(&root(), "/static/", "/static/app.js", false).unwrap();
        assert_eq!(path, PathBuf::from("/srv/www/app.js"));

        assert!(matches!(
            resolve(&root(), "/static", "/other/app.js", false),
            Err(ServeError::NotFound(_))
        ));
        assert!(matches!(
            resolve(&root(), "/static", "/staticfoo/app.js", false),
            Err(ServeError::NotFound(_))
        ));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type(Path::new("a.css")), "text/css");
        assert_eq!(content_type(Path::new("a.html")), "text/html");
        assert_eq!(content_type(Path::new("a.JS")), "text/javascript");
        assert_eq!(content_type(Path::new("a.png")), "image/png");
        assert_eq!(content_type(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_compressible() {
        assert!(is_compressible("text/html"));
        assert!(is_compressible("text/css; charset=utf-8"));
        assert!(is_compressible("application/json"));
        assert!(is_compressible("image/svg+xml"));
        assert!(!is_compressible("image/png"));
        assert!(!is_compressible("application/octet-stream"));
    }

    #[tokio::test]
    async fn test_stat_rejects_directories_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();

        let meta = stat(&dir.path().join("a.txt")).await.unwrap();
        assert_eq!(meta.len, 3);

        assert!(matches!(stat(dir.path()).await, Err(ServeError::NotFound(_))));
        assert!(matches!(
            stat(&dir.path().join("missing")).await,
            Err(ServeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_streams_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(dir.path().join("blob.bin"), &data).unwrap();

        let mut stream = open(&dir.path().join("blob.bin")).await.unwrap();
        let mut read = Vec::new();
        while let Some(chunk) = stream.next().await {
            read.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(read, data);
    }
}
