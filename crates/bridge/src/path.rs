//! Filesystem paths and pvfs URIs
//!
//! A path is either fully qualified (`scheme://authority/path`) or a bare
//! absolute/relative path that is qualified against a filesystem's URI and
//! working directory.
//!
//! pvfs URI format: `pvfs://<connection-name>/<path>`

use std::fmt;

use url::Url;

use crate::error::{BridgeError, Result};

/// Scheme advertised by the delegating filesystem
pub const PVFS_SCHEME: &str = "pvfs";

/// Path separator
pub const SEPARATOR: &str = "/";

/// Whether a scheme names a pvfs URI (case-insensitive prefix match)
pub fn is_pvfs_scheme(scheme: &str) -> bool {
    scheme
        .get(..PVFS_SCHEME.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(PVFS_SCHEME))
}

/// Parse a URI string, mapping failures to a malformed-URI error
pub fn parse_uri(uri: &str) -> Result<Url> {
    Url::parse(uri).map_err(|e| BridgeError::malformed(uri, e.to_string()))
}

/// Build `scheme://authority<path>`
pub fn build_uri(scheme: &str, authority: &str, path: &str) -> Result<Url> {
    let path = if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    parse_uri(&format!("{scheme}://{authority}{path}"))
}

/// Host and optional port of a URI
pub fn authority(uri: &Url) -> Option<String> {
    let host = uri.host_str().filter(|h| !h.is_empty())?;
    Some(match uri.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Filesystem path, optionally qualified with a scheme and authority
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsPath {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
}

impl FsPath {
    /// Parse a path string; anything containing `://` is treated as a URI
    pub fn parse(s: &str) -> Result<Self> {
        if s.contains("://") {
            return Ok(Self::from_url(&parse_uri(s)?));
        }
        if s.is_empty() {
            return Err(BridgeError::malformed(s, "empty path"));
        }
        Ok(Self {
            scheme: None,
            authority: None,
            path: normalize(s),
        })
    }

    pub fn from_url(url: &Url) -> Self {
        let path = if url.path().is_empty() {
            SEPARATOR.to_string()
        } else {
            url.path().to_string()
        };
        Self {
            scheme: Some(url.scheme().to_string()),
            authority: authority(url),
            path,
        }
    }

    /// Convert to a URI; unqualified paths cannot be converted
    pub fn to_url(&self) -> Result<Url> {
        let scheme = self
            .scheme
            .as_deref()
            .ok_or_else(|| BridgeError::malformed(self.to_string(), "path has no scheme"))?;
        build_uri(scheme, self.authority.as_deref().unwrap_or_default(), &self.path)
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Path component (always starts with `/` when absolute)
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_absolute(&self) -> bool {
        self.path.starts_with('/')
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Child path with the same scheme and authority
    #[must_use]
    pub fn join(&self, child: &str) -> Self {
        let base = self.path.trim_end_matches('/');
        Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path: format!("{base}/{}", child.trim_start_matches('/')),
        }
    }

    /// Same path re-rooted under another scheme and authority
    #[must_use]
    pub fn with_root(&self, scheme: &str, authority: Option<&str>) -> Self {
        Self {
            scheme: Some(scheme.to_string()),
            authority: authority.map(String::from),
            path: self.path.clone(),
        }
    }

    /// Fill in missing scheme/authority from `default_uri` and resolve relative
    /// paths against `working_dir`
    #[must_use]
    pub fn make_qualified(&self, default_uri: &Url, working_dir: &Self) -> Self {
        if self.scheme.is_some() && self.authority.is_some() && self.is_absolute() {
            return self.clone();
        }

        let path = if self.is_absolute() {
            self.path.clone()
        } else {
            working_dir.join(&self.path).path
        };

        Self {
            scheme: self
                .scheme
                .clone()
                .or_else(|| Some(default_uri.scheme().to_string())),
            authority: self.authority.clone().or_else(|| authority(default_uri)),
            path,
        }
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{scheme}://{}", self.authority.as_deref().unwrap_or_default())?;
        }
        f.write_str(&self.path)
    }
}

impl From<Url> for FsPath {
    fn from(url: Url) -> Self {
        Self::from_url(&url)
    }
}

impl From<&Url> for FsPath {
    fn from(url: &Url) -> Self {
        Self::from_url(url)
    }
}

/// Collapse duplicate separators and drop a trailing one
fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let joined = path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pvfs_scheme() {
        assert!(is_pvfs_scheme("pvfs"));
        assert!(is_pvfs_scheme("PVFS"));
        assert!(is_pvfs_scheme("pvfsx"));
        assert!(!is_pvfs_scheme("pv"));
        assert!(!is_pvfs_scheme("s3a"));
    }

    #[test]
    fn test_parse_uri_path() {
        let path = FsPath::parse("pvfs://prod/bucket1/dir/file.csv").unwrap();
        assert_eq!(path.scheme(), Some("pvfs"));
        assert_eq!(path.authority(), Some("prod"));
        assert_eq!(path.path(), "/bucket1/dir/file.csv");
        assert_eq!(path.name(), "file.csv");
        assert_eq!(path.to_string(), "pvfs://prod/bucket1/dir/file.csv");
    }

    #[test]
    fn test_parse_uri_lowercases_scheme() {
        let path = FsPath::parse("PVFS://prod/a").unwrap();
        assert_eq!(path.scheme(), Some("pvfs"));
    }

    #[test]
    fn test_parse_bare_paths() {
        let abs = FsPath::parse("/a//b/").unwrap();
        assert_eq!(abs.path(), "/a/b");
        assert!(abs.is_absolute());
        assert!(abs.to_url().is_err());

        let rel = FsPath::parse("c/d").unwrap();
        assert!(!rel.is_absolute());
        assert!(FsPath::parse("").is_err());
    }

    #[test]
    fn test_authority_with_port() {
        let path = FsPath::parse("hdfs://namenode:8020/tmp").unwrap();
        assert_eq!(path.authority(), Some("namenode:8020"));
        assert_eq!(path.to_url().unwrap().as_str(), "hdfs://namenode:8020/tmp");
    }

    #[test]
    fn test_make_qualified() {
        let uri = Url::parse("s3a://bucket").unwrap();
        let wd = FsPath::parse("s3a://bucket/home").unwrap();

        let rel = FsPath::parse("data/x.csv").unwrap();
        assert_eq!(
            rel.make_qualified(&uri, &wd).to_string(),
            "s3a://bucket/home/data/x.csv"
        );

        let abs = FsPath::parse("/x").unwrap();
        assert_eq!(abs.make_qualified(&uri, &wd).to_string(), "s3a://bucket/x");

        let full = FsPath::parse("hdfs://nn/x").unwrap();
        assert_eq!(full.make_qualified(&uri, &wd), full);
    }

    #[test]
    fn test_join() {
        let base = FsPath::parse("s3a://b/dir/").unwrap();
        assert_eq!(base.join("f").to_string(), "s3a://b/dir/f");
    }
}
