//! Upstream origin identity and resource path normalization.

use crate::error::{ProxyError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use url::Url;

/// Matches library resource requests, capturing the origin-relative path.
static RESOURCE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/((?:test-)?resources/.*)").expect("valid resource regex"));

/// Matches requests eligible for the local library override.
static OVERRIDE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/resources/(.*)").expect("valid override regex"));

/// Matches a semantic version path segment such as `1.120.0`.
static VERSION_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("valid version regex"));

/// Identity of the upstream origin: host plus optional library version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    base: String,
    host: String,
    version: Option<String>,
}

impl Origin {
    /// Parses an origin URL such as `https://ui5.sap.com/1.120.0`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOrigin` if the URL cannot be parsed, is not http(s)
    /// or has no host.
    pub fn parse(origin: &str) -> Result<Self> {
        let url = Url::parse(origin).map_err(|e| ProxyError::InvalidOrigin {
            url: origin.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidOrigin {
                url: origin.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ProxyError::InvalidOrigin {
                    url: origin.to_string(),
                    reason: "missing host".to_string(),
                });
            }
        };

        let version = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| VERSION_SEGMENT.is_match(s)).last())
            .map(str::to_string);

        Ok(Self {
            base: origin.trim_end_matches('/').to_string(),
            host,
            version,
        })
    }

    /// Host name, including the port when one is given.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Library version carried by the origin URL, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Cache root for this origin: `<cache>/<host>/<version-or-empty>`.
    #[must_use]
    pub fn cache_root(&self, cache: &Path) -> PathBuf {
        let root = cache.join(&self.host);
        match &self.version {
            Some(version) => root.join(version),
            None => root,
        }
    }

    /// Full upstream URL for an origin-relative resource path.
    #[must_use]
    pub fn resource_url(&self, resource_path: &str) -> String {
        format!("{}/{}", self.base, resource_path.trim_start_matches('/'))
    }
}

/// Extracts the origin-relative resource path (query included) from a
/// request path, or `None` when the request is not a library resource.
#[must_use]
pub fn resource_path(request_path: &str) -> Option<&str> {
    RESOURCE_PATH
        .captures(request_path)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Extracts the path below `/resources/` used to look up local overrides.
#[must_use]
pub fn override_path(request_path: &str) -> Option<String> {
    OVERRIDE_PATH
        .captures(request_path)
        .and_then(|captures| captures.get(1))
        .and_then(|m| normalize(m.as_str()))
}

/// Normalizes a resource path into the key shared by the in-flight map,
/// the uncachable set and the cache file layout.
///
/// Query string and fragment are stripped and the remainder is
/// percent-decoded. Returns `None` for paths that cannot safely map onto the
/// file system (parent segments, absolute paths, invalid UTF-8).
#[must_use]
pub fn normalize(resource_path: &str) -> Option<String> {
    let end = resource_path.find(['?', '#']).unwrap_or(resource_path.len());
    let decoded = urlencoding::decode(&resource_path[..end]).ok()?;

    if decoded.is_empty()
        || decoded.starts_with('/')
        || decoded.contains('\\')
        || decoded.split('/').any(|segment| segment == "..")
    {
        return None;
    }

    Some(decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_without_version() {
        let origin = Origin::parse("https://ui5.sap.com").unwrap();
        assert_eq!(origin.host(), "ui5.sap.com");
        assert_eq!(origin.version(), None);
        assert_eq!(
            origin.cache_root(Path::new("/cache")),
            PathBuf::from("/cache/ui5.sap.com")
        );
    }

    #[test]
    fn origin_with_version_and_port() {
        let origin = Origin::parse("http://localhost:8080/1.120.0/").unwrap();
        assert_eq!(origin.host(), "localhost:8080");
        assert_eq!(origin.version(), Some("1.120.0"));
        assert_eq!(
            origin.cache_root(Path::new("cache")),
            PathBuf::from("cache/localhost:8080/1.120.0")
        );
        assert_eq!(
            origin.resource_url("resources/sap-ui-core.js"),
            "http://localhost:8080/1.120.0/resources/sap-ui-core.js"
        );
    }

    #[test]
    fn invalid_origin_is_rejected() {
        assert!(matches!(
            Origin::parse("not a url"),
            Err(ProxyError::InvalidOrigin { .. })
        ));
        assert!(matches!(
            Origin::parse("ftp://ui5.sap.com"),
            Err(ProxyError::InvalidOrigin { .. })
        ));
    }

    #[test]
    fn resource_paths_are_matched_anywhere() {
        assert_eq!(
            resource_path("/resources/sap-ui-core.js"),
            Some("resources/sap-ui-core.js")
        );
        assert_eq!(
            resource_path("/app/test-resources/sap/ui/qunit/qunit.css?v=1"),
            Some("test-resources/sap/ui/qunit/qunit.css?v=1")
        );
        assert_eq!(resource_path("/index.html"), None);
    }

    #[test]
    fn override_path_strips_resources_prefix() {
        assert_eq!(
            override_path("/resources/sap/m/library.js?x"),
            Some("sap/m/library.js".to_string())
        );
        assert_eq!(override_path("/test-resources/a.js"), None);
    }

    #[test]
    fn normalize_strips_query_and_fragment() {
        assert_eq!(
            normalize("resources/a.js?sap-ui-debug=true#top"),
            Some("resources/a.js".to_string())
        );
        assert_eq!(
            normalize("resources/my%20lib.js"),
            Some("resources/my lib.js".to_string())
        );
    }

    #[test]
    fn normalize_rejects_traversal() {
        assert_eq!(normalize("resources/../../etc/passwd"), None);
        assert_eq!(normalize("resources/%2E%2E/secret"), None);
        assert_eq!(normalize("?only-query"), None);
    }
}
