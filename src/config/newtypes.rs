//! Validated newtype wrappers for configuration values.

use crate::error::ConfigError;
use std::fmt;

/// A validated absolute `http`/`https` base URL.
///
/// Trailing slashes are removed so that relative request paths can be
/// joined without producing `//`.
///
/// # Example
///
/// ```rust
/// use request_layer::BaseUrl;
///
/// let url = BaseUrl::new("https://api.example.com/v1/").unwrap();
/// assert_eq!(url.as_ref(), "https://api.example.com/v1");
/// assert_eq!(url.scheme(), "https");
/// assert_eq!(url.host_name(), "api.example.com");
/// assert_eq!(url.resolve("/users"), "https://api.example.com/v1/users");
/// assert_eq!(url.resolve("https://other.example.com/x"), "https://other.example.com/x");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseUrl {
    url: String,
    scheme_end: usize,
    host_start: usize,
    host_end: usize,
}

impl BaseUrl {
    /// Creates a new validated base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the URL has no `http` or
    /// `https` scheme, has no host, or contains whitespace.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let url = url.trim().trim_end_matches('/').to_string();
        let invalid = || ConfigError::InvalidBaseUrl { url: url.clone() };

        if url.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let scheme_end = url.find("://").ok_or_else(invalid)?;
        let scheme = url[..scheme_end].to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(invalid());
        }

        let host_start = scheme_end + 3;
        let remainder = &url[host_start..];
        let host_end = remainder
            .find([':', '/', '?', '#'])
            .map_or(url.len(), |i| host_start + i);
        if host_end == host_start {
            return Err(invalid());
        }

        Ok(Self {
            url,
            scheme_end,
            host_start,
            host_end,
        })
    }

    /// Returns the URL scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.url[..self.scheme_end]
    }

    /// Returns the host name.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.url[self.host_start..self.host_end]
    }

    /// Resolves a request URL against this base.
    ///
    /// Absolute `http(s)` URLs are returned unchanged.
    #[must_use]
    pub fn resolve(&self, path: &str) -> String {
        let lower = path.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return path.to_string();
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return self.url.clone();
        }
        format!("{}/{path}", self.url)
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_accepts_http_and_https() {
        assert!(BaseUrl::new("http://localhost:3000/api").is_ok());
        assert!(BaseUrl::new("https://api.example.com").is_ok());
        assert!(BaseUrl::new("HTTPS://API.EXAMPLE.COM").is_ok());
    }

    #[test]
    fn test_base_url_rejects_invalid_values() {
        for url in ["", "api.example.com", "ftp://files.example.com", "https://", "https:///path", "https://exa mple.com"] {
            assert!(
                matches!(BaseUrl::new(url), Err(ConfigError::InvalidBaseUrl { .. })),
                "Expected {url:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_base_url_parts() {
        let url = BaseUrl::new("http://localhost:3000/api/").unwrap();
        assert_eq!(url.as_ref(), "http://localhost:3000/api");
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_name(), "localhost");
    }

    #[test]
    fn test_resolve_joins_relative_paths() {
        let url = BaseUrl::new("https://api.example.com/v3").unwrap();
        assert_eq!(url.resolve("users"), "https://api.example.com/v3/users");
        assert_eq!(url.resolve("/users"), "https://api.example.com/v3/users");
        assert_eq!(url.resolve(""), "https://api.example.com/v3");
        assert_eq!(
            url.resolve("http://elsewhere.test/ping"),
            "http://elsewhere.test/ping"
        );
    }
}
