//! Request and response model
//!
//! Only what the offline cache needs: a method, a URL and headers on the
//! way out; status, headers and body on the way back. Cached entries are
//! keyed by method + URL; [`resolve_url`] turns paths into absolute URLs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET request
    Get,
    /// HEAD request
    Head,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// PATCH request
    Patch,
    /// DELETE request
    Delete,
    /// OPTIONS request
    Options,
}

impl Method {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }

    /// Whether responses to this method may be stored in the cache
    pub fn is_read_only(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Absolute URL or a path relative to the fetcher's base URL
    pub url: String,
    /// Request headers
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Request body
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Create a request
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), headers: Vec::new(), body: None }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Identity used to match cached entries: method and URL
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// Absolute URL for `url`, resolving paths against `base`
///
/// Absolute `http`/`https` URLs are returned unchanged. A base with or
/// without a trailing slash resolves the same way.
pub fn resolve_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }

    let base = base.trim_end_matches('/');
    if url.starts_with('/') {
        format!("{}{}", base, url)
    } else {
        format!("{}/{}", base, url)
    }
}

/// Captured response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers, in received order
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Response body
    #[serde(default)]
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Whether the status is exactly 200
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// First header value with the given name, compared case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
