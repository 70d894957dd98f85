//! Request and response snapshots passed through the gateway.

pub use reqwest::{Method, Url};

use crate::fetch::FetchError;

/// HTTP cache mode of an outgoing fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Bypass any intermediate HTTP cache.
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    SameOrigin,
    Cors,
    NoCors,
    Navigate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    #[default]
    SameOrigin,
    Omit,
    Include,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub cache: CacheMode,
    pub mode: RequestMode,
    pub credentials: Credentials,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            cache: CacheMode::Default,
            mode: RequestMode::default(),
            credentials: Credentials::default(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parse `raw` as an absolute URL, or resolve it against `base`.
    pub fn parse(method: Method, raw: &str, base: &Url) -> Result<Self, FetchError> {
        let url = Url::parse(raw)
            .or_else(|_| base.join(raw))
            .map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
        Ok(Self::new(method, url))
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Cache key. Only GET is ever stored, so the URL alone identifies it.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

/// Where a [`Response`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
        }
    }
}

/// Fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            source: ResponseSource::Network,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_urls_resolve_against_base() {
        let base = Url::parse("http://localhost:8080").unwrap();
        let r = Request::parse(Method::GET, "/admin.html", &base).unwrap();
        assert_eq!(r.url.as_str(), "http://localhost:8080/admin.html");

        let abs = Request::parse(Method::GET, "https://cdn.jsdelivr.net/npm/flatpickr", &base).unwrap();
        assert_eq!(abs.url.host_str(), Some("cdn.jsdelivr.net"));
    }

    #[test]
    fn ok_is_2xx_only() {
        assert!(Response::new(200, "").ok());
        assert!(Response::new(204, "").ok());
        assert!(!Response::new(304, "").ok());
        assert!(!Response::new(404, "").ok());
    }
}
