use std::fmt;

use crate::request::{CacheMode, Request, Response, ResponseSource};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a request could not be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure (DNS, connect, reset, timeout).
    Network(String),
    /// Pre-cache fetch returned a non-2xx status.
    BadStatus { url: String, status: u16 },
    /// Cache-only lookup missed.
    NoCacheAvailable,
    InvalidUrl(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "network error: {msg}"),
            FetchError::BadStatus { url, status } => {
                write!(f, "bad response status {status} for {url}")
            }
            FetchError::NoCacheAvailable => write!(f, "no cache available"),
            FetchError::InvalidUrl(msg) => write!(f, "invalid url: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Network side of the gateway.
///
/// A non-2xx answer is still `Ok`; only transport failures are errors.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, req: &Request) -> Result<Response, FetchError>;
}

/// reqwest-backed fetcher.
///
/// The client keeps no cookie jar, so every request already behaves as
/// `credentials: omit`. `mode` has no meaning outside a browser and is ignored.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, req: &Request) -> Result<Response, FetchError> {
        let mut builder = self.http.request(req.method.clone(), req.url.clone());
        if req.cache == CacheMode::Reload {
            builder = builder
                .header("cache-control", "no-cache")
                .header("pragma", "no-cache");
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
            .to_vec();

        Ok(Response {
            status,
            headers,
            body,
            source: ResponseSource::Network,
        })
    }
}
