//! Named, versioned caches.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::fetch::{FetchError, Fetcher};
use crate::request::{Method, Request, Response, ResponseSource};

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    response: Response,
}

/// One named cache. Entries keep insertion order; `put` on an existing key
/// replaces the stored response in place (last write wins).
#[derive(Debug, Default)]
pub struct NamedCache {
    entries: RwLock<Vec<Entry>>,
}

impl NamedCache {
    pub async fn match_request(&self, req: &Request) -> Option<Response> {
        if req.method != Method::GET {
            return None;
        }
        self.match_key(req.cache_key()).await
    }

    pub async fn match_key(&self, key: &str) -> Option<Response> {
        let entries = self.entries.read().await;
        entries.iter().find(|e| e.key == key).map(|e| {
            let mut r = e.response.clone();
            r.source = ResponseSource::Cache;
            r
        })
    }

    /// Store `response` for a GET request. Other methods are ignored.
    pub async fn put(&self, req: &Request, response: Response) {
        if req.method != Method::GET {
            return;
        }
        let key = req.cache_key().to_string();
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.key == key) {
            Some(e) => e.response = response,
            None => entries.push(Entry { key, response }),
        }
    }

    /// Fetch every request and store all of them, or none if any fetch fails
    /// or answers non-2xx.
    pub async fn add_all(&self, fetcher: &dyn Fetcher, reqs: &[Request]) -> Result<usize, FetchError> {
        let mut fetched = Vec::with_capacity(reqs.len());
        for req in reqs {
            let resp = fetcher.fetch(req).await?;
            if !resp.ok() {
                return Err(FetchError::BadStatus {
                    url: req.url.to_string(),
                    status: resp.status,
                });
            }
            fetched.push((req, resp));
        }
        for (req, resp) in fetched {
            self.put(req, resp).await;
        }
        Ok(reqs.len())
    }

    pub async fn delete(&self, req: &Request) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.key != req.cache_key());
        entries.len() != before
    }

    /// Keys in insertion order.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.read().await.iter().map(|e| e.key.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Body bytes of the first `limit` entries.
    pub async fn sampled_size(&self, limit: usize) -> u64 {
        self.entries
            .read()
            .await
            .iter()
            .take(limit)
            .map(|e| e.response.body.len() as u64)
            .sum()
    }
}

/// All named caches of one gateway, in creation order.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: RwLock<Vec<(String, Arc<NamedCache>)>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `name`, creating it if needed.
    pub async fn open(&self, name: &str) -> Arc<NamedCache> {
        let mut caches = self.caches.write().await;
        if let Some((_, c)) = caches.iter().find(|(n, _)| n == name) {
            return Arc::clone(c);
        }
        let c = Arc::new(NamedCache::default());
        caches.push((name.to_string(), Arc::clone(&c)));
        c
    }

    pub async fn has(&self, name: &str) -> bool {
        self.caches.read().await.iter().any(|(n, _)| n == name)
    }

    pub async fn delete(&self, name: &str) -> bool {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(n, _)| n != name);
        caches.len() != before
    }

    pub async fn keys(&self) -> Vec<String> {
        self.caches.read().await.iter().map(|(n, _)| n.clone()).collect()
    }
}
