//! One executor per [`Strategy`] variant.

use std::sync::Arc;

use tracing::debug;

use crate::cache::NamedCache;
use crate::classify::Strategy;
use crate::fetch::FetchError;
use crate::request::{Request, Response};
use crate::Gateway;

impl Gateway {
    /// Answer `req` with `strategy` against the current named cache.
    pub async fn handle_request(
        &self,
        req: &Request,
        strategy: Strategy,
    ) -> Result<Response, FetchError> {
        let cache = self.storage.open(&self.config.cache_name).await;
        match strategy {
            Strategy::CacheFirst => self.cache_first(req, &cache).await,
            Strategy::NetworkFirst => self.network_first(req, &cache).await,
            Strategy::CacheOnly => cache_only(req, &cache).await,
            Strategy::NetworkOnly => self.fetcher.fetch(req).await,
        }
    }

    async fn cache_first(
        &self,
        req: &Request,
        cache: &Arc<NamedCache>,
    ) -> Result<Response, FetchError> {
        if let Some(hit) = cache.match_request(req).await {
            self.refresh_in_background(req, cache);
            return Ok(hit);
        }

        match self.fetcher.fetch(req).await {
            Ok(resp) => {
                if resp.ok() {
                    cache.put(req, resp.clone()).await;
                }
                Ok(resp)
            }
            // Another client may have filled the entry meanwhile.
            Err(e) => cache.match_request(req).await.ok_or(e),
        }
    }

    async fn network_first(
        &self,
        req: &Request,
        cache: &Arc<NamedCache>,
    ) -> Result<Response, FetchError> {
        match self.fetcher.fetch(req).await {
            Ok(resp) => {
                if resp.ok() {
                    cache.put(req, resp.clone()).await;
                }
                Ok(resp)
            }
            Err(e) => {
                debug!(url = %req.url, error = %e, "network-first: falling back to cache");
                cache.match_request(req).await.ok_or(e)
            }
        }
    }

    /// Re-fetch a cache hit, at most once per throttle window per gateway.
    /// Failures are dropped.
    fn refresh_in_background(&self, req: &Request, cache: &Arc<NamedCache>) {
        if !self.take_refresh_slot() {
            return;
        }

        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(cache);
        let req = req.clone();
        tokio::spawn(async move {
            if let Ok(resp) = fetcher.fetch(&req).await {
                if resp.ok() {
                    cache.put(&req, resp).await;
                }
            }
        });
    }
}

async fn cache_only(req: &Request, cache: &NamedCache) -> Result<Response, FetchError> {
    cache
        .match_request(req)
        .await
        .ok_or(FetchError::NoCacheAvailable)
}
