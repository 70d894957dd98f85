//! Offline cache gateway.
//!
//! Sits in front of outgoing fetches. Every intercepted GET is classified
//! ([`classify`]) and answered by one of four strategies against a single
//! versioned named cache. The install/activate lifecycle pre-caches the app
//! shell and retires caches from older versions; a small control channel
//! ([`ControlMessage`]) lets clients force activation, wipe caches, or ask
//! for cache statistics.

mod cache;
mod classify;
mod control;
mod fetch;
mod request;
mod strategy;

pub use cache::{CacheStorage, NamedCache};
pub use classify::{classify, ResourceClass, Strategy};
pub use control::{CacheStatus, ControlEnvelope, ControlMessage, ControlReply};
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use request::{
    CacheMode, Credentials, Method, Request, RequestMode, Response, ResponseSource, Url,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adm_config::GatewayConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Lifecycle of one gateway instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    Activated,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
        }
    }
}

pub struct Gateway {
    config: GatewayConfig,
    origin: Url,
    storage: CacheStorage,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
    /// Last background refresh. Lives and dies with this instance.
    last_refresh: Mutex<Option<Instant>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let origin = Url::parse(&config.origin)
            .with_context(|| format!("invalid gateway origin: {}", config.origin))?;
        Ok(Self {
            config,
            origin,
            storage: CacheStorage::new(),
            fetcher,
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
            last_refresh: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: WorkerState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    /// Parse a request URL, resolving relative paths against the origin.
    pub fn request(&self, method: Method, raw_url: &str) -> Result<Request, FetchError> {
        Request::parse(method, raw_url, &self.origin)
    }

    pub fn classify(&self, url: &Url) -> ResourceClass {
        classify(&self.config, url)
    }

    pub fn strategy_for(&self, url: &Url) -> Strategy {
        self.classify(url).strategy()
    }

    /// Only GET requests on non-bypassed schemes are intercepted.
    pub fn intercepts(&self, req: &Request) -> bool {
        req.method == Method::GET
            && !self
                .config
                .bypass_schemes
                .iter()
                .any(|s| s == req.url.scheme())
    }

    /// Fetch hook. `None` means "not intercepted": the caller does its own
    /// fetch. A failed strategy is logged and retried once as a plain fetch.
    pub async fn on_fetch(&self, req: &Request) -> Option<Result<Response, FetchError>> {
        if !self.intercepts(req) {
            return None;
        }
        let strategy = self.strategy_for(&req.url);
        match self.handle_request(req, strategy).await {
            Ok(resp) => Some(Ok(resp)),
            Err(e) => {
                warn!(url = %req.url, strategy = strategy.as_str(), error = %e, "request handling failed; plain fetch");
                Some(self.fetcher.fetch(req).await)
            }
        }
    }

    /// Plain network fetch, outside any strategy. Used for requests the
    /// gateway does not intercept.
    pub async fn fetch_direct(&self, req: &Request) -> Result<Response, FetchError> {
        self.fetcher.fetch(req).await
    }

    /// Claim the background-refresh slot if the throttle window has passed.
    fn take_refresh_slot(&self) -> bool {
        let now = Instant::now();
        let window = Duration::from_secs(self.config.refresh_throttle_secs);
        let mut last = self.last_refresh.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(prev) = *last {
            if now.duration_since(prev) <= window {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    fn precache_requests(&self) -> Result<Vec<Request>, FetchError> {
        self.config
            .critical_resources
            .iter()
            .map(|raw| -> Result<Request, FetchError> {
                let req = self.request(Method::GET, raw)?.with_cache(CacheMode::Reload);
                Ok(if raw.starts_with('/') {
                    req
                } else {
                    req.with_mode(RequestMode::Cors)
                        .with_credentials(Credentials::Omit)
                })
            })
            .collect()
    }

    /// Pre-cache every critical resource, then skip waiting. On failure the
    /// error is logged and returned; the gateway still ends up installed
    /// (waiting) and nothing is cached.
    pub async fn install(&self) -> Result<usize, FetchError> {
        self.set_state(WorkerState::Installing);
        info!(cache = %self.config.cache_name, "gateway installing");

        let res = match self.precache_requests() {
            Ok(reqs) => {
                let cache = self.storage.open(&self.config.cache_name).await;
                cache.add_all(self.fetcher.as_ref(), &reqs).await
            }
            Err(e) => Err(e),
        };

        self.set_state(WorkerState::Installed);
        match &res {
            Ok(n) => {
                info!(count = n, "critical resources cached");
                self.skip_waiting().await;
            }
            Err(e) => {
                error!(error = %e, "pre-cache failed");
                if self.skip_waiting.load(Ordering::SeqCst) {
                    self.activate().await;
                }
            }
        }
        res
    }

    /// Activate as soon as installation is done.
    pub async fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
        if self.state() == WorkerState::Installed {
            self.activate().await;
        }
    }

    /// Delete every cache except the current one, then claim clients.
    /// Returns the names deleted.
    pub async fn activate(&self) -> Vec<String> {
        self.set_state(WorkerState::Activating);
        let mut deleted = Vec::new();
        for name in self.storage.keys().await {
            if name != self.config.cache_name && self.storage.delete(&name).await {
                info!(cache = %name, "deleted stale cache");
                deleted.push(name);
            }
        }
        self.clients_claimed.store(true, Ordering::SeqCst);
        self.set_state(WorkerState::Activated);
        info!(cache = %self.config.cache_name, "gateway activated");
        deleted
    }

    // -----------------------------------------------------------------------
    // Control channel
    // -----------------------------------------------------------------------

    /// Handle one control message. `GET_CACHE_STATUS` answers on `reply`;
    /// a dropped receiver is ignored.
    pub async fn on_message(&self, msg: ControlMessage, reply: Option<oneshot::Sender<ControlReply>>) {
        match msg {
            ControlMessage::SkipWaiting => self.skip_waiting().await,
            ControlMessage::ClearCache => {
                let n = self.clear_all_caches().await;
                info!(count = n, "all caches cleared");
            }
            ControlMessage::GetCacheStatus => {
                let status = self.cache_status().await;
                if let Some(tx) = reply {
                    let _ = tx.send(ControlReply::CacheStatus(status));
                }
            }
        }
    }

    pub async fn clear_all_caches(&self) -> usize {
        let mut n = 0;
        for name in self.storage.keys().await {
            if self.storage.delete(&name).await {
                n += 1;
            }
        }
        n
    }

    /// Entry count of the current cache plus a size estimate over its first
    /// `size_sample_limit` entries.
    pub async fn cache_status(&self) -> CacheStatus {
        let cache = self.storage.open(&self.config.cache_name).await;
        let bytes = cache.sampled_size(self.config.size_sample_limit).await;
        CacheStatus {
            version: self.config.cache_version.clone(),
            cached_resources_count: cache.len().await,
            cache_size: (bytes as f64 / 1024.0).round() as u64,
        }
    }
}
