//! URL classification and strategy selection. No I/O.

use adm_config::GatewayConfig;
use serde::{Deserialize, Serialize};

use crate::request::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// App shell pages and CDN bundles.
    Critical,
    /// Document-database API traffic.
    Api,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    CacheOnly,
    NetworkOnly,
}

impl ResourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Critical => "critical",
            ResourceClass::Api => "api",
            ResourceClass::Static => "static",
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            ResourceClass::Critical => Strategy::CacheFirst,
            ResourceClass::Api => Strategy::NetworkFirst,
            ResourceClass::Static => Strategy::CacheFirst,
        }
    }
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::CacheOnly => "cache-only",
            Strategy::NetworkOnly => "network-only",
        }
    }
}

/// Classify `url`. API hosts win over CDN hosts; host matching is by
/// substring, so `www.gstatic.com` matches `gstatic.com`.
pub fn classify(cfg: &GatewayConfig, url: &Url) -> ResourceClass {
    let host = url.host_str().unwrap_or("");
    let path = url.path();

    if cfg.api_hosts.iter().any(|h| host.contains(h.as_str())) {
        return ResourceClass::Api;
    }
    if cfg.cdn_hosts.iter().any(|h| host.contains(h.as_str())) {
        return ResourceClass::Critical;
    }
    if path.ends_with(".html") || path == "/" {
        return ResourceClass::Critical;
    }
    ResourceClass::Static
}
