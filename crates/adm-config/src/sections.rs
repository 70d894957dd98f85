//! Typed sections of the merged config document.
//!
//! Every field has a default, so an empty document is a valid config. The
//! defaults reproduce the production deployment: a 30 s sweep, a 30 s
//! pending window, and the `admin-system-v2.3.0` cache.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub transitioner: TransitionerConfig,
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    pub daemon: DaemonConfig,
}

impl AdminConfig {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("config does not match AdminConfig")
    }
}

// ---------------------------------------------------------------------------
// /transitioner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionerConfig {
    /// Sweep period of the schedule trigger.
    pub sweep_interval_secs: u64,
    /// Minimum age before a pending order is moved to processing.
    pub transition_after_ms: i64,
    /// Delay of the one-shot check scheduled on order creation.
    pub one_shot_delay_ms: u64,
    /// History note written by the sweep.
    pub sweep_note: String,
    /// History note written by the order-created one-shot.
    pub created_trigger_note: String,
}

impl Default for TransitionerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            transition_after_ms: 30_000,
            one_shot_delay_ms: 30_000,
            sweep_note: "Automatically updated by system (after 30 seconds)".to_string(),
            created_trigger_note: "Automatically updated by order-created trigger".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// /gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Versioned cache name. Bumping it retires every other named cache on
    /// the next activation.
    pub cache_name: String,
    /// Version reported by GET_CACHE_STATUS.
    pub cache_version: String,
    /// Base URL relative resources resolve against.
    pub origin: String,
    /// Resources pre-cached at install time.
    pub critical_resources: Vec<String>,
    /// Host substrings routed network-first.
    pub api_hosts: Vec<String>,
    /// Host substrings routed cache-first as critical.
    pub cdn_hosts: Vec<String>,
    /// URL schemes never intercepted.
    pub bypass_schemes: Vec<String>,
    /// Minimum gap between background cache refreshes.
    pub refresh_throttle_secs: u64,
    /// Entries sampled when estimating cache size.
    pub size_sample_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_name: "admin-system-v2.3.0".to_string(),
            cache_version: "2.3.0".to_string(),
            origin: "http://localhost:8080".to_string(),
            critical_resources: [
                "/admin.html",
                "/index.html",
                "https://www.gstatic.com/firebasejs/10.8.0/firebase-app-compat.js",
                "https://www.gstatic.com/firebasejs/10.8.0/firebase-firestore-compat.js",
                "https://www.gstatic.com/firebasejs/10.8.0/firebase-storage-compat.js",
                "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.js",
                "https://cdn.jsdelivr.net/npm/flatpickr",
                "https://cdn.jsdelivr.net/npm/flatpickr/dist/flatpickr.min.css",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            api_hosts: vec![
                "firestore.googleapis.com".to_string(),
                "firebase.googleapis.com".to_string(),
            ],
            cdn_hosts: vec!["gstatic.com".to_string(), "jsdelivr.net".to_string()],
            bypass_schemes: vec!["chrome-extension".to_string()],
            refresh_throttle_secs: 60,
            size_sample_limit: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// /database
// ---------------------------------------------------------------------------

/// Holds env var NAMES only; values are resolved by [`crate::secrets`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: "ADM_DATABASE_URL".to_string(),
            max_connections: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// /daemon
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub bind_addr: String,
    pub heartbeat_secs: u64,
    /// Run gateway install (and the activation it triggers) at boot.
    pub install_gateway_on_boot: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8899".to_string(),
            heartbeat_secs: 1,
            install_gateway_on_boot: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = AdminConfig::from_config_json(&json!({})).unwrap();
        assert_eq!(cfg, AdminConfig::default());
        assert_eq!(cfg.transitioner.transition_after_ms, 30_000);
        assert_eq!(cfg.gateway.size_sample_limit, 10);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = AdminConfig::from_config_json(&json!({
            "gateway": { "cache_name": "admin-system-v2.4.0" }
        }))
        .unwrap();
        assert_eq!(cfg.gateway.cache_name, "admin-system-v2.4.0");
        assert_eq!(cfg.gateway.refresh_throttle_secs, 60);
        assert_eq!(cfg.transitioner, TransitionerConfig::default());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = AdminConfig::from_config_json(&json!({
            "transitioner": { "sweep_interval_secs": "thirty" }
        }));
        assert!(err.is_err());
    }
}
