//! Command handler modules for adm-cli.
//!
//! Shared config and connection helpers live here.

pub mod gateway;
pub mod orders;

use adm_config::{
    report_unused_keys, secrets::resolve_secrets, AdminConfig, ConfigConsumer, LoadedConfig,
    UnusedKeyPolicy,
};
use anyhow::Result;
use sqlx::PgPool;
use tracing::warn;

/// Load layered config, or built-in defaults when no paths are given.
pub fn load_config(paths: &[String]) -> Result<(LoadedConfig, AdminConfig)> {
    let loaded = if paths.is_empty() {
        adm_config::load_defaults()?
    } else {
        let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        adm_config::load_layered_yaml(&path_refs)?
    };

    let report = report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &report.unused_leaf_pointers {
        warn!(key = %key, "unused config key");
    }

    let cfg = loaded.typed()?;
    Ok((loaded, cfg))
}

/// Connect using the database URL from the env var the config names.
pub async fn connect(loaded: &LoadedConfig, cfg: &AdminConfig) -> Result<PgPool> {
    let secrets = resolve_secrets(&loaded.config_json);
    let url = secrets.require_database_url()?;
    adm_db::connect(url, cfg.database.max_connections).await
}
