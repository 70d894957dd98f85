//! adm-daemon entry point.
//!
//! Thin on purpose: config, tracing, store selection, background tasks,
//! middleware, then the HTTP server. Route handlers live in `routes.rs`;
//! shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use adm_config::{
    load_defaults, load_layered_yaml, report_unused_keys, secrets::resolve_secrets, AdminConfig,
    ConfigConsumer, LoadedConfig, UnusedKeyPolicy,
};
use adm_daemon::{routes, state};
use adm_gateway::{Gateway, HttpFetcher};
use adm_transition::{MemoryOrderStore, OrderStore, PgOrderStore, Transitioner};
use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

/// Comma-separated YAML paths, base first.
const ENV_CONFIG_PATHS: &str = "ADM_CONFIG_PATHS";
const ENV_DAEMON_ADDR: &str = "ADM_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config()?;
    let cfg = loaded.typed()?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let report = report_unused_keys(ConfigConsumer::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &report.unused_leaf_pointers {
        warn!(key = %key, "unused config key");
    }

    let store = open_store(&loaded, &cfg).await?;
    info!(store = store.backend_name(), "order store ready");

    let transitioner = Arc::new(Transitioner::new(store, cfg.transitioner.clone()));
    let gateway = Arc::new(Gateway::new(cfg.gateway.clone(), Arc::new(HttpFetcher::new()))?);
    let shared = Arc::new(state::AppState::new(
        Arc::clone(&transitioner),
        gateway,
        loaded.config_hash.clone(),
    ));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(cfg.daemon.heartbeat_secs.max(1)));
    let sweeper = state::spawn_sweep_loop(
        Arc::clone(&shared),
        Duration::from_secs(cfg.transitioner.sweep_interval_secs.max(1)),
    );
    if cfg.daemon.install_gateway_on_boot {
        state::spawn_gateway_install(Arc::clone(&shared));
    }

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr(&cfg)?;
    info!("adm-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    sweeper.abort();
    transitioner.shutdown();
    info!("adm-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_config() -> anyhow::Result<LoadedConfig> {
    let raw = std::env::var(ENV_CONFIG_PATHS).unwrap_or_default();
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paths.is_empty() {
        info!("{ENV_CONFIG_PATHS} not set; using built-in defaults");
        return load_defaults();
    }
    load_layered_yaml(&paths)
}

/// Postgres when the database URL variable is set, in-memory otherwise.
async fn open_store(loaded: &LoadedConfig, cfg: &AdminConfig) -> anyhow::Result<Arc<dyn OrderStore>> {
    let secrets = resolve_secrets(&loaded.config_json);
    match secrets.database_url.as_deref() {
        Some(url) => {
            let pool = adm_db::connect(url, cfg.database.max_connections).await?;
            adm_db::migrate(&pool).await?;
            Ok(Arc::new(PgOrderStore::new(pool)))
        }
        None => {
            warn!(
                var = %secrets.database_url_var,
                "database url not set; orders are kept in memory and lost on restart"
            );
            Ok(Arc::new(MemoryOrderStore::new()))
        }
    }
}

fn bind_addr(cfg: &AdminConfig) -> anyhow::Result<SocketAddr> {
    if let Some(addr) = std::env::var(ENV_DAEMON_ADDR).ok().and_then(|v| v.parse().ok()) {
        return Ok(addr);
    }
    cfg.daemon
        .bind_addr
        .parse()
        .with_context(|| format!("invalid daemon.bind_addr: {}", cfg.daemon.bind_addr))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:8080",
        "http://127.0.0.1:8080",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
