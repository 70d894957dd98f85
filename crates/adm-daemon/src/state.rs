//! Shared runtime state for adm-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The transitioner and
//! the gateway own their own synchronisation; this module only wires them to
//! the event bus.

use std::sync::Arc;
use std::time::Duration;

use adm_config::AdminConfig;
use adm_gateway::{Fetcher, Gateway, WorkerState};
use adm_transition::{MemoryOrderStore, SweepSummary, Transitioner};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Sweep(SweepSummary),
    OrderScheduled { order_id: String, delay_ms: u64 },
    LogLine { level: String, msg: String },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Sweep(_) => "sweep",
            BusMsg::OrderScheduled { .. } => "order",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Point-in-time snapshot returned by GET /v1/status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub config_hash: String,
    pub store_backend: String,
    pub scheduled_one_shots: usize,
    pub last_sweep: Option<SweepSummary>,
    pub gateway_state: WorkerState,
    pub clients_claimed: bool,
    pub cache_name: String,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub config_hash: String,
    pub transitioner: Arc<Transitioner>,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(transitioner: Arc<Transitioner>, gateway: Arc<Gateway>, config_hash: String) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "adm-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            config_hash,
            transitioner,
            gateway,
        }
    }

    /// In-memory order store plus a gateway on `fetcher`. Used when no
    /// database is configured, and by tests.
    pub fn in_memory(cfg: &AdminConfig, fetcher: Arc<dyn Fetcher>) -> anyhow::Result<Self> {
        let store = Arc::new(MemoryOrderStore::new());
        let transitioner = Arc::new(Transitioner::new(store, cfg.transitioner.clone()));
        let gateway = Arc::new(Gateway::new(cfg.gateway.clone(), fetcher)?);
        Ok(Self::new(transitioner, gateway, String::new()))
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            config_hash: self.config_hash.clone(),
            store_backend: self.transitioner.store().backend_name().to_string(),
            scheduled_one_shots: self.transitioner.scheduled_count(),
            last_sweep: self.transitioner.last_sweep(),
            gateway_state: self.gateway.state(),
            clients_claimed: self.gateway.clients_claimed(),
            cache_name: self.gateway.cache_name().to_string(),
        }
    }

    pub fn log(&self, level: &str, msg: impl Into<String>) {
        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Schedule trigger: sweep every `interval` and publish each outcome.
/// A failed sweep is reported as an ERROR log line; the next tick retries.
pub fn spawn_sweep_loop(state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    let transitioner = Arc::clone(&state.transitioner);
    adm_transition::spawn_sweep_loop(transitioner, interval, move |res| {
        if let Err(e) = res {
            state.log("ERROR", format!("sweep failed: {e:#}"));
        }
        if let Some(summary) = state.transitioner.last_sweep() {
            let _ = state.bus.send(BusMsg::Sweep(summary));
        }
    })
}

/// Run gateway install in the background; activation follows on success.
pub fn spawn_gateway_install(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match state.gateway.install().await {
            Ok(n) => state.log("INFO", format!("gateway installed; {n} resources cached")),
            Err(e) => state.log("WARN", format!("gateway pre-cache failed: {e}")),
        }
    })
}
