//! A failing order store turns a manual sweep into a 500 and shows up in
//! the status snapshot; the sweep loop keeps running.

use std::sync::Arc;
use std::time::Duration;

use adm_config::AdminConfig;
use adm_daemon::{routes, state};
use adm_gateway::{FetchError, Fetcher, Gateway, Request as GwRequest, Response as GwResponse};
use adm_schemas::OrderRecord;
use adm_transition::{OrderStore, StatusUpdate, Transitioner};
use anyhow::{anyhow, Result};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

struct DownStore;

#[async_trait::async_trait]
impl OrderStore for DownStore {
    fn backend_name(&self) -> &'static str {
        "down"
    }
    async fn query_pending(&self) -> Result<Vec<OrderRecord>> {
        Err(anyhow!("connection refused"))
    }
    async fn get(&self, _order_id: &str) -> Result<Option<OrderRecord>> {
        Err(anyhow!("connection refused"))
    }
    async fn insert(&self, _order: OrderRecord) -> Result<bool> {
        Err(anyhow!("connection refused"))
    }
    async fn commit_batch(&self, _updates: &[StatusUpdate]) -> Result<usize> {
        Err(anyhow!("connection refused"))
    }
    async fn update_one(&self, _update: &StatusUpdate) -> Result<bool> {
        Err(anyhow!("connection refused"))
    }
}

struct NoNet;

#[async_trait::async_trait]
impl Fetcher for NoNet {
    async fn fetch(&self, _req: &GwRequest) -> Result<GwResponse, FetchError> {
        Err(FetchError::Network("offline".into()))
    }
}

fn make_state() -> Arc<state::AppState> {
    let cfg = AdminConfig::default();
    let transitioner = Arc::new(Transitioner::new(Arc::new(DownStore), cfg.transitioner.clone()));
    let gateway = Arc::new(Gateway::new(cfg.gateway.clone(), Arc::new(NoNet)).unwrap());
    Arc::new(state::AppState::new(transitioner, gateway, "test-hash".to_string()))
}

async fn json_of(st: &Arc<state::AppState>, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = routes::build_router(Arc::clone(st)).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn manual_sweep_error_is_500() {
    let st = make_state();
    let (status, body) = json_of(&st, "POST", "/v1/orders/sweep").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));

    let (_, status_body) = json_of(&st, "GET", "/v1/status").await;
    assert_eq!(status_body["config_hash"], "test-hash");
    assert!(status_body["last_sweep"]["error"]
        .as_str()
        .unwrap()
        .contains("query pending orders failed"));
}

#[tokio::test(start_paused = true)]
async fn sweep_loop_reports_each_failure_on_the_bus() {
    let st = make_state();
    let mut rx = st.bus.subscribe();
    let handle = state::spawn_sweep_loop(Arc::clone(&st), Duration::from_secs(30));

    tokio::time::sleep(Duration::from_secs(31)).await;
    handle.abort();

    let mut errors = 0;
    let mut sweeps = 0;
    while let Ok(msg) = rx.try_recv() {
        match msg {
            state::BusMsg::LogLine { level, .. } if level == "ERROR" => errors += 1,
            state::BusMsg::Sweep(summary) => {
                assert!(summary.error.is_some());
                sweeps += 1;
            }
            _ => {}
        }
    }
    assert_eq!(errors, 2);
    assert_eq!(sweeps, 2);
}

#[tokio::test]
async fn failed_gateway_install_is_logged_not_fatal() {
    let st = make_state();
    let mut rx = st.bus.subscribe();
    state::spawn_gateway_install(Arc::clone(&st)).await.unwrap();

    match rx.try_recv().unwrap() {
        state::BusMsg::LogLine { level, msg } => {
            assert_eq!(level, "WARN");
            assert!(msg.contains("pre-cache failed"));
        }
        other => panic!("unexpected bus message: {other:?}"),
    }
    assert_eq!(st.gateway.state(), adm_gateway::WorkerState::Installed);
}
