//! Axum router and all HTTP handlers for adm-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.

use std::{convert::Infallible, sync::Arc};

use adm_gateway::{ControlEnvelope, ControlMessage, FetchError, Method, Response as GwResponse};
use adm_schemas::OrderRecord;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{
        AckResponse, ErrorResponse, FetchQuery, HealthResponse, OrderCreatedRequest,
        OrderCreatedResponse,
    },
    state::{AppState, BusMsg},
};

/// Response header naming where a proxied fetch was answered from.
pub const SERVED_FROM_HEADER: &str = "x-served-from";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/orders/created", post(order_created))
        .route("/v1/orders/sweep", post(orders_sweep))
        .route("/v1/gateway/message", post(gateway_message))
        .route("/v1/gateway/fetch", get(gateway_fetch))
        .with_state(state)
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.snapshot()))
}

// ---------------------------------------------------------------------------
// POST /v1/orders/created
// ---------------------------------------------------------------------------

/// Record-created trigger. Stores the snapshot if given (existing ids are
/// left alone) and schedules the one-shot check. Fire-and-forget: a store
/// error is logged, the check is scheduled anyway.
pub(crate) async fn order_created(
    State(st): State<Arc<AppState>>,
    Json(req): Json<OrderCreatedRequest>,
) -> Response {
    if req.id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "order id is required");
    }

    let snapshot = match req.order {
        Some(raw) => match decode_snapshot(&req.id, raw) {
            Ok(order) => Some(order),
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("invalid order: {e}"))
            }
        },
        None => None,
    };

    if let Some(order) = &snapshot {
        if let Err(e) = st.transitioner.store().insert(order.clone()).await {
            warn!(order_id = %req.id, error = %format!("{e:#}"), "order snapshot not stored");
        }
    }

    st.transitioner.on_order_created(&req.id, snapshot.as_ref());
    let scheduled = st.transitioner.is_scheduled(&req.id);
    let delay_ms = st.transitioner.config().one_shot_delay_ms;

    if scheduled {
        let _ = st.bus.send(BusMsg::OrderScheduled {
            order_id: req.id.clone(),
            delay_ms,
        });
    }
    info!(order_id = %req.id, scheduled, "orders/created");

    (
        StatusCode::ACCEPTED,
        Json(OrderCreatedResponse {
            accepted: true,
            order_id: req.id,
            scheduled,
            delay_ms,
        }),
    )
        .into_response()
}

/// Decode the snapshot under the top-level id. A snapshot carrying a
/// different `id` is rejected.
fn decode_snapshot(id: &str, raw: Value) -> Result<OrderRecord, String> {
    let mut raw = raw;
    if let Value::Object(map) = &mut raw {
        match map.get("id") {
            Some(Value::String(inner)) if inner != id => {
                return Err(format!("order.id {inner:?} does not match id {id:?}"));
            }
            _ => {
                map.insert("id".to_string(), Value::String(id.to_string()));
            }
        }
    }
    serde_json::from_value(raw).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// POST /v1/orders/sweep
// ---------------------------------------------------------------------------

pub(crate) async fn orders_sweep(State(st): State<Arc<AppState>>) -> Response {
    let res = st.transitioner.sweep().await;
    if let Some(summary) = st.transitioner.last_sweep() {
        let _ = st.bus.send(BusMsg::Sweep(summary));
    }
    match res {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => {
            st.log("ERROR", format!("sweep failed: {e:#}"));
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/gateway/message
// ---------------------------------------------------------------------------

pub(crate) async fn gateway_message(
    State(st): State<Arc<AppState>>,
    Json(envelope): Json<ControlEnvelope>,
) -> Response {
    let Some(msg) = envelope.message() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unknown message type: {}", envelope.kind),
        );
    };

    match msg {
        ControlMessage::GetCacheStatus => {
            let (tx, rx) = oneshot::channel();
            st.gateway.on_message(msg, Some(tx)).await;
            match rx.await {
                Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
                Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "no cache status reply"),
            }
        }
        ControlMessage::SkipWaiting | ControlMessage::ClearCache => {
            st.gateway.on_message(msg, None).await;
            info!(kind = msg.as_str(), "gateway/message");
            (
                StatusCode::OK,
                Json(AckResponse {
                    ok: true,
                    kind: msg.as_str().to_string(),
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/gateway/fetch
// ---------------------------------------------------------------------------

/// Route one request through the gateway. Requests the gateway does not
/// intercept are fetched directly and marked `passthrough`.
pub(crate) async fn gateway_fetch(
    State(st): State<Arc<AppState>>,
    Query(q): Query<FetchQuery>,
) -> Response {
    let method_raw = q.method.as_deref().unwrap_or("GET").to_ascii_uppercase();
    let method = match Method::from_bytes(method_raw.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, format!("invalid method: {method_raw}"))
        }
    };
    let req = match st.gateway.request(method, &q.url) {
        Ok(r) => r,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let (res, served_from) = match st.gateway.on_fetch(&req).await {
        Some(res) => {
            let from = res.as_ref().map(|r| r.source.as_str()).unwrap_or("network");
            (res, from)
        }
        None => (st.gateway.fetch_direct(&req).await, "passthrough"),
    };

    match res {
        Ok(resp) => proxy_response(resp, served_from),
        Err(e) => {
            let status = match e {
                FetchError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                FetchError::NoCacheAvailable => StatusCode::GATEWAY_TIMEOUT,
                FetchError::Network(_) | FetchError::BadStatus { .. } => StatusCode::BAD_GATEWAY,
            };
            error_response(status, e.to_string())
        }
    }
}

fn proxy_response(resp: GwResponse, served_from: &'static str) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers = HeaderMap::new();
    if let Some(ct) = resp.header("content-type") {
        if let Ok(v) = HeaderValue::from_str(ct) {
            headers.insert(header::CONTENT_TYPE, v);
        }
    }
    headers.insert(SERVED_FROM_HEADER, HeaderValue::from_static(served_from));
    (status, headers, resp.body).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
