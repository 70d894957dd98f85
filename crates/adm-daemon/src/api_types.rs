//! Request and response types for all adm-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests.  No business logic lives here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

/// Body of every 4xx/5xx JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// /v1/orders/*
// ---------------------------------------------------------------------------

/// Record-created trigger. `order` is the document snapshot, if the caller
/// has one; its `id` defaults to the top-level `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedRequest {
    pub id: String,
    #[serde(default)]
    pub order: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedResponse {
    pub accepted: bool,
    pub order_id: String,
    /// False when the snapshot was already past `pending`.
    pub scheduled: bool,
    pub delay_ms: u64,
}

// ---------------------------------------------------------------------------
// /v1/gateway/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchQuery {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
}
