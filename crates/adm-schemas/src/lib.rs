//! Shared record types for the admin order store.
//!
//! The order document itself belongs to the external store; these types are
//! the decoded view every other crate works with. `createdAt` arrives in
//! several shapes and is decoded into [`CreatedAt`] here, at the boundary.

mod created_at;

pub use created_at::{CreatedAt, TimestampError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Author recorded on history entries written by the transitioner.
pub const SYSTEM_ACTOR: &str = "system";

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Order lifecycle status.
///
/// Only `pending` and `processing` matter here; every downstream status is
/// carried verbatim in `Other` so records round-trip untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Processing,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => OrderStatus::Pending,
            "processing" => OrderStatus::Processing,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        OrderStatus::parse(&s)
    }
}

impl From<OrderStatus> for String {
    fn from(s: OrderStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StatusHistoryEntry
// ---------------------------------------------------------------------------

/// One append-only entry in an order's `statusHistory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    /// Client-side ISO-8601 timestamp (millisecond precision, `Z` suffix).
    /// Entries written by other clients may omit it, or the fields below.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub updated_by: String,
    #[serde(default)]
    pub note: String,
}

impl StatusHistoryEntry {
    /// Entry authored by the system actor at `at`.
    pub fn system(status: OrderStatus, at: DateTime<Utc>, note: impl Into<String>) -> Self {
        Self {
            status,
            timestamp: iso_millis(at),
            updated_by: SYSTEM_ACTOR.to_string(),
            note: note.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderRecord
// ---------------------------------------------------------------------------

/// Decoded order document.
///
/// Business fields this system never reads are kept in `fields` so a
/// decode/encode pass does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Document key; doubles as the human-facing order number.
    pub id: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: CreatedAt,
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OrderRecord {
    /// A fresh `pending` order with no history.
    pub fn pending(id: impl Into<String>, created_at: CreatedAt) -> Self {
        Self {
            id: id.into(),
            status: OrderStatus::Pending,
            created_at,
            status_history: Vec::new(),
            auto_updated_at: None,
            last_updated: None,
            fields: Map::new(),
        }
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix
/// (e.g. `2024-05-01T08:30:00.000Z`).
pub fn iso_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
