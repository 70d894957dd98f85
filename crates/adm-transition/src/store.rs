//! Order store boundary.
//!
//! The transitioner only needs four things from the store: list pending
//! orders, read one order, and two guarded writes (batch and single). Each
//! write is atomic on its own; nothing is locked across calls.

use adm_schemas::{iso_millis, OrderRecord, OrderStatus, StatusHistoryEntry};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One `pending -> processing` write.
///
/// `autoUpdatedAt` is not carried here: stores stamp it from their own clock
/// when the write lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub order_id: String,
    /// Client-clock ISO timestamp, also used for the history entry.
    pub last_updated: String,
    pub entry: StatusHistoryEntry,
}

impl StatusUpdate {
    pub fn processing(order_id: impl Into<String>, now: DateTime<Utc>, note: &str) -> Self {
        Self {
            order_id: order_id.into(),
            last_updated: iso_millis(now),
            entry: StatusHistoryEntry::system(OrderStatus::Processing, now, note),
        }
    }
}

#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    /// Short name for logs and status output (e.g. `"postgres"`).
    fn backend_name(&self) -> &'static str;

    /// Every order whose status is `pending`.
    async fn query_pending(&self) -> Result<Vec<OrderRecord>>;

    async fn get(&self, order_id: &str) -> Result<Option<OrderRecord>>;

    /// Store a new order. Returns false if the id is already taken.
    async fn insert(&self, order: OrderRecord) -> Result<bool>;

    /// Apply every update in one atomic batch. Updates whose order is gone or
    /// no longer pending are skipped. Returns how many orders moved.
    async fn commit_batch(&self, updates: &[StatusUpdate]) -> Result<usize>;

    /// Apply one update, guarded on `status == pending`.
    async fn update_one(&self, update: &StatusUpdate) -> Result<bool>;
}
