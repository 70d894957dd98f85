use std::collections::BTreeMap;

use adm_schemas::OrderRecord;
use anyhow::Result;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::store::{OrderStore, StatusUpdate};

/// In-process order store.
///
/// Used by the daemon when no database is configured, and by tests. The
/// write lock makes each batch atomic; the server clock is `Utc::now()`.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<BTreeMap<String, OrderRecord>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = OrderRecord>) -> Self {
        let map = orders.into_iter().map(|o| (o.id.clone(), o)).collect();
        Self {
            orders: RwLock::new(map),
        }
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

/// Guarded apply against an already-locked map.
fn apply(orders: &mut BTreeMap<String, OrderRecord>, update: &StatusUpdate) -> bool {
    let Some(order) = orders.get_mut(&update.order_id) else {
        return false;
    };
    if !order.status.is_pending() {
        return false;
    }
    order.status = update.entry.status.clone();
    order.auto_updated_at = Some(Utc::now());
    order.last_updated = Some(update.last_updated.clone());
    order.status_history.push(update.entry.clone());
    true
}

#[async_trait::async_trait]
impl OrderStore for MemoryOrderStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn query_pending(&self) -> Result<Vec<OrderRecord>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.status.is_pending())
            .cloned()
            .collect())
    }

    async fn get(&self, order_id: &str) -> Result<Option<OrderRecord>> {
        Ok(self.orders.read().await.get(order_id).cloned())
    }

    async fn insert(&self, order: OrderRecord) -> Result<bool> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Ok(false);
        }
        orders.insert(order.id.clone(), order);
        Ok(true)
    }

    async fn commit_batch(&self, updates: &[StatusUpdate]) -> Result<usize> {
        let mut orders = self.orders.write().await;
        Ok(updates.iter().filter(|u| apply(&mut orders, u)).count())
    }

    async fn update_one(&self, update: &StatusUpdate) -> Result<bool> {
        let mut orders = self.orders.write().await;
        Ok(apply(&mut orders, update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adm_schemas::{CreatedAt, OrderStatus};
    use chrono::TimeZone;

    fn update(id: &str) -> StatusUpdate {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 31, 0).unwrap();
        StatusUpdate::processing(id, at, "test")
    }

    #[tokio::test]
    async fn update_is_guarded_on_pending() {
        let store = MemoryOrderStore::with_orders([OrderRecord::pending("A", CreatedAt::Missing)]);

        assert!(store.update_one(&update("A")).await.unwrap());
        assert!(!store.update_one(&update("A")).await.unwrap());
        assert!(!store.update_one(&update("missing")).await.unwrap());

        let a = store.get("A").await.unwrap().unwrap();
        assert_eq!(a.status, OrderStatus::Processing);
        assert_eq!(a.status_history.len(), 1);
        assert_eq!(a.last_updated.as_deref(), Some("2024-05-01T08:31:00.000Z"));
        assert!(a.auto_updated_at.is_some());
    }

    #[tokio::test]
    async fn batch_skips_non_pending_and_counts_applied() {
        let mut shipped = OrderRecord::pending("B", CreatedAt::Missing);
        shipped.status = OrderStatus::Other("shipped".into());
        let store =
            MemoryOrderStore::with_orders([OrderRecord::pending("A", CreatedAt::Missing), shipped]);

        let n = store
            .commit_batch(&[update("A"), update("B"), update("C")])
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert!(store.query_pending().await.unwrap().is_empty());
        assert!(store.get("B").await.unwrap().unwrap().status_history.is_empty());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = MemoryOrderStore::new();
        assert!(store.insert(OrderRecord::pending("A", CreatedAt::Missing)).await.unwrap());
        assert!(!store.insert(OrderRecord::pending("A", CreatedAt::Millis(1))).await.unwrap());
        assert_eq!(store.get("A").await.unwrap().unwrap().created_at, CreatedAt::Missing);
    }
}
