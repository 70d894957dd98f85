use adm_db::NewTransition;
use adm_schemas::OrderRecord;
use anyhow::Result;
use sqlx::PgPool;

use crate::store::{OrderStore, StatusUpdate};

/// Postgres-backed store. `autoUpdatedAt` is the database's `now()`.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_db(u: &StatusUpdate) -> NewTransition {
    NewTransition {
        order_id: u.order_id.clone(),
        last_updated: u.last_updated.clone(),
        entry: u.entry.clone(),
    }
}

#[async_trait::async_trait]
impl OrderStore for PgOrderStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn query_pending(&self) -> Result<Vec<OrderRecord>> {
        adm_db::fetch_pending_orders(&self.pool).await
    }

    async fn get(&self, order_id: &str) -> Result<Option<OrderRecord>> {
        adm_db::fetch_order(&self.pool, order_id).await
    }

    async fn insert(&self, order: OrderRecord) -> Result<bool> {
        adm_db::insert_order(&self.pool, &order).await
    }

    async fn commit_batch(&self, updates: &[StatusUpdate]) -> Result<usize> {
        let batch: Vec<NewTransition> = updates.iter().map(to_db).collect();
        adm_db::transition_pending_batch(&self.pool, &batch).await
    }

    async fn update_one(&self, update: &StatusUpdate) -> Result<bool> {
        adm_db::transition_pending_one(&self.pool, &to_db(update)).await
    }
}
