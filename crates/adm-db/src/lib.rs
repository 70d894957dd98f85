use adm_schemas::{CreatedAt, OrderRecord, OrderStatus, StatusHistoryEntry};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};
use tracing::warn;

pub const ENV_DB_URL: &str = "ADM_DATABASE_URL";

/// Connect to Postgres at `url`.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}


/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_orders_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Insert an order document. Returns false if the id already exists.
pub async fn insert_order(pool: &PgPool, order: &OrderRecord) -> Result<bool> {
    let created_at: Value = order.created_at.clone().into();
    let created_at = if created_at.is_null() { None } else { Some(created_at) };
    let history = serde_json::to_value(&order.status_history)
        .context("encode status_history failed")?;

    let res = sqlx::query(
        r#"
        insert into orders (
          id, status, created_at, status_history, auto_updated_at, last_updated, data
        ) values (
          $1, $2, $3, $4, $5, $6, $7
        )
        on conflict (id) do nothing
        "#,
    )
    .bind(&order.id)
    .bind(order.status.as_str())
    .bind(created_at)
    .bind(history)
    .bind(order.auto_updated_at)
    .bind(&order.last_updated)
    .bind(Value::Object(order.fields.clone()))
    .execute(pool)
    .await
    .context("insert_order failed")?;

    Ok(res.rows_affected() == 1)
}

const ORDER_COLUMNS: &str =
    "id, status, created_at, status_history, auto_updated_at, last_updated, data";

pub async fn fetch_order(pool: &PgPool, id: &str) -> Result<Option<OrderRecord>> {
    let row = sqlx::query(&format!("select {ORDER_COLUMNS} from orders where id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("fetch_order failed")?;

    row.as_ref().map(order_from_row).transpose()
}

/// Every order currently `pending`, oldest insert first. Rows that do not
/// decode are logged and left out.
pub async fn fetch_pending_orders(pool: &PgPool) -> Result<Vec<OrderRecord>> {
    let rows = sqlx::query(&format!(
        "select {ORDER_COLUMNS} from orders where status = 'pending' order by inserted_at_utc, id"
    ))
    .fetch_all(pool)
    .await
    .context("fetch_pending_orders failed")?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        match order_from_row(row) {
            Ok(order) => orders.push(order),
            Err(e) => {
                let id: String = row.try_get("id").unwrap_or_default();
                warn!(order_id = %id, error = %format!("{e:#}"), "skipping undecodable order row");
            }
        }
    }
    Ok(orders)
}

/// Order counts grouped by status, sorted by status.
pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        select status, count(*)::bigint
        from orders
        group by status
        order by status
        "#,
    )
    .fetch_all(pool)
    .await
    .context("count_by_status failed")?;
    Ok(rows)
}

fn order_from_row(row: &PgRow) -> Result<OrderRecord> {
    let status: String = row.try_get("status")?;
    let created_at: Option<Value> = row.try_get("created_at")?;
    let history: Value = row.try_get("status_history")?;
    let data: Value = row.try_get("data")?;

    let status_history: Vec<StatusHistoryEntry> =
        serde_json::from_value(history).context("decode status_history failed")?;
    let fields = match data {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    Ok(OrderRecord {
        id: row.try_get("id")?,
        status: OrderStatus::parse(&status),
        created_at: created_at.map(CreatedAt::from).unwrap_or_default(),
        status_history,
        auto_updated_at: row.try_get("auto_updated_at")?,
        last_updated: row.try_get("last_updated")?,
        fields,
    })
}

// ---------------------------------------------------------------------------
// pending -> processing
// ---------------------------------------------------------------------------

/// One guarded `pending -> processing` write.
#[derive(Debug, Clone)]
pub struct NewTransition {
    pub order_id: String,
    /// Client-side ISO timestamp.
    pub last_updated: String,
    pub entry: StatusHistoryEntry,
}

/// Apply one transition. `autoUpdatedAt` comes from the server clock.
///
/// Guarded on `status = 'pending'`: returns false (and writes nothing) if the
/// order is gone or already left pending, so history is appended at most once.
pub async fn transition_pending_one(pool: &PgPool, t: &NewTransition) -> Result<bool> {
    apply_transition(pool, t).await
}

/// Apply every transition in one transaction. Returns how many orders moved.
/// Either all guarded writes commit or none do.
pub async fn transition_pending_batch(pool: &PgPool, batch: &[NewTransition]) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await.context("transition batch begin failed")?;
    let mut applied = 0usize;
    for t in batch {
        if apply_transition(&mut *tx, t).await? {
            applied += 1;
        }
    }
    tx.commit().await.context("transition batch commit failed")?;

    Ok(applied)
}

async fn apply_transition<'e, E>(executor: E, t: &NewTransition) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let entry = serde_json::to_value(&t.entry).context("encode history entry failed")?;

    let res = sqlx::query(
        r#"
        update orders
        set status = $2,
            auto_updated_at = now(),
            last_updated = $3,
            status_history = status_history || $4::jsonb
        where id = $1
          and status = 'pending'
        "#,
    )
    .bind(&t.order_id)
    .bind(t.entry.status.as_str())
    .bind(&t.last_updated)
    .bind(json!([entry]))
    .execute(executor)
    .await
    .with_context(|| format!("transition update failed for order {}", t.order_id))?;

    Ok(res.rows_affected() == 1)
}
