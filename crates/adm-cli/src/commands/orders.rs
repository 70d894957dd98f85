//! `adm orders ...`: direct order-store access against Postgres.

use std::sync::Arc;

use adm_schemas::{CreatedAt, OrderRecord, OrderStatus};
use adm_transition::{PgOrderStore, Transitioner};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::Value;

use super::{connect, load_config};

/// `--created-at` as the store would hold it. JSON numbers and objects keep
/// their shape; anything else is stored as text.
pub fn parse_created_at(raw: Option<&str>) -> CreatedAt {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => CreatedAt::Native(Utc::now()),
        Some(s) => match serde_json::from_str::<Value>(s) {
            Ok(v @ (Value::Number(_) | Value::Object(_))) => CreatedAt::from(v),
            _ => CreatedAt::Text(s.to_string()),
        },
    }
}

pub async fn insert(
    config_paths: &[String],
    id: &str,
    created_at: Option<&str>,
    status: &str,
) -> Result<()> {
    let id = id.trim();
    if id.is_empty() {
        bail!("--id must not be empty");
    }
    let (loaded, cfg) = load_config(config_paths)?;
    let pool = connect(&loaded, &cfg).await?;

    let mut order = OrderRecord::pending(id, parse_created_at(created_at));
    order.status = OrderStatus::parse(status.trim());

    let inserted = adm_db::insert_order(&pool, &order).await?;
    println!(
        "inserted={} id={} status={}",
        inserted,
        order.id,
        order.status.as_str()
    );
    Ok(())
}

pub async fn show(config_paths: &[String], id: &str) -> Result<()> {
    let (loaded, cfg) = load_config(config_paths)?;
    let pool = connect(&loaded, &cfg).await?;

    let order = adm_db::fetch_order(&pool, id)
        .await?
        .with_context(|| format!("order not found: {id}"))?;
    println!("{}", serde_json::to_string_pretty(&order)?);
    Ok(())
}

pub async fn sweep(config_paths: &[String]) -> Result<()> {
    let (loaded, cfg) = load_config(config_paths)?;
    let pool = connect(&loaded, &cfg).await?;

    let transitioner = Transitioner::new(Arc::new(PgOrderStore::new(pool)), cfg.transitioner);
    let report = transitioner.sweep().await?;
    transitioner.shutdown();

    println!("config_hash={}", loaded.config_hash);
    println!(
        "scanned={} due={} transitioned={} unreadable={}",
        report.scanned, report.due, report.transitioned, report.unreadable
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_at_keeps_numeric_and_object_shapes() {
        assert_eq!(
            parse_created_at(Some("1714552200000")),
            CreatedAt::Millis(1_714_552_200_000)
        );
        assert_eq!(
            parse_created_at(Some(r#"{"seconds": 1714552200, "nanoseconds": 0}"#)),
            CreatedAt::from(json!({ "seconds": 1_714_552_200_i64, "nanoseconds": 0 }))
        );
    }

    #[test]
    fn created_at_text_stays_text() {
        assert_eq!(
            parse_created_at(Some("2024-05-01T08:30:00Z")),
            CreatedAt::Text("2024-05-01T08:30:00Z".to_string())
        );
        // Quoted JSON strings are not unwrapped.
        assert_eq!(
            parse_created_at(Some("\"x\"")),
            CreatedAt::Text("\"x\"".to_string())
        );
    }

    #[test]
    fn missing_created_at_is_now() {
        assert!(matches!(parse_created_at(None), CreatedAt::Native(_)));
        assert!(matches!(parse_created_at(Some("  ")), CreatedAt::Native(_)));
    }
}
