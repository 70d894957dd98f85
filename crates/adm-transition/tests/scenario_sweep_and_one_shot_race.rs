//! Sweep and one-shot racing on the same order: status never regresses and
//! history gets exactly one system entry.

use std::sync::Arc;
use std::time::Duration;

use adm_config::TransitionerConfig;
use adm_schemas::{CreatedAt, OrderRecord, OrderStatus};
use adm_transition::{MemoryOrderStore, OrderStore, Transitioner};
use chrono::Utc;

#[tokio::test(start_paused = true)]
async fn sweep_cancels_the_pending_one_shot() {
    let old = OrderRecord::pending("ORD-1", CreatedAt::Native(Utc::now() - chrono::Duration::minutes(2)));
    let store = Arc::new(MemoryOrderStore::with_orders([old.clone()]));
    let t = Arc::new(Transitioner::new(store.clone(), TransitionerConfig::default()));

    t.on_order_created("ORD-1", Some(&old));
    assert_eq!(t.scheduled_count(), 1);

    let report = t.sweep().await.unwrap();
    assert_eq!(report.transitioned, 1);
    assert_eq!(t.scheduled_count(), 0, "sweep should cancel the one-shot");

    tokio::time::sleep(Duration::from_secs(60)).await;
    let o = store.get("ORD-1").await.unwrap().unwrap();
    assert_eq!(o.status, OrderStatus::Processing);
    assert_eq!(o.status_history.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sweep_and_check_write_history_once() {
    for round in 0..20 {
        let id = format!("ORD-{round}");
        let old = OrderRecord::pending(&id, CreatedAt::Native(Utc::now() - chrono::Duration::minutes(1)));
        let store = Arc::new(MemoryOrderStore::with_orders([old]));
        let t = Arc::new(Transitioner::new(store.clone(), TransitionerConfig::default()));

        let (a, b) = (Arc::clone(&t), Arc::clone(&t));
        let check_id = id.clone();
        let sweep = tokio::spawn(async move { a.sweep().await });
        let check = tokio::spawn(async move { b.check_one(&check_id).await });
        sweep.await.unwrap().unwrap();
        check.await.unwrap();

        let o = store.get(&id).await.unwrap().unwrap();
        assert_eq!(o.status, OrderStatus::Processing);
        assert_eq!(o.status_history.len(), 1, "round {round}");
    }
}
