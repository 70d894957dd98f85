//! Install / activate lifecycle and the control channel.

use std::sync::{Arc, Mutex};

use adm_config::GatewayConfig;
use adm_gateway::{
    CacheMode, ControlMessage, ControlReply, Credentials, FetchError, Fetcher, Gateway, Method,
    Request, RequestMode, Response, WorkerState,
};
use tokio::sync::oneshot;

/// Records every request; answers 404 for paths listed in `missing`.
#[derive(Default)]
struct RecordingNet {
    seen: Mutex<Vec<Request>>,
    missing: Vec<String>,
}

#[async_trait::async_trait]
impl Fetcher for RecordingNet {
    async fn fetch(&self, req: &Request) -> Result<Response, FetchError> {
        self.seen.lock().unwrap().push(req.clone());
        if self.missing.iter().any(|p| p == req.url.path()) {
            return Ok(Response::new(404, "not found"));
        }
        Ok(Response::new(200, vec![b'x'; 1_500]))
    }
}

fn gateway_with(net: Arc<RecordingNet>, cfg: GatewayConfig) -> Gateway {
    Gateway::new(cfg, net).unwrap()
}

#[tokio::test]
async fn install_precaches_critical_resources_then_activates() {
    let net = Arc::new(RecordingNet::default());
    let gw = gateway_with(net.clone(), GatewayConfig::default());
    assert_eq!(gw.state(), WorkerState::Parsed);

    let n = gw.install().await.unwrap();
    assert_eq!(n, 8);
    assert_eq!(gw.state(), WorkerState::Activated);
    assert!(gw.clients_claimed());

    let cache = gw.storage().open(gw.cache_name()).await;
    assert_eq!(cache.len().await, 8);

    let seen = net.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 8);
    for req in &seen {
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.cache, CacheMode::Reload, "{}", req.url);
    }

    let shell = &seen[0];
    assert_eq!(shell.url.as_str(), "http://localhost:8080/admin.html");
    assert_eq!(shell.mode, RequestMode::SameOrigin);
    assert_eq!(shell.credentials, Credentials::SameOrigin);

    let cdn = seen
        .iter()
        .find(|r| r.url.host_str() == Some("www.gstatic.com"))
        .unwrap();
    assert_eq!(cdn.mode, RequestMode::Cors);
    assert_eq!(cdn.credentials, Credentials::Omit);
}

#[tokio::test]
async fn failed_install_caches_nothing_and_keeps_waiting() {
    let net = Arc::new(RecordingNet {
        missing: vec!["/index.html".to_string()],
        ..RecordingNet::default()
    });
    let gw = gateway_with(net, GatewayConfig::default());

    let err = gw.install().await.unwrap_err();
    assert!(matches!(err, FetchError::BadStatus { status: 404, .. }), "{err}");

    assert_eq!(gw.state(), WorkerState::Installed);
    assert!(!gw.clients_claimed());
    assert!(gw.storage().open(gw.cache_name()).await.is_empty().await);

    // An explicit SKIP_WAITING finishes the job.
    gw.on_message(ControlMessage::SkipWaiting, None).await;
    assert_eq!(gw.state(), WorkerState::Activated);
    assert!(gw.clients_claimed());
}

#[tokio::test]
async fn activation_keeps_only_the_current_cache() {
    let cfg = GatewayConfig {
        cache_name: "current-v".to_string(),
        ..GatewayConfig::default()
    };
    let gw = gateway_with(Arc::new(RecordingNet::default()), cfg);
    for name in ["old-v1", "old-v2", "current-v"] {
        gw.storage().open(name).await;
    }

    let deleted = gw.activate().await;
    assert_eq!(deleted, vec!["old-v1".to_string(), "old-v2".to_string()]);
    assert_eq!(gw.storage().keys().await, vec!["current-v".to_string()]);
    assert_eq!(gw.state(), WorkerState::Activated);
}

#[tokio::test]
async fn cache_status_on_empty_cache_is_zero() {
    let gw = gateway_with(Arc::new(RecordingNet::default()), GatewayConfig::default());
    let (tx, rx) = oneshot::channel();

    gw.on_message(ControlMessage::GetCacheStatus, Some(tx)).await;

    let ControlReply::CacheStatus(status) = rx.await.unwrap();
    assert_eq!(status.version, "2.3.0");
    assert_eq!(status.cached_resources_count, 0);
    assert_eq!(status.cache_size, 0);
}

#[tokio::test]
async fn cache_status_rounds_kb_over_sampled_entries() {
    let cfg = GatewayConfig {
        size_sample_limit: 2,
        ..GatewayConfig::default()
    };
    let gw = gateway_with(Arc::new(RecordingNet::default()), cfg);
    let cache = gw.storage().open(gw.cache_name()).await;
    for path in ["/a.js", "/b.js", "/c.js"] {
        let req = gw.request(Method::GET, path).unwrap();
        cache.put(&req, Response::new(200, vec![0u8; 1_500])).await;
    }

    let status = gw.cache_status().await;
    assert_eq!(status.cached_resources_count, 3);
    // 3000 bytes sampled -> 2.93 KB -> 3.
    assert_eq!(status.cache_size, 3);
}

#[tokio::test]
async fn clear_cache_deletes_every_named_cache() {
    let gw = gateway_with(Arc::new(RecordingNet::default()), GatewayConfig::default());
    gw.install().await.unwrap();
    gw.storage().open("old-v1").await;

    gw.on_message(ControlMessage::ClearCache, None).await;
    assert!(gw.storage().keys().await.is_empty());
}

#[tokio::test]
async fn status_reply_with_dropped_receiver_is_harmless() {
    let gw = gateway_with(Arc::new(RecordingNet::default()), GatewayConfig::default());
    let (tx, rx) = oneshot::channel();
    drop(rx);
    gw.on_message(ControlMessage::GetCacheStatus, Some(tx)).await;
}
