use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camsync::config::SyncConfig;
use camsync::persistence::{JsonSnapshotStore, SnapshotStore};
use camsync::scheduler::CycleEvent;
use camsync::service::SyncService;
use camsync_platforms::extractor::{
    HttpRequest, HttpResponse, HttpTransport, PlatformFactory, PlatformKind, StaticAuth,
};
use camsync_platforms::{OnlineState, PlatformError};
use parking_lot::Mutex;
use reqwest::StatusCode;

/// Serves scripted feed payloads; once exhausted every request fails.
struct ScriptedFeedServer {
    payloads: Mutex<VecDeque<(u16, &'static str)>>,
}

impl ScriptedFeedServer {
    fn new(payloads: impl IntoIterator<Item = (u16, &'static str)>) -> Self {
        Self {
            payloads: Mutex::new(payloads.into_iter().collect()),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedFeedServer {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, PlatformError> {
        match self.payloads.lock().pop_front() {
            Some((status, body)) => Ok(HttpResponse::new(
                StatusCode::from_u16(status).unwrap(),
                body,
            )),
            None => Err(PlatformError::Transport("connection refused".to_string())),
        }
    }
}

async fn next_success(events: &mut tokio::sync::broadcast::Receiver<CycleEvent>) -> CycleEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if matches!(event, CycleEvent::Succeeded(_)) {
                return event;
            }
        }
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn feed_batches_flow_into_registry_and_snapshot() {
    let data_dir = tempfile::tempdir().unwrap();
    let config = SyncConfig {
        feed_url: Some("https://feed.test/sessions".to_string()),
        poll_interval_ms: 5,
        data_dir: data_dir.path().to_path_buf(),
        ..SyncConfig::default()
    };
    config.validate().unwrap();

    let transport = Arc::new(ScriptedFeedServer::new([
        (
            200,
            r#"[{"uid": 1, "nm": "A", "vs": 0, "m": {"topic": "hello%20world"}}]"#,
        ),
        (503, ""),
        (
            200,
            r#"{"sessions": [{"uid": 1, "nm": "A", "vs": 90},
                              {"uid": 2, "nm": "B", "vs": 0, "m": {"topic": "%E0%A4%A"}}]}"#,
        ),
    ]));
    let factory = PlatformFactory::new(transport, Arc::new(StaticAuth::anonymous()));
    let feed = factory
        .create_feed(PlatformKind::MyFreeCams, config.require_feed_url().unwrap())
        .unwrap();
    let store = Arc::new(JsonSnapshotStore::new(&config.data_dir));
    let service = SyncService::new(&config, feed, store.clone());
    let mut events = service.subscribe();

    assert!(service.selected());

    let CycleEvent::Succeeded(first) = next_success(&mut events).await else {
        unreachable!()
    };
    assert_eq!(first.added, vec![1]);
    assert_eq!(service.registry().get(1).unwrap().topic, "hello world");

    // the 503 in between is discarded, not treated as an empty batch
    let CycleEvent::Succeeded(second) = next_success(&mut events).await else {
        unreachable!()
    };
    assert_eq!(second.added, vec![2]);
    assert_eq!(second.updated, vec![1]);
    assert!(second.removed.is_empty());

    let one = service.registry().get(1).unwrap();
    assert_eq!(one.online_state, OnlineState::Offline);
    assert_eq!(service.registry().revision(1), Some(1));
    // undecodable topic is kept verbatim
    assert_eq!(service.registry().get(2).unwrap().topic, "%E0%A4%A");

    service.deselected().await;
    let saved = store.load().await.unwrap();
    let uids: Vec<u64> = saved.iter().map(|s| s.uid()).collect();
    assert_eq!(uids, vec![1, 2]);

    // a fresh service picks up where the last one stopped
    let restarted = SyncService::new(
        &config,
        Arc::new(EmptyFeed),
        Arc::new(JsonSnapshotStore::new(&config.data_dir)),
    );
    assert_eq!(restarted.load().await, 2);
    assert_eq!(restarted.snapshot(), service.snapshot());
}

struct EmptyFeed;

#[async_trait]
impl camsync_platforms::extractor::SessionFeed for EmptyFeed {
    fn platform_name(&self) -> &str {
        "empty"
    }

    async fn fetch_batch(
        &self,
    ) -> Result<Vec<camsync_platforms::SessionState>, PlatformError> {
        Ok(Vec::new())
    }
}
