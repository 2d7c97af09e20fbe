use std::sync::{Arc, Mutex};
use std::time::Duration;

use tagbid::{Correlator, Partner, PrefetchState};
use tagbid_mock::{DynamicMockGateway, MockBehavior};

use crate::helpers::{call_of, cfg, dynamic_partner, ids, until};

#[tokio::test]
async fn stale_correlator_fetches_fresh_and_leaves_cache_alone() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    partner.prefetch("v1", ["a"]).wait().await;

    let report = partner.resolve("v0", ["a"]).await.unwrap();
    assert_eq!(call_of(&report, "a").as_deref(), Some("2"));
    assert_eq!(partner.cached_len(), 1);
    assert_eq!(partner.prefetch_state(), PrefetchState::Ready);
    assert_eq!(controller.call_count().await, 2);
}

#[tokio::test]
async fn stale_correlator_never_waits_for_an_in_progress_prefetch() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let _gate = controller.push_gated(MockBehavior::Echo).await;
    let _handle = partner.prefetch("v1", ["a"]);

    let report = tokio::time::timeout(Duration::from_secs(1), partner.resolve("other", ["a"]))
        .await
        .expect("stale resolve must not defer")
        .unwrap();
    assert!(report.demand.contains("a"));
    assert_eq!(partner.pending_slots(), ids(&["a"]));
    assert_eq!(partner.deferred_len(), 0);
}

#[tokio::test]
async fn new_prefetch_after_use_starts_a_new_cycle() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    partner.prefetch("v1", ["a"]).wait().await;
    partner.resolve("v1", ["a"]).await.unwrap();
    assert_eq!(partner.prefetch_state(), PrefetchState::Used);

    partner.prefetch("v2", ["a"]).wait().await;
    assert_eq!(partner.prefetch_state(), PrefetchState::Ready);
    assert_eq!(partner.current_correlator(), Some(Correlator::from("v2")));

    let report = partner.resolve("v2", ["a"]).await.unwrap();
    assert_eq!(call_of(&report, "a").as_deref(), Some("2"));
    assert_eq!(controller.call_count().await, 2);
}

#[tokio::test]
async fn prefetch_for_a_new_correlator_drops_the_old_cache() {
    let (partner, _controller, _clock) = dynamic_partner(cfg());
    partner.prefetch("v1", ["a", "b"]).wait().await;
    partner.prefetch("v2", ["c"]).wait().await;

    assert_eq!(partner.cached_len(), 1);
    let report = partner.resolve("v1", ["a"]).await.unwrap();
    // v1 is stale now, so "a" comes from a fresh fetch
    assert_eq!(call_of(&report, "a").as_deref(), Some("3"));
}

#[tokio::test]
async fn superseding_prefetch_replays_waiting_calls_and_discards_old_results() {
    let notified: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&notified);
    let (gw, controller) = DynamicMockGateway::new_with_controller("dyn");
    let partner = Partner::builder()
        .config(cfg())
        .gateway(gw)
        .observer(Arc::new(move |c: &Correlator, _elapsed: Duration| {
            sink.lock().unwrap().push(c.to_string());
        }))
        .build()
        .unwrap();

    let old_gate = controller.push_gated(MockBehavior::Echo).await;

    let old = partner.prefetch("v1", ["a"]);
    let p = partner.clone();
    let waiting = tokio::spawn(async move { p.resolve("v1", ["a"]).await });
    until(|| partner.deferred_len() == 1).await;

    let new = partner.prefetch("v2", ["a"]);
    assert_eq!(partner.current_correlator(), Some(Correlator::from("v2")));
    assert_eq!(partner.prefetch_state(), PrefetchState::InProgress);

    // replayed against v2, where v1 is stale: answered without the old fetch
    let report = waiting.await.unwrap().unwrap();
    assert!(report.demand.contains("a"));
    assert_eq!(partner.deferred_len(), 0);

    new.wait().await;
    assert_eq!(partner.prefetch_state(), PrefetchState::Ready);
    assert_eq!(partner.cached_len(), 1);

    old_gate.open();
    old.wait().await;
    assert_eq!(partner.prefetch_state(), PrefetchState::Ready);
    assert_eq!(partner.current_correlator(), Some(Correlator::from("v2")));
    assert_eq!(partner.cached_len(), 1);

    let report = partner.resolve("v2", ["a"]).await.unwrap();
    assert_ne!(call_of(&report, "a").as_deref(), Some("1"));
    assert_eq!(*notified.lock().unwrap(), vec!["v2".to_string(), "v1".to_string()]);
}
