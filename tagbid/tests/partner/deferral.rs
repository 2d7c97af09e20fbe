use std::sync::{Arc, Mutex};
use std::time::Duration;

use tagbid::{Partner, PrefetchState};
use tagbid_mock::MockBehavior;

use crate::helpers::{call_of, cfg, dynamic_partner, ids, slots_of, until};

#[tokio::test]
async fn overlapping_resolve_is_deferred_and_served_from_prefetch() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let gate = controller.push_gated(MockBehavior::Echo).await;

    let handle = partner.prefetch("v1", ["a", "b"]);
    assert_eq!(partner.prefetch_state(), PrefetchState::InProgress);
    assert_eq!(partner.pending_slots(), ids(&["a", "b"]));

    let p = partner.clone();
    let task = tokio::spawn(async move { p.resolve("v1", ["a", "b"]).await });
    until(|| partner.deferred_len() == 1).await;
    assert!(partner.pending_slots().is_empty());
    assert!(!task.is_finished());

    gate.open();
    handle.wait().await;
    let report = task.await.unwrap().unwrap();

    assert_eq!(slots_of(&report), vec!["a", "b"]);
    assert_eq!(call_of(&report, "a").as_deref(), Some("1"));
    assert_eq!(call_of(&report, "b").as_deref(), Some("1"));
    // served from the prefetch, not a second fetch
    assert_eq!(controller.call_count().await, 1);
    assert_eq!(partner.deferred_len(), 0);
    assert_eq!(partner.prefetch_state(), PrefetchState::Used);
}

#[tokio::test]
async fn partial_overlap_defers_and_fetches_the_rest_after_replay() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let gate = controller.push_gated(MockBehavior::Echo).await;

    let handle = partner.prefetch("v1", ["a"]);
    let p = partner.clone();
    let task = tokio::spawn(async move { p.resolve("v1", ["a", "c"]).await });
    until(|| partner.deferred_len() == 1).await;
    // nothing fetched for "c" while deferred
    assert_eq!(controller.call_count().await, 1);

    gate.open();
    handle.wait().await;
    let report = task.await.unwrap().unwrap();

    assert_eq!(call_of(&report, "a").as_deref(), Some("1"));
    assert_eq!(call_of(&report, "c").as_deref(), Some("2"));
    assert_eq!(controller.requests().await, vec![ids(&["a"]), ids(&["c"])]);
}

#[tokio::test]
async fn non_overlapping_resolve_during_prefetch_fetches_immediately() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let _gate = controller.push_gated(MockBehavior::Echo).await;

    let _handle = partner.prefetch("v1", ["a"]);
    let report = tokio::time::timeout(Duration::from_secs(1), partner.resolve("v1", ["z"]))
        .await
        .expect("resolve must not wait for the prefetch")
        .unwrap();

    assert_eq!(slots_of(&report), vec!["z"]);
    assert_eq!(partner.deferred_len(), 0);
    assert_eq!(partner.prefetch_state(), PrefetchState::InProgress);
    assert_eq!(partner.pending_slots(), ids(&["a"]));
}

#[tokio::test]
async fn deferred_calls_replay_in_arrival_order_after_notification() {
    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let (gw, controller) = tagbid_mock::DynamicMockGateway::new_with_controller("dyn");
    let sink = Arc::clone(&events);
    let partner = Partner::builder()
        .config(cfg())
        .gateway(gw)
        .observer(Arc::new(move |c: &tagbid::Correlator, _elapsed: Duration| {
            sink.lock().unwrap().push(format!("notify {c}"));
        }))
        .build()
        .unwrap();
    let gate = controller.push_gated(MockBehavior::Echo).await;

    let handle = partner.prefetch("v1", ["a", "b", "c"]);
    let mut tasks = Vec::new();
    for (i, slot) in ["a", "b", "c"].into_iter().enumerate() {
        let p = partner.clone();
        let sink = Arc::clone(&events);
        tasks.push(tokio::spawn(async move {
            let report = p.resolve("v1", [slot]).await.unwrap();
            sink.lock().unwrap().push(format!("resolved {slot}"));
            report
        }));
        until(|| partner.deferred_len() == i + 1).await;
    }

    gate.open();
    handle.wait().await;
    for t in futures::future::join_all(tasks).await {
        let report = t.unwrap();
        assert_eq!(report.demand.len(), 1);
    }

    let events = events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["notify v1", "resolved a", "resolved b", "resolved c"]
    );
    assert_eq!(controller.call_count().await, 1);
}

#[tokio::test]
async fn failed_prefetch_replays_deferred_calls_with_fresh_fetch() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let gate = controller
        .push_gated(MockBehavior::Fail(tagbid::TagbidError::gateway("dyn", "down")))
        .await;

    let handle = partner.prefetch("v1", ["a"]);
    let p = partner.clone();
    let task = tokio::spawn(async move { p.resolve("v1", ["a"]).await });
    until(|| partner.deferred_len() == 1).await;

    gate.open();
    handle.wait().await;
    let report = task.await.unwrap().unwrap();

    assert_eq!(call_of(&report, "a").as_deref(), Some("2"));
    assert!(report.is_complete());
}

#[tokio::test]
async fn abandoned_deferred_call_leaves_prefetched_demand_cached() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let gate = controller.push_gated(MockBehavior::Echo).await;

    let handle = partner.prefetch("v1", ["a"]);
    let p = partner.clone();
    let task = tokio::spawn(async move { p.resolve("v1", ["a"]).await });
    until(|| partner.deferred_len() == 1).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    gate.open();
    handle.wait().await;
    // let the replay task run
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }

    assert_eq!(partner.cached_len(), 1);
    assert_eq!(partner.prefetch_state(), PrefetchState::Ready);

    let report = partner.resolve("v1", ["a"]).await.unwrap();
    assert_eq!(call_of(&report, "a").as_deref(), Some("1"));
    assert_eq!(controller.call_count().await, 1);
    assert_eq!(partner.prefetch_state(), PrefetchState::Used);
}
