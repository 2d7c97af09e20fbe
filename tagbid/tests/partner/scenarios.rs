use tagbid::{PrefetchState, SlotDemand, TagbidError, Targeting};
use tagbid_mock::MockBehavior;

use crate::helpers::{call_of, cfg, dynamic_partner, ids, slots_of, until};

fn only(slot: &str) -> SlotDemand {
    SlotDemand::from([(
        slot.into(),
        Targeting::from([("call".to_string(), "prefetch".to_string())]),
    )])
}

#[tokio::test]
async fn partial_prefetch_then_fresh_fetch_for_the_miss() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    controller.push(MockBehavior::Return(only("a"))).await;
    partner.prefetch("v1", ["a", "b"]).wait().await;
    assert_eq!(partner.cached_len(), 1);

    let report = partner.resolve("v1", ["a", "b"]).await.unwrap();
    assert_eq!(slots_of(&report), vec!["a", "b"]);
    assert_eq!(call_of(&report, "a").as_deref(), Some("prefetch"));
    assert_eq!(call_of(&report, "b").as_deref(), Some("2"));
    assert_eq!(controller.requests().await[1], ids(&["b"]));
}

#[tokio::test]
async fn partial_prefetch_then_empty_fresh_fetch() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    controller.push(MockBehavior::Return(only("a"))).await;
    controller.push(MockBehavior::Return(SlotDemand::new())).await;
    partner.prefetch("v1", ["a", "b"]).wait().await;

    let report = partner.resolve("v1", ["a", "b"]).await.unwrap();
    assert_eq!(slots_of(&report), vec!["a"]);
    assert!(report.is_complete());
}

#[tokio::test]
async fn failed_prefetch_reaches_ready_and_resolve_fetches_fresh() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    controller
        .push(MockBehavior::Fail(TagbidError::gateway("dyn", "down")))
        .await;
    partner.prefetch("v1", ["a"]).wait().await;

    assert_eq!(partner.prefetch_state(), PrefetchState::Ready);
    assert_eq!(partner.cached_len(), 0);

    let report = partner.resolve("v1", ["a"]).await.unwrap();
    assert_eq!(call_of(&report, "a").as_deref(), Some("2"));

    controller
        .push(MockBehavior::Fail(TagbidError::gateway("dyn", "still down")))
        .await;
    let err = partner.resolve("v1", ["a"]).await.expect_err("fresh fetch failed");
    assert_eq!(err, TagbidError::gateway("dyn", "still down"));
}

#[tokio::test]
async fn second_caller_for_a_claimed_slot_fetches_its_own() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let gate = controller.push_gated(MockBehavior::Echo).await;
    let handle = partner.prefetch("v1", ["x"]);

    let p = partner.clone();
    let first = tokio::spawn(async move { p.resolve("v1", ["x"]).await });
    until(|| partner.deferred_len() == 1).await;

    // "x" is claimed, so this call has nothing pending to wait for
    let second = partner.resolve("v1", ["x"]).await.unwrap();
    assert_eq!(call_of(&second, "x").as_deref(), Some("2"));

    gate.open();
    handle.wait().await;
    let first = first.await.unwrap().unwrap();
    assert_eq!(call_of(&first, "x").as_deref(), Some("1"));
}

#[tokio::test]
async fn overlapping_deferred_callers_split_claimed_slots() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let gate = controller.push_gated(MockBehavior::Echo).await;
    let handle = partner.prefetch("v1", ["x", "y"]);

    let p = partner.clone();
    let a = tokio::spawn(async move { p.resolve("v1", ["x"]).await });
    until(|| partner.deferred_len() == 1).await;
    let p = partner.clone();
    let b = tokio::spawn(async move { p.resolve("v1", ["x", "y"]).await });
    until(|| partner.deferred_len() == 2).await;
    assert!(partner.pending_slots().is_empty());

    gate.open();
    handle.wait().await;
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(slots_of(&a), vec!["x"]);
    assert_eq!(call_of(&a, "x").as_deref(), Some("1"));
    assert_eq!(slots_of(&b), vec!["x", "y"]);
    assert_eq!(call_of(&b, "y").as_deref(), Some("1"));
    assert_eq!(call_of(&b, "x").as_deref(), Some("2"));
    assert_eq!(controller.requests().await, vec![ids(&["x", "y"]), ids(&["x"])]);
}
