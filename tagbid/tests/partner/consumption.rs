use proptest::prelude::*;
use tagbid::PrefetchState;
use tagbid_mock::MockBehavior;

use crate::helpers::{ExtraSlotGateway, call_of, cfg, dynamic_partner, ids, slots_of};

#[tokio::test]
async fn disjoint_resolves_are_served_from_cache_without_overlap() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    partner.prefetch("v1", ["a", "b", "c", "d"]).wait().await;
    assert_eq!(partner.prefetch_state(), PrefetchState::Ready);
    assert_eq!(partner.cached_len(), 4);

    let first = partner.resolve("v1", ["a", "c"]).await.unwrap();
    assert_eq!(partner.prefetch_state(), PrefetchState::Ready);
    let second = partner.resolve("v1", ["b", "d"]).await.unwrap();

    assert_eq!(slots_of(&first), vec!["a", "c"]);
    assert_eq!(slots_of(&second), vec!["b", "d"]);
    assert_eq!(controller.call_count().await, 1);
    assert_eq!(partner.cached_len(), 0);
    assert_eq!(partner.prefetch_state(), PrefetchState::Used);
}

#[tokio::test]
async fn consumed_record_is_never_delivered_twice() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    partner.prefetch("v1", ["a"]).wait().await;

    let first = partner.resolve("v1", ["a"]).await.unwrap();
    let second = partner.resolve("v1", ["a"]).await.unwrap();

    assert_eq!(call_of(&first, "a").as_deref(), Some("1"));
    assert_eq!(call_of(&second, "a").as_deref(), Some("2"));
    assert_eq!(controller.call_count().await, 2);
}

#[tokio::test]
async fn duplicate_slot_ids_are_collapsed() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let report = partner.resolve("v1", ["a", "b", "a"]).await.unwrap();

    assert_eq!(slots_of(&report), vec!["a", "b"]);
    assert_eq!(controller.requests().await, vec![ids(&["a", "b"])]);
}

#[tokio::test]
async fn empty_resolve_answers_without_a_fetch() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    let report = partner.resolve("v1", Vec::<&str>::new()).await.unwrap();
    assert!(report.demand.is_empty());
    assert_eq!(controller.call_count().await, 0);
}

#[tokio::test]
async fn unrequested_gateway_results_are_ignored() {
    let partner = tagbid::Partner::builder()
        .config(cfg())
        .gateway(std::sync::Arc::new(ExtraSlotGateway))
        .build()
        .unwrap();

    partner.prefetch("v1", ["a"]).wait().await;
    assert_eq!(partner.cached_len(), 1);

    let report = partner.resolve("v1", ["a", "b"]).await.unwrap();
    assert_eq!(slots_of(&report), vec!["a", "b"]);
}

#[tokio::test]
async fn fetch_failure_after_partial_draw_is_a_warning() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    partner.prefetch("v1", ["a"]).wait().await;
    controller
        .push(MockBehavior::Fail(tagbid::TagbidError::gateway("dyn", "down")))
        .await;

    let report = partner.resolve("v1", ["a", "b"]).await.unwrap();
    assert_eq!(slots_of(&report), vec!["a"]);
    assert_eq!(report.warnings.len(), 1);
    assert!(!report.is_complete());
}

#[tokio::test]
async fn fetch_failure_with_nothing_drawn_is_an_error() {
    let (partner, controller, _clock) = dynamic_partner(cfg());
    controller
        .push(MockBehavior::Fail(tagbid::TagbidError::gateway("dyn", "down")))
        .await;

    let err = partner.resolve("v1", ["a"]).await.expect_err("fetch failed");
    assert!(err.is_upstream());
}

fn arb_callers() -> impl Strategy<Value = Vec<Vec<usize>>> {
    proptest::collection::vec(proptest::collection::btree_set(0usize..6, 1..4), 1..6)
        .prop_map(|v| v.into_iter().map(|s| s.into_iter().collect()).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prefetched_records_are_delivered_at_most_once(callers in arb_callers(), early in 0usize..6) {
        let slots: Vec<String> = (0..6).map(|i| format!("s{i}")).collect();
        let results = tokio_test::block_on(async {
            let (partner, controller, _clock) = dynamic_partner(cfg());
            let gate = controller.push_gated(MockBehavior::Echo).await;
            let handle = partner.prefetch("v", slots.clone());

            let mut tasks = Vec::new();
            for (i, picks) in callers.iter().enumerate() {
                let wanted: Vec<String> = picks.iter().map(|&j| slots[j].clone()).collect();
                let p = partner.clone();
                tasks.push(tokio::spawn(async move { (wanted.clone(), p.resolve("v", wanted).await) }));
                if i + 1 == early {
                    tokio::task::yield_now().await;
                }
            }
            tokio::task::yield_now().await;
            gate.open();
            handle.wait().await;
            futures::future::join_all(tasks).await
        });

        let mut prefetched = std::collections::HashMap::new();
        for joined in results {
            let (wanted, res) = joined.unwrap();
            let report = res.unwrap();
            for slot in &wanted {
                prop_assert!(report.demand.contains(slot), "missing {slot}");
                if call_of(&report, slot).as_deref() == Some("1") {
                    *prefetched.entry(slot.clone()).or_insert(0) += 1;
                }
            }
        }
        for (slot, n) in prefetched {
            prop_assert!(n <= 1, "{slot} delivered {n} times from the prefetch");
        }
    }
}
