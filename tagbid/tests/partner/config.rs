use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tagbid::{Analytics, Partner, PartnerConfig, PrefetchState, TagbidError, TargetingType};
use tagbid_mock::MockGateway;

use crate::helpers::{cfg, dynamic_partner, with_expiry};

#[tokio::test]
async fn disabled_module_answers_empty_and_never_fetches() {
    let (partner, controller, _clock) = dynamic_partner(PartnerConfig {
        disabled: true,
        ..cfg()
    });

    let handle = partner.prefetch("v1", ["a"]);
    assert!(handle.is_skipped());
    assert_eq!(partner.prefetch_state(), PrefetchState::New);

    let report = partner.resolve("v1", ["a"]).await.unwrap();
    assert!(report.demand.is_empty());
    assert_eq!(controller.call_count().await, 0);
    assert!(!partner.supported_options().prefetch);
}

#[tokio::test]
async fn prefetch_disabled_still_resolves_on_demand() {
    let (partner, controller, _clock) = dynamic_partner(PartnerConfig {
        prefetch_enabled: false,
        ..cfg()
    });

    partner.prefetch("v1", ["a"]).wait().await;
    assert_eq!(partner.prefetch_state(), PrefetchState::New);
    assert_eq!(controller.call_count().await, 0);

    let report = partner.resolve("v1", ["a"]).await.unwrap();
    assert!(report.demand.contains("a"));
    assert_eq!(controller.call_count().await, 1);
}

#[test]
fn builder_requires_gateway_and_config() {
    let err = Partner::builder().config(cfg()).build().err().unwrap();
    assert!(matches!(err, TagbidError::InvalidArg(_)));

    let err = Partner::builder()
        .gateway(Arc::new(MockGateway::new()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, TagbidError::InvalidArg(_)));
}

#[test]
fn builder_validates_config() {
    let mut mapping = BTreeMap::new();
    mapping.insert("top".to_string(), vec!["missing".to_string()]);
    let err = Partner::builder()
        .config(PartnerConfig {
            mapping,
            timeout_ms: 0,
            ..cfg()
        })
        .gateway(Arc::new(MockGateway::new()))
        .build()
        .err()
        .unwrap();
    assert_eq!(err.problems().len(), 2);
}

#[test]
fn only_slot_targeting_is_supported() {
    let partner = Partner::builder()
        .config(cfg())
        .gateway(Arc::new(MockGateway::new()))
        .build()
        .unwrap();

    assert_eq!(partner.targeting_type(), TargetingType::Slot);
    let err = partner.set_targeting_type(TargetingType::Page).unwrap_err();
    assert_eq!(err, TagbidError::UnsupportedTargetingType("page".into()));
    assert!(partner.set_targeting_type(TargetingType::Slot).is_ok());
    assert_eq!(partner.gateway_name(), "tagbid-mock");
}

#[test]
fn advertises_analytics_and_options() {
    let (partner, _controller, _clock) = dynamic_partner(with_expiry(1_500));
    assert!(partner.supported_analytics().contains(Analytics::TIME | Analytics::DEMAND));

    let opts = partner.supported_options();
    assert!(opts.prefetch);
    assert_eq!(opts.demand_expiry, Some(Duration::from_millis(1_500)));
}
