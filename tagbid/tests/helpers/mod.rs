// Shared fixtures for partner tests; use `crate::helpers::*`.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tagbid::{
    DemandGateway, DemandReport, Partner, PartnerConfig, SlotDemand, SlotId, TagbidError,
    Targeting, TargetingType,
};
use tagbid_mock::{DynamicMockController, DynamicMockGateway, ManualClock};

/// Valid config with no slot mapping and expiry disabled.
pub fn cfg() -> PartnerConfig {
    PartnerConfig {
        disabled: false,
        prefetch_enabled: true,
        targeting_type: TargetingType::Slot,
        timeout_ms: 1_000,
        mapping: BTreeMap::new(),
        x_slots: BTreeMap::new(),
        target_key_override: None,
        rounding_buckets: None,
        demand_expiry_ms: -1,
    }
}

pub fn with_expiry(ms: i64) -> PartnerConfig {
    PartnerConfig {
        demand_expiry_ms: ms,
        ..cfg()
    }
}

pub fn ids(v: &[&str]) -> Vec<SlotId> {
    v.iter().map(|s| SlotId::from(*s)).collect()
}

/// Partner over a dynamic mock gateway and a manual clock.
pub fn dynamic_partner(cfg: PartnerConfig) -> (Partner, DynamicMockController, Arc<ManualClock>) {
    let (gw, controller) = DynamicMockGateway::new_with_controller("dyn");
    let clock = Arc::new(ManualClock::new());
    let partner = Partner::builder()
        .config(cfg)
        .gateway(gw)
        .clock(clock.clone())
        .build()
        .expect("valid partner");
    (partner, controller, clock)
}

/// Yield until `cond` holds, letting spawned tasks make progress.
pub async fn until(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Value of the `call` tag written by the echo behavior.
pub fn call_of(report: &DemandReport, slot: &str) -> Option<String> {
    report
        .demand
        .get(slot)
        .and_then(|r| r.demand().get("call").cloned())
}

/// Sorted slot ids present in a report.
pub fn slots_of(report: &DemandReport) -> Vec<String> {
    report.demand.slot_ids().map(ToString::to_string).collect()
}

/// Gateway that answers every requested slot plus a slot nobody asked for.
pub struct ExtraSlotGateway;

#[async_trait]
impl DemandGateway for ExtraSlotGateway {
    fn name(&self) -> &'static str {
        "extra"
    }

    async fn fetch_demand(&self, slots: &[SlotId]) -> Result<SlotDemand, TagbidError> {
        let mut out: SlotDemand = slots
            .iter()
            .map(|s| (s.clone(), Targeting::from([("slot".to_string(), s.to_string())])))
            .collect();
        out.insert("unrequested".into(), Targeting::new());
        Ok(out)
    }
}
