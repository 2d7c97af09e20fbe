//! Shared setup for the runnable demos.

use std::sync::Arc;

use serde_json::json;
use tagbid_core::{DemandGateway, PartnerConfig};

/// Partner configuration used by every demo.
///
/// # Panics
/// Panics if the embedded configuration stops matching `PartnerConfig`.
#[must_use]
pub fn demo_config() -> PartnerConfig {
    serde_json::from_value(json!({
        "targetingType": "slot",
        "timeout": 1000,
        "demandExpiry": 30000,
        "mapping": {
            "top-banner": ["xTop"],
            "sidebar": ["xSide"],
            "footer": ["xFoot"]
        },
        "xSlots": {
            "xTop": {"adSlotId": "1001"},
            "xSide": {"adSlotId": "1002"},
            "xFoot": {"adSlotId": "1003"}
        }
    }))
    .expect("demo config is valid json for PartnerConfig")
}

/// Return a gateway for demos.
///
/// Uses the Kraken endpoint unless `TAGBID_DEMOS_USE_MOCK` is set.
///
/// # Panics
/// Panics if the Kraken connector rejects the demo configuration.
#[must_use]
pub fn get_gateway() -> Arc<dyn DemandGateway> {
    if std::env::var("TAGBID_DEMOS_USE_MOCK").is_ok() {
        println!("--- (Using Mock Gateway for CI) ---");
        Arc::new(tagbid_mock::MockGateway::new())
    } else {
        Arc::new(
            tagbid_kraken::KrakenConnector::builder(demo_config())
                .build()
                .expect("kraken connector config validation failed"),
        )
    }
}
