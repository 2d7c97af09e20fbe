use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tagbid_core::connector::DemandGateway;
use tagbid_core::{BidRounder, Clock, SlotDemand, SlotId, TagbidError, Targeting, TargetingKeys};
use tokio::time::Instant;

mod dynamic;

pub use dynamic::{DynamicMockController, DynamicMockGateway, Gate, MockBehavior, echo_targeting};

/// Mock gateway for CI-safe demos. Answers every batch deterministically.
///
/// - A slot named `FAIL` fails the whole batch.
/// - Slots starting with `nobid` are omitted from the answer.
/// - Slots starting with `slow` delay the answer by 200ms.
/// - Every other slot gets id and open-market price targeting at a 1.50 cpm.
pub struct MockGateway {
    keys: TargetingKeys,
    rounder: BidRounder,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Gateway answering with the default targeting keys and rounding.
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys: TargetingKeys::default(),
            rounder: BidRounder::default(),
        }
    }

    /// Gateway answering with custom targeting keys.
    #[must_use]
    pub fn with_keys(keys: TargetingKeys) -> Self {
        Self {
            keys,
            rounder: BidRounder::default(),
        }
    }

    fn targeting(&self, slot: &SlotId) -> Targeting {
        let mut t = Targeting::new();
        t.insert(self.keys.id_key.clone(), slot.to_string());
        if let Some(price) = self.rounder.transform(Decimal::new(150, 2)) {
            t.insert(self.keys.om_key.clone(), format!("300x250_{price}"));
        }
        t
    }
}

#[async_trait]
impl DemandGateway for MockGateway {
    fn name(&self) -> &'static str {
        "tagbid-mock"
    }

    async fn fetch_demand(&self, slots: &[SlotId]) -> Result<SlotDemand, TagbidError> {
        if slots.iter().any(|s| s.as_str() == "FAIL") {
            return Err(TagbidError::gateway(self.name(), "forced failure"));
        }
        if slots.iter().any(|s| s.as_str().starts_with("slow")) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(slots
            .iter()
            .filter(|s| !s.as_str().starts_with("nobid"))
            .map(|s| (s.clone(), self.targeting(s)))
            .collect())
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }

    /// Total time advanced since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}
