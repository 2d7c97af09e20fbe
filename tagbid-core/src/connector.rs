use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use tagbid_types::GatewayKey;

use crate::types::{Correlator, SlotDemand, SlotId};
use crate::TagbidError;

/// Network boundary of the partner module: one bidder round trip per call.
///
/// Implementations perform exactly one request for the batch. They do not
/// retry; a failure maps to exactly one `Err`.
#[async_trait]
pub trait DemandGateway: Send + Sync {
    /// Stable gateway name for logs and error attribution.
    fn name(&self) -> &'static str;

    /// Typed key derived from [`name`](Self::name).
    fn key(&self) -> GatewayKey {
        GatewayKey::new(self.name())
    }

    /// Fetch demand for a batch of slots.
    ///
    /// Slots the bidder has no demand for are simply absent from the result;
    /// that is not an error.
    ///
    /// # Errors
    /// `TagbidError::Gateway` for transport failures and
    /// `TagbidError::MalformedResponse` for unparseable payloads.
    async fn fetch_demand(&self, slots: &[SlotId]) -> Result<SlotDemand, TagbidError>;
}

#[async_trait]
impl<T: DemandGateway + ?Sized> DemandGateway for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch_demand(&self, slots: &[SlotId]) -> Result<SlotDemand, TagbidError> {
        (**self).fetch_demand(slots).await
    }
}

/// Analytics hook notified once per prefetch cycle when its fetch completes.
///
/// Called for successful and failed cycles alike, before any deferred
/// request is replayed.
pub trait PrefetchObserver: Send + Sync {
    /// The prefetch for `correlator` completed after `elapsed`.
    fn prefetch_complete(&self, correlator: &Correlator, elapsed: Duration);
}

impl<F> PrefetchObserver for F
where
    F: Fn(&Correlator, Duration) + Send + Sync,
{
    fn prefetch_complete(&self, correlator: &Correlator, elapsed: Duration) {
        self(correlator, elapsed);
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PrefetchObserver for NoopObserver {
    fn prefetch_complete(&self, _correlator: &Correlator, _elapsed: Duration) {}
}
