use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tagbid_core::{
    Analytics, Clock, Correlator, Demand, DemandGateway, DemandReport, NoopObserver, PartnerConfig,
    PrefetchHandle, PrefetchObserver, PrefetchState, SlotDemand, SlotId, SupportedOptions,
    TagbidError, TargetingType, TokioClock,
};
use tokio::time::Instant;

use crate::prefetch::{CycleId, DeferredCall};
use crate::reconcile::{self, Admission, Engine};
use crate::scheduler::schedule_replay;

/// State shared by a [`Partner`] and the tasks it spawns.
pub(crate) struct Shared {
    gateway: Arc<dyn DemandGateway>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn PrefetchObserver>,
    cfg: PartnerConfig,
    expiry: Option<Duration>,
    engine: Mutex<Engine>,
    targeting_type: Mutex<TargetingType>,
}

impl Shared {
    fn engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one call through the overlap check and cache draw.
    pub(crate) fn admit(&self, call: DeferredCall) -> Admission {
        let now = self.clock.now();
        #[cfg(feature = "tracing")]
        let (ticket, correlator) = (call.ticket().get(), call.correlator().clone());
        let admission = self.engine().admit(call, now, self.expiry);
        #[cfg(feature = "tracing")]
        {
            match admission {
                Admission::Deferred => {
                    tracing::debug!(ticket, correlator = %correlator, "resolve deferred behind prefetch");
                }
                Admission::Abandoned => {
                    tracing::debug!(ticket, correlator = %correlator, "caller gone; releasing its claims");
                }
                Admission::Answered { drawn, outstanding } => {
                    tracing::debug!(ticket, correlator = %correlator, drawn, outstanding, "resolve drew from cache");
                }
            }
        }
        admission
    }

    /// Publish the outcome of `cycle`'s fetch and hand its deferred calls back.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tagbid::core::complete_prefetch",
            skip_all,
            fields(correlator = %correlator, gateway = self.gateway.name()),
        )
    )]
    fn complete_prefetch(
        self: &Arc<Self>,
        cycle: CycleId,
        correlator: &Correlator,
        fetched: Result<SlotDemand, TagbidError>,
        started: Instant,
    ) {
        let now = self.clock.now();
        let replay = {
            let mut engine = self.engine();
            match engine.prefetch.complete(cycle) {
                Some(queue) => {
                    let demand = match fetched {
                        Ok(d) => Demand::stamped(d, now),
                        Err(_e) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(error = %_e, "prefetch failed; serving on demand");
                            Demand::new()
                        }
                    };
                    let _written = engine.store.fill(correlator, demand);
                    #[cfg(feature = "tracing")]
                    tracing::debug!(records = _written, deferred = queue.len(), "prefetch ready");
                    queue
                }
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("discarding result of superseded prefetch");
                    VecDeque::new()
                }
            }
        };
        self.observer
            .prefetch_complete(correlator, now.saturating_duration_since(started));
        let _ = schedule_replay(self, replay);
    }
}

/// One partner module instance: a demand cache in front of a gateway.
///
/// Cloning is cheap and clones share the same cache and prefetch cycle.
#[derive(Clone)]
pub struct Partner {
    shared: Arc<Shared>,
}

/// Builder for constructing a [`Partner`].
pub struct PartnerBuilder {
    cfg: Option<PartnerConfig>,
    gateway: Option<Arc<dyn DemandGateway>>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn PrefetchObserver>,
}

impl Default for PartnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PartnerBuilder {
    /// Create a builder with the Tokio clock and no observer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: None,
            gateway: None,
            clock: Arc::new(TokioClock),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Set the module configuration. Required.
    #[must_use]
    pub fn config(mut self, cfg: PartnerConfig) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Set the gateway used for every fetch. Required.
    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn DemandGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Replace the clock used to stamp demand and evaluate expiry.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register the hook notified when each prefetch cycle completes.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn PrefetchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Build the partner.
    ///
    /// # Errors
    /// Returns `InvalidArg` when the config or gateway is missing and
    /// `InvalidConfig` when the config fails validation.
    pub fn build(self) -> Result<Partner, TagbidError> {
        let cfg = self
            .cfg
            .ok_or_else(|| TagbidError::invalid_arg("no config set; call config(...)"))?;
        let gateway = self
            .gateway
            .ok_or_else(|| TagbidError::invalid_arg("no gateway set; call gateway(...)"))?;
        cfg.validate()?;

        let shared = Shared {
            gateway,
            clock: self.clock,
            observer: self.observer,
            expiry: cfg.demand_expiry(),
            targeting_type: Mutex::new(cfg.targeting_type),
            engine: Mutex::new(Engine::default()),
            cfg,
        };
        Ok(Partner {
            shared: Arc::new(shared),
        })
    }
}

fn dedup<I, S>(slots: I) -> Vec<SlotId>
where
    I: IntoIterator<Item = S>,
    S: Into<SlotId>,
{
    let mut seen = HashSet::new();
    slots
        .into_iter()
        .map(Into::into)
        .filter(|s: &SlotId| seen.insert(s.clone()))
        .collect()
}

impl Partner {
    /// Start building a new `Partner`.
    #[must_use]
    pub fn builder() -> PartnerBuilder {
        PartnerBuilder::new()
    }

    /// Warm the cache for `correlator` with one fetch covering `slots`.
    ///
    /// The cycle is `InProgress` by the time this returns, so a `resolve` for
    /// the same correlator issued right after it is deferred rather than
    /// fetching twice. Calling this while another cycle is in progress
    /// supersedes that cycle.
    ///
    /// Must be called from within a Tokio runtime. Returns a skipped handle
    /// when prefetching is disabled by configuration.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tagbid::core::prefetch",
            skip_all,
            fields(gateway = self.shared.gateway.name()),
        )
    )]
    pub fn prefetch<I, S>(&self, correlator: impl Into<Correlator>, slots: I) -> PrefetchHandle
    where
        I: IntoIterator<Item = S>,
        S: Into<SlotId>,
    {
        let cfg = &self.shared.cfg;
        if cfg.disabled || !cfg.prefetch_enabled {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                disabled = cfg.disabled,
                prefetch_enabled = cfg.prefetch_enabled,
                "prefetch skipped"
            );
            return PrefetchHandle::skipped();
        }

        let correlator = correlator.into();
        let slots = dedup(slots);
        let started_at = self.shared.clock.now();
        let started = {
            let mut engine = self.shared.engine();
            let started = engine.prefetch.start(correlator.clone(), &slots);
            engine.store.open(&correlator, &slots);
            started
        };
        #[cfg(feature = "tracing")]
        if started.superseded {
            tracing::warn!(
                correlator = %correlator,
                requeued = started.requeue.len(),
                "superseding in-progress prefetch"
            );
        }
        let _ = schedule_replay(&self.shared, started.requeue);

        let shared = Arc::clone(&self.shared);
        let cycle = started.cycle;
        PrefetchHandle::new(tokio::spawn(async move {
            let fetched = shared.gateway.fetch_demand(&slots).await;
            shared.complete_prefetch(cycle, &correlator, fetched, started_at);
        }))
    }

    /// Answer a demand request for `slots` under `correlator`.
    ///
    /// Slots still awaiting the in-progress prefetch make the call wait for
    /// it. Cached records are moved out of the cache and everything the cache
    /// cannot serve is fetched in a single gateway call. A disabled module
    /// answers an empty report.
    ///
    /// # Errors
    /// Returns the gateway error when the fetch failed and no slot was served
    /// from the cache. A fetch failure after a partial cache hit is reported
    /// in [`DemandReport::warnings`] instead.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tagbid::core::resolve",
            skip_all,
            fields(gateway = self.shared.gateway.name()),
        )
    )]
    pub async fn resolve<I, S>(
        &self,
        correlator: impl Into<Correlator>,
        slots: I,
    ) -> Result<DemandReport, TagbidError>
    where
        I: IntoIterator<Item = S>,
        S: Into<SlotId>,
    {
        if self.shared.cfg.disabled {
            return Ok(DemandReport::default());
        }
        let correlator = correlator.into();
        let slots = dedup(slots);

        let ticket = self.shared.engine().prefetch.issue_ticket();
        let (call, rx) = DeferredCall::new(ticket, correlator, slots);
        let _ = self.shared.admit(call);
        let draw = rx
            .await
            .map_err(|_| TagbidError::Other("deferred resolve dropped before replay".into()))?;

        if draw.outstanding.is_empty() {
            return Ok(DemandReport::new(draw.drawn));
        }
        let fetched = self.shared.gateway.fetch_demand(&draw.outstanding).await;
        #[cfg(feature = "tracing")]
        if let Err(e) = &fetched {
            tracing::warn!(error = %e, slots = draw.outstanding.len(), "on-demand fetch failed");
        }
        reconcile::finish(draw, fetched, self.shared.clock.now())
    }

    /// Lifecycle state of the current prefetch cycle.
    #[must_use]
    pub fn prefetch_state(&self) -> PrefetchState {
        self.shared.engine().prefetch.state()
    }

    /// Correlator of the current prefetch cycle.
    #[must_use]
    pub fn current_correlator(&self) -> Option<Correlator> {
        self.shared.engine().prefetch.correlator().cloned()
    }

    /// Slots still awaiting the in-progress prefetch and unclaimed, sorted.
    #[must_use]
    pub fn pending_slots(&self) -> Vec<SlotId> {
        let mut out: Vec<SlotId> = self.shared.engine().prefetch.pending().cloned().collect();
        out.sort();
        out
    }

    /// Number of `resolve` calls waiting for the in-progress prefetch.
    #[must_use]
    pub fn deferred_len(&self) -> usize {
        self.shared.engine().prefetch.deferred_len()
    }

    /// Number of cached records for the current correlator.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        let engine = self.shared.engine();
        engine
            .prefetch
            .correlator()
            .map_or(0, |c| engine.store.ready_len(c))
    }

    /// The module configuration.
    #[must_use]
    pub fn config(&self) -> &PartnerConfig {
        &self.shared.cfg
    }

    /// Name of the gateway demand is fetched from.
    #[must_use]
    pub fn gateway_name(&self) -> &'static str {
        self.shared.gateway.name()
    }

    /// Where targeting is applied.
    #[must_use]
    pub fn targeting_type(&self) -> TargetingType {
        *self
            .shared
            .targeting_type
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Change where targeting is applied.
    ///
    /// # Errors
    /// Returns `UnsupportedTargetingType` for anything but slot targeting.
    pub fn set_targeting_type(&self, ty: TargetingType) -> Result<(), TagbidError> {
        if !ty.is_supported() {
            return Err(TagbidError::UnsupportedTargetingType(ty.to_string()));
        }
        *self
            .shared
            .targeting_type
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = ty;
        Ok(())
    }

    /// Analytics the orchestrator may collect for this module.
    #[must_use]
    pub const fn supported_analytics(&self) -> Analytics {
        Analytics::TIME.union(Analytics::DEMAND)
    }

    /// Optional orchestrator features this module supports.
    #[must_use]
    pub fn supported_options(&self) -> SupportedOptions {
        let cfg = &self.shared.cfg;
        SupportedOptions {
            prefetch: cfg.prefetch_enabled && !cfg.disabled,
            demand_expiry: self.shared.expiry,
        }
    }
}
