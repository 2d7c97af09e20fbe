//! Merging of cache hits with fresh fetches for one `resolve`.

use std::time::Duration;

use tagbid_core::{
    Correlator, Demand, DemandRecord, DemandReport, PrefetchState, SlotDemand, SlotId, TagbidError,
};
use tokio::time::Instant;

use crate::prefetch::{DeferredCall, PrefetchController, Ticket};
use crate::store::{DemandStore, Take};

/// A call's share of the cache plus the slots it must fetch itself.
#[derive(Debug, Default)]
pub struct Draw {
    /// Records moved out of the store for this call.
    pub drawn: Demand,
    /// Requested slots the cache could not serve, in request order.
    pub outstanding: Vec<SlotId>,
}

/// What became of an admitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call claimed pending slots and waits for the cycle to settle.
    Deferred,
    /// The caller stopped waiting; nothing was drawn for it.
    Abandoned,
    /// The call was answered from the cache.
    Answered {
        /// Slots served from the cache.
        drawn: usize,
        /// Slots that still need a fetch.
        outstanding: usize,
    },
}

/// Store and controller guarded together by the partner's lock.
#[derive(Debug, Default)]
pub(crate) struct Engine {
    pub(crate) store: DemandStore,
    pub(crate) prefetch: PrefetchController,
}

impl Engine {
    /// Defer `call` if it overlaps the in-progress cycle, otherwise draw its
    /// slots from the cache and answer it.
    pub(crate) fn admit(
        &mut self,
        call: DeferredCall,
        now: Instant,
        expiry: Option<Duration>,
    ) -> Admission {
        // A caller that went away must not consume cached demand.
        if call.is_abandoned() {
            self.prefetch.release(call.ticket());
            return Admission::Abandoned;
        }
        if self
            .prefetch
            .claim(call.ticket(), call.correlator(), call.slots())
        {
            self.prefetch.defer(call);
            return Admission::Deferred;
        }
        let draw = self.draw(call.ticket(), call.correlator(), call.slots(), now, expiry);
        let admission = Admission::Answered {
            drawn: draw.drawn.len(),
            outstanding: draw.outstanding.len(),
        };
        call.answer(draw);
        admission
    }

    /// Move every servable record for `slots` out of the store.
    ///
    /// Stale correlators never draw. Records reserved by another ticket are
    /// skipped, expired records are dropped. `ticket`'s reservations are
    /// released afterwards.
    fn draw(
        &mut self,
        ticket: Ticket,
        correlator: &Correlator,
        slots: &[SlotId],
        now: Instant,
        expiry: Option<Duration>,
    ) -> Draw {
        let mut out = Draw::default();
        let current = self.prefetch.is_current(correlator);
        for slot in slots {
            let foreign = self
                .prefetch
                .reserved_by(slot)
                .is_some_and(|owner| owner != ticket);
            if !current || foreign {
                out.outstanding.push(slot.clone());
                continue;
            }
            match self.store.take(correlator, slot, now, expiry) {
                Take::Fresh(record) => {
                    out.drawn.insert(slot.clone(), record);
                }
                Take::Expired => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(correlator = %correlator, slot = %slot, "cached demand expired");
                    out.outstanding.push(slot.clone());
                }
                Take::Missing => out.outstanding.push(slot.clone()),
            }
        }
        self.prefetch.release(ticket);
        if current
            && self.prefetch.state() == PrefetchState::Ready
            && self.store.is_exhausted(correlator)
        {
            self.prefetch.mark_used();
            #[cfg(feature = "tracing")]
            tracing::debug!(correlator = %correlator, "prefetched demand used up");
        }
        out
    }
}

/// Combine a draw with the outcome of fetching its outstanding slots.
///
/// Fetched records are stamped with `now`; results for slots outside
/// `draw.outstanding` are ignored. A failed fetch turns into an error only
/// when nothing was drawn from the cache, otherwise it is reported as a
/// warning next to the cached demand.
///
/// # Errors
/// Returns the fetch error when the fetch failed and the draw was empty.
pub fn finish(
    draw: Draw,
    fetched: Result<SlotDemand, TagbidError>,
    now: Instant,
) -> Result<DemandReport, TagbidError> {
    let Draw {
        mut drawn,
        outstanding,
    } = draw;
    match fetched {
        Ok(mut fetched) => {
            for slot in outstanding {
                if let Some(targeting) = fetched.remove(&slot) {
                    drawn.insert(slot, DemandRecord::new(now, targeting));
                }
            }
            Ok(DemandReport::new(drawn))
        }
        Err(e) if drawn.is_empty() => Err(e),
        Err(e) => Ok(DemandReport {
            demand: drawn,
            warnings: vec![e],
        }),
    }
}
