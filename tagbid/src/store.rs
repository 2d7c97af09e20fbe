//! Correlator-scoped storage of prefetched demand.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tagbid_core::{Correlator, Demand, DemandRecord, SlotId};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    /// Requested by the cycle's fetch, not yet resolved.
    Pending,
    Ready(DemandRecord),
}

/// Outcome of taking one slot out of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Take {
    /// A record young enough to serve.
    Fresh(DemandRecord),
    /// A record was present but older than the expiry; it has been removed.
    Expired,
    /// Nothing usable is stored for the slot.
    Missing,
}

/// Correlator → slot-id → demand record (or pending placeholder).
///
/// Only one correlator is live at a time: opening a new entry drops every
/// other correlator's entry.
#[derive(Debug, Default)]
pub struct DemandStore {
    entries: HashMap<Correlator, BTreeMap<SlotId, Entry>>,
}

impl DemandStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `correlator`'s entry with one placeholder per slot.
    ///
    /// Any previous entry, for this or any other correlator, is discarded.
    pub fn open(&mut self, correlator: &Correlator, slots: &[SlotId]) {
        self.entries.clear();
        let placeholders = slots.iter().map(|s| (s.clone(), Entry::Pending)).collect();
        self.entries.insert(correlator.clone(), placeholders);
    }

    /// Resolve `correlator`'s placeholders with fetched demand.
    ///
    /// Placeholders with a matching slot in `demand` become records; the rest
    /// are removed. Slots in `demand` that were never requested are ignored.
    /// Returns the number of records written.
    pub fn fill(&mut self, correlator: &Correlator, demand: Demand) -> usize {
        let Some(slots) = self.entries.get_mut(correlator) else {
            return 0;
        };
        let mut written = 0;
        for (slot, record) in demand {
            if let Some(entry) = slots.get_mut(&slot)
                && *entry == Entry::Pending
            {
                *entry = Entry::Ready(record);
                written += 1;
            }
        }
        slots.retain(|_, e| matches!(e, Entry::Ready(_)));
        written
    }

    /// Take `slot` out of `correlator`'s entry.
    ///
    /// A ready record is removed whether or not it is still fresh at `now`.
    /// Pending placeholders are left in place and reported as missing.
    pub fn take(
        &mut self,
        correlator: &Correlator,
        slot: &SlotId,
        now: Instant,
        expiry: Option<Duration>,
    ) -> Take {
        let Some(slots) = self.entries.get_mut(correlator) else {
            return Take::Missing;
        };
        if !matches!(slots.get(slot), Some(Entry::Ready(_))) {
            return Take::Missing;
        }
        match slots.remove(slot) {
            Some(Entry::Ready(record)) if record.is_fresh(now, expiry) => Take::Fresh(record),
            Some(Entry::Ready(_)) => Take::Expired,
            _ => Take::Missing,
        }
    }

    /// Number of ready records stored for `correlator`.
    #[must_use]
    pub fn ready_len(&self, correlator: &Correlator) -> usize {
        self.entries.get(correlator).map_or(0, |s| {
            s.values().filter(|e| matches!(e, Entry::Ready(_))).count()
        })
    }

    /// True when `correlator` has no ready records left.
    #[must_use]
    pub fn is_exhausted(&self, correlator: &Correlator) -> bool {
        self.ready_len(correlator) == 0
    }
}
