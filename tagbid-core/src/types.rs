//! Demand domain types shared by the partner module and its gateways.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

pub use tagbid_types::{
    Analytics, GatewayKey, PartnerConfig, PriceBucket, RoundingConfig, RoundingType,
    SupportedOptions, TagbidError, TargetKeyOverride, TargetingKeys, TargetingType, XSlot,
};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&$name> for $name {
            fn from(s: &$name) -> Self {
                s.clone()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Orchestrator-side identifier for one ad placement on the page.
    SlotId
);

string_id!(
    /// Opaque identifier grouping all prefetch/consume activity for one page view.
    Correlator
);

/// Key/value targeting payload for one slot.
pub type Targeting = BTreeMap<String, String>;

/// Per-slot targeting as returned by a gateway, before timestamping.
pub type SlotDemand = BTreeMap<SlotId, Targeting>;

/// A slot's targeting payload plus the instant it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandRecord {
    timestamp: Instant,
    demand: Targeting,
}

impl DemandRecord {
    /// Create a record fetched at `timestamp`.
    #[must_use]
    pub const fn new(timestamp: Instant, demand: Targeting) -> Self {
        Self { timestamp, demand }
    }

    /// When the demand was fetched.
    #[must_use]
    pub const fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// The targeting payload.
    #[must_use]
    pub const fn demand(&self) -> &Targeting {
        &self.demand
    }

    /// Age of the record at `now`.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.timestamp)
    }

    /// Whether the record may still be served at `now`.
    ///
    /// `expiry == None` disables expiry; otherwise a record is fresh while its
    /// age does not exceed `expiry`.
    #[must_use]
    pub fn is_fresh(&self, now: Instant, expiry: Option<Duration>) -> bool {
        expiry.is_none_or(|max| self.age(now) <= max)
    }
}

/// Slot-level demand answer: slot id to demand record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Demand {
    slots: BTreeMap<SlotId, DemandRecord>,
}

impl Demand {
    /// Empty demand.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp gateway output with a single fetch instant.
    #[must_use]
    pub fn stamped(demand: SlotDemand, at: Instant) -> Self {
        let slots = demand
            .into_iter()
            .map(|(slot, targeting)| (slot, DemandRecord::new(at, targeting)))
            .collect();
        Self { slots }
    }

    /// Insert a record, returning the previous record for the slot if any.
    pub fn insert(&mut self, slot: SlotId, record: DemandRecord) -> Option<DemandRecord> {
        self.slots.insert(slot, record)
    }

    /// Record for `slot`, if present.
    #[must_use]
    pub fn get(&self, slot: &str) -> Option<&DemandRecord> {
        self.slots.get(slot)
    }

    /// Whether demand exists for `slot`.
    #[must_use]
    pub fn contains(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    /// Number of slots with demand.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no slot has demand.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot ids with demand, in order.
    pub fn slot_ids(&self) -> impl Iterator<Item = &SlotId> {
        self.slots.keys()
    }

    /// Iterate over `(slot, record)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&SlotId, &DemandRecord)> {
        self.slots.iter()
    }
}

impl IntoIterator for Demand {
    type Item = (SlotId, DemandRecord);
    type IntoIter = std::collections::btree_map::IntoIter<SlotId, DemandRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

/// Answer to one demand request.
///
/// Wraps the slot-level `demand` and any non-fatal `warnings`, such as a
/// failed fetch for slots that could not be served from the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemandReport {
    /// Slot-level demand.
    pub demand: Demand,
    /// Non-fatal issues encountered while building the report.
    pub warnings: Vec<TagbidError>,
}

impl DemandReport {
    /// Report carrying `demand` and no warnings.
    #[must_use]
    pub const fn new(demand: Demand) -> Self {
        Self {
            demand,
            warnings: Vec::new(),
        }
    }

    /// True when the report carries no warnings.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Lifecycle of the single active prefetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrefetchState {
    /// No prefetch has been started yet.
    #[default]
    New,
    /// A prefetch fetch is outstanding for the current correlator.
    InProgress,
    /// The prefetch completed; cached demand may be consumed.
    Ready,
    /// Every cached record of the current correlator was consumed or expired.
    Used,
}

impl PrefetchState {
    /// Stable identifier for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in-progress",
            Self::Ready => "ready",
            Self::Used => "used",
        }
    }
}

impl fmt::Display for PrefetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
