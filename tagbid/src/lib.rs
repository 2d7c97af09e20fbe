//! tagbid: a header-bidding partner module with a demand prefetch cache.
//!
//! Overview
//! - `Partner::prefetch` warms a correlator-scoped cache with one gateway
//!   call when the page loads.
//! - `Partner::resolve` answers each auction from the cache first and
//!   fetches only the slots the cache cannot serve.
//! - A resolve that overlaps an in-progress prefetch waits for it instead of
//!   fetching the same slots again, and is replayed in arrival order once the
//!   prefetch settles.
//!
//! Key behaviors
//! - Every cached record is delivered at most once, then removed.
//! - Records older than `demandExpiry` are dropped and refetched.
//! - Slots claimed by a waiting resolve are reserved for it; other callers
//!   fetch those slots fresh.
//! - A resolve for a correlator other than the current one never touches the
//!   cache.
//! - A failed prefetch leaves an empty, ready cache; later resolves fetch on
//!   demand.
//! - Starting a prefetch while another is in progress supersedes it: its
//!   waiting resolves are replayed against the new cycle and its results are
//!   discarded.
//!
//! Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagbid::Partner;
//!
//! let partner = Partner::builder()
//!     .config(cfg)
//!     .gateway(Arc::new(gateway))
//!     .build()?;
//!
//! partner.prefetch("page-1", ["top", "side"]);
//! let report = partner.resolve("page-1", ["top"]).await?;
//! for (slot, record) in report.demand.iter() {
//!     println!("{slot}: {:?}", record.demand());
//! }
//! ```
#![warn(missing_docs)]

pub(crate) mod core;
/// Prefetch lifecycle, claims, and the deferred-call queue.
pub mod prefetch;
/// Reconciliation of cache hits with fresh fetches.
pub mod reconcile;
mod scheduler;
/// Correlator-scoped demand storage.
pub mod store;

pub use crate::core::{Partner, PartnerBuilder};
pub use prefetch::{CycleId, DeferredCall, PrefetchController, Started, Ticket};
pub use reconcile::{Admission, Draw};
pub use store::{DemandStore, Take};

pub use tagbid_core::{
    Analytics, BidRounder, Clock, Correlator, Demand, DemandGateway, DemandRecord, DemandReport,
    NoopObserver, PartnerConfig, PrefetchHandle, PrefetchObserver, PrefetchState, SlotDemand,
    SlotId, SupportedOptions, TagbidError, Targeting, TargetingType, TokioClock,
};
