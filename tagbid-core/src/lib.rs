//! tagbid-core
//!
//! Core types, traits, and utilities shared across the tagbid workspace.
//!
//! - `types`: slot ids, correlators, demand records and reports.
//! - `connector`: the `DemandGateway` network boundary and the prefetch observer hook.
//! - `clock`: the time source used for stamping and expiry.
//! - `pricing`: price-bucket rounding applied to raw bidder prices.
//!
//! Async runtime (Tokio)
//! ---------------------
//! Demand records are stamped with `tokio::time::Instant`, and
//! `handle::PrefetchHandle` wraps a `tokio::task::JoinHandle<()>`. Code that
//! prefetches must run under a Tokio 1.x runtime.
#![warn(missing_docs)]

/// Time source abstraction.
pub mod clock;
/// Gateway and observer boundary traits.
pub mod connector;
/// Prefetch task handle.
pub mod handle;
pub mod pricing;
pub mod types;

pub use clock::{Clock, TokioClock};
pub use connector::{DemandGateway, NoopObserver, PrefetchObserver};
pub use handle::PrefetchHandle;
pub use pricing::BidRounder;
pub use types::*;
