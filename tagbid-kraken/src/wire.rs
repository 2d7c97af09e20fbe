//! Kraken request and response payloads.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::KargoIds;

/// JSON document carried in the `json` query parameter of a bid request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BidRequest<'a> {
    /// Request timeout in milliseconds.
    pub timeout: u64,
    /// Bidder-side ad slot ids being requested.
    #[serde(rename = "adSlotIDs")]
    pub ad_slot_ids: Vec<&'a str>,
    /// User and sync ids read from cookies.
    #[serde(rename = "kargoIDs")]
    pub kargo_ids: &'a KargoIds,
}

/// One ad slot's bid as answered by Kraken.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSlotBid {
    /// Raw bid price in the bidder's unit.
    pub cpm: Decimal,
    /// Targeting value prefix; its part before the first `_` is the creative size.
    pub targeting_prefix: String,
    /// Private-market deal id, when the bid belongs to a deal.
    #[serde(default)]
    pub targeting_custom: Option<String>,
    /// Creative markup.
    #[serde(default)]
    pub adm: Option<String>,
}

impl AdSlotBid {
    /// Deal id, treating an empty value as absent.
    #[must_use]
    pub fn deal_id(&self) -> Option<&str> {
        self.targeting_custom.as_deref().filter(|d| !d.is_empty())
    }

    /// Creative size key, e.g. `300x250` for prefix `300x250_`.
    #[must_use]
    pub fn size(&self) -> &str {
        self.targeting_prefix
            .split('_')
            .next()
            .unwrap_or(&self.targeting_prefix)
    }
}

/// Response body: ad slot id to bid. Ad slots without demand are absent.
pub type BidResponse = BTreeMap<String, AdSlotBid>;
