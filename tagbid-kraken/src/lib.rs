//! tagbid-kraken
//!
//! `DemandGateway` implementation for the Kraken bid endpoint. Maps
//! orchestrator slots to bidder ad slots, attaches cookie ids, turns each bid
//! into slot targeting with price-bucket rounding, and keeps the returned
//! creatives for rendering.
#![warn(missing_docs)]

/// Transport definitions and the production adapter backed by `reqwest`.
pub mod adapter;
mod builder;
/// Creative markup storage and lookup.
pub mod creatives;
pub mod ids;
pub mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

#[cfg(not(feature = "test-adapters"))]
use adapter::RealAdapter;
use adapter::KrakenTransport;
pub use builder::KrakenConnectorBuilder;
use creatives::CreativeStore;
use ids::{CookieSource, KargoIds};
use tagbid_core::connector::{DemandGateway, GatewayKey};
use tagbid_core::{
    BidRounder, PartnerConfig, SlotDemand, SlotId, TagbidError, Targeting, TargetingKeys,
};
use wire::{BidRequest, BidResponse};

pub(crate) const GATEWAY_NAME: &str = "tagbid-kraken";

/// Host used when the builder is not given one.
pub const DEFAULT_HOST: &str = "https://kraken.dev.kargo.com";

const BID_PATH: &str = "api/v1/bid";

// Characters escaped by JavaScript's encodeURIComponent.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[cfg(feature = "test-adapters")]
type TransportAdapter = Arc<dyn KrakenTransport>;
#[cfg(not(feature = "test-adapters"))]
type TransportAdapter = Arc<RealAdapter>;

/// Gateway against the Kraken bid endpoint.
///
/// Construct with [`KrakenConnector::builder`].
pub struct KrakenConnector {
    host: Url,
    transport: TransportAdapter,
    cookies: Arc<dyn CookieSource>,
    cfg: PartnerConfig,
    keys: TargetingKeys,
    rounder: BidRounder,
    creatives: CreativeStore,
}

impl KrakenConnector {
    /// Static gateway key.
    pub const KEY: GatewayKey = GatewayKey::new(GATEWAY_NAME);

    /// Start building a connector for a partner configuration.
    #[must_use]
    pub fn builder(cfg: PartnerConfig) -> KrakenConnectorBuilder {
        KrakenConnectorBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        host: Url,
        transport: TransportAdapter,
        cookies: Arc<dyn CookieSource>,
        cfg: PartnerConfig,
    ) -> Self {
        let keys = cfg.targeting_keys();
        let rounder = BidRounder::new(cfg.rounding());
        Self {
            host,
            transport,
            cookies,
            cfg,
            keys,
            rounder,
            creatives: CreativeStore::new(),
        }
    }

    /// Bid endpoint host.
    #[must_use]
    pub const fn host(&self) -> &Url {
        &self.host
    }

    /// Targeting keys written into each slot's demand.
    #[must_use]
    pub const fn targeting_keys(&self) -> &TargetingKeys {
        &self.keys
    }

    /// Creatives received so far.
    #[must_use]
    pub const fn creatives(&self) -> &CreativeStore {
        &self.creatives
    }

    /// Markup to render for a won slot of `width` x `height`.
    #[must_use]
    pub fn render(&self, targeting: &Targeting, width: u32, height: u32) -> Option<String> {
        self.creatives
            .render(targeting, &self.keys.id_key, width, height)
    }

    /// Ids read from the current cookies.
    #[must_use]
    pub fn kargo_ids(&self) -> KargoIds {
        KargoIds::from_cookies(self.cookies.as_ref())
    }

    /// Bidder ad slot ids for a batch of orchestrator slots; unmapped slots are skipped.
    #[must_use]
    pub fn ad_slot_ids<'a>(&'a self, slots: &[SlotId]) -> Vec<&'a str> {
        slots
            .iter()
            .filter_map(|s| self.cfg.ad_slot_id(s.as_str()))
            .collect()
    }

    /// Full request URL for `ad_slot_ids`.
    ///
    /// # Errors
    /// Returns `TagbidError::Other` if the request document cannot be serialized
    /// and `TagbidError::InvalidArg` if the host cannot carry the bid path.
    pub fn request_url(&self, ad_slot_ids: &[&str], ids: &KargoIds) -> Result<Url, TagbidError> {
        let req = BidRequest {
            timeout: self.cfg.timeout_ms,
            ad_slot_ids: ad_slot_ids.to_vec(),
            kargo_ids: ids,
        };
        let json = serde_json::to_string(&req).map_err(|e| TagbidError::Other(e.to_string()))?;
        let mut url = self
            .host
            .join(BID_PATH)
            .map_err(|e| TagbidError::invalid_arg(format!("bid url: {e}")))?;
        let encoded = utf8_percent_encode(&json, URI_COMPONENT);
        url.set_query(Some(&format!("json={encoded}")));
        Ok(url)
    }

    /// Turn a bid response into slot demand and store its creatives.
    ///
    /// Ad slots that map back to no orchestrator slot, and bids the rounder
    /// rejects, produce no demand.
    pub fn absorb(&self, response: BidResponse) -> SlotDemand {
        let mut demand = SlotDemand::new();
        for (ad_slot_id, bid) in response {
            if let Some(adm) = &bid.adm {
                self.creatives.insert(&ad_slot_id, bid.size(), adm.clone());
            }

            let Some(slot) = self.cfg.slot_for_ad_slot(&ad_slot_id) else {
                #[cfg(feature = "tracing")]
                tracing::debug!(ad_slot_id = %ad_slot_id, "dropping bid for unmapped ad slot");
                continue;
            };
            let Some(price) = self.rounder.transform(bid.cpm) else {
                #[cfg(feature = "tracing")]
                tracing::debug!(ad_slot_id = %ad_slot_id, cpm = %bid.cpm, "bid rejected by price rounding");
                continue;
            };

            let value = format!("{}{price}", bid.targeting_prefix);
            let mut targeting = Targeting::new();
            targeting.insert(self.keys.id_key.clone(), ad_slot_id.clone());
            if let Some(deal) = bid.deal_id() {
                targeting.insert(self.keys.pm_key.clone(), value);
                targeting.insert(self.keys.pmid_key.clone(), deal.to_string());
            } else {
                targeting.insert(self.keys.om_key.clone(), value);
            }
            demand.insert(SlotId::new(slot), targeting);
        }
        demand
    }
}

#[async_trait]
impl DemandGateway for KrakenConnector {
    fn name(&self) -> &'static str {
        GATEWAY_NAME
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "tagbid_kraken::fetch_demand",
            skip_all,
            fields(slots = slots.len()),
        )
    )]
    async fn fetch_demand(&self, slots: &[SlotId]) -> Result<SlotDemand, TagbidError> {
        let ad_slot_ids = self.ad_slot_ids(slots);
        if ad_slot_ids.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::debug!("no mapped ad slots; skipping request");
            return Ok(SlotDemand::new());
        }

        let ids = self.kargo_ids();
        let url = self.request_url(&ad_slot_ids, &ids)?;
        let body = self.transport.get(&url).await?;
        let response: BidResponse = serde_json::from_str(&body)
            .map_err(|e| TagbidError::malformed(GATEWAY_NAME, e.to_string()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(bids = response.len(), "bid response parsed");
        Ok(self.absorb(response))
    }
}
