//! Configuration types consumed by the partner module and its gateway.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::capability::TargetingType;
use crate::error::TagbidError;

/// Targeting keys written into each slot's demand payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingKeys {
    /// Open-market price key.
    pub om_key: String,
    /// Private-market (deal) price key.
    pub pm_key: String,
    /// Ad slot id key; also used to look creatives up at render time.
    pub id_key: String,
    /// Private-market deal id key.
    pub pmid_key: String,
}

impl Default for TargetingKeys {
    fn default() -> Self {
        Self {
            om_key: "ix_karg_om".to_string(),
            pm_key: "ix_karg_pm".to_string(),
            id_key: "ix_karg_id".to_string(),
            pmid_key: "ix_karg_pmid".to_string(),
        }
    }
}

impl TargetingKeys {
    /// Apply a partial override on top of these keys.
    #[must_use]
    pub fn with_override(mut self, o: &TargetKeyOverride) -> Self {
        if let Some(k) = &o.om_key {
            self.om_key.clone_from(k);
        }
        if let Some(k) = &o.pm_key {
            self.pm_key.clone_from(k);
        }
        if let Some(k) = &o.id_key {
            self.id_key.clone_from(k);
        }
        if let Some(k) = &o.pmid_key {
            self.pmid_key.clone_from(k);
        }
        self
    }
}

/// Optional per-key replacements for [`TargetingKeys`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetKeyOverride {
    /// Replacement for the open-market key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub om_key: Option<String>,
    /// Replacement for the private-market key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm_key: Option<String>,
    /// Replacement for the ad slot id key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_key: Option<String>,
    /// Replacement for the deal id key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid_key: Option<String>,
}

impl TargetKeyOverride {
    fn validate_into(&self, problems: &mut Vec<String>) {
        let keys = [
            ("omKey", &self.om_key),
            ("pmKey", &self.pm_key),
            ("idKey", &self.id_key),
            ("pmidKey", &self.pmid_key),
        ];
        if keys.iter().all(|(_, v)| v.is_none()) {
            problems.push("targetKeyOverride must be a non-empty object".to_string());
        }
        for (name, value) in keys {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                problems.push(format!("targetKeyOverride.{name} must be a non-empty string"));
            }
        }
    }
}

/// Method used to snap a bid onto its bucket's step grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RoundingType {
    /// Keep the bid as-is (still clamped to the top bucket).
    None,
    /// Round down to the step below.
    #[default]
    Floor,
    /// Round to the nearest step.
    Nearest,
    /// Round up to the step above.
    Ceil,
}

impl TryFrom<u8> for RoundingType {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Floor),
            2 => Ok(Self::Nearest),
            3 => Ok(Self::Ceil),
            other => Err(format!("roundingType {other} must be in 0..=3")),
        }
    }
}

impl From<RoundingType> for u8 {
    fn from(t: RoundingType) -> Self {
        match t {
            RoundingType::None => 0,
            RoundingType::Floor => 1,
            RoundingType::Nearest => 2,
            RoundingType::Ceil => 3,
        }
    }
}

/// One price bucket; bids up to `max` cents are stepped by `step` cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBucket {
    /// Upper bound of the bucket in cents (inclusive).
    pub max: Decimal,
    /// Step size inside the bucket in cents.
    pub step: Decimal,
}

/// Price-bucket rounding configuration.
///
/// The bidder reports prices in its own unit; `input_cents_multiplier` turns
/// them into cents, the buckets operate on cents, and `output_cents_divisor`
/// converts the rounded value into the unit used by line-item targeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoundingConfig {
    /// Minimum acceptable bid in cents; lower bids are dropped.
    pub floor: Decimal,
    /// Multiply input bids by this to get cents.
    pub input_cents_multiplier: Decimal,
    /// Divide rounded cents by this for output.
    pub output_cents_divisor: Decimal,
    /// Decimal places in the output string.
    pub output_precision: u32,
    /// Rounding method.
    pub rounding_type: RoundingType,
    /// Buckets ordered by increasing `max`.
    pub buckets: Vec<PriceBucket>,
}

impl Default for RoundingConfig {
    fn default() -> Self {
        Self {
            floor: Decimal::ZERO,
            input_cents_multiplier: Decimal::ONE_HUNDRED,
            output_cents_divisor: Decimal::ONE_HUNDRED,
            output_precision: 2,
            rounding_type: RoundingType::Floor,
            buckets: vec![
                PriceBucket {
                    max: Decimal::from(2000),
                    step: Decimal::from(5),
                },
                PriceBucket {
                    max: Decimal::from(5000),
                    step: Decimal::from(100),
                },
            ],
        }
    }
}

impl RoundingConfig {
    fn validate_into(&self, problems: &mut Vec<String>) {
        if self.floor.is_sign_negative() {
            problems.push("roundingBuckets.floor must be a non-negative number".to_string());
        }
        if self.input_cents_multiplier <= Decimal::ZERO {
            problems.push("roundingBuckets.inputCentsMultiplier must be a positive number".to_string());
        }
        if self.output_cents_divisor <= Decimal::ZERO {
            problems.push("roundingBuckets.outputCentsDivisor must be a positive number".to_string());
        }
        if self.buckets.is_empty() {
            problems.push("roundingBuckets.buckets must be a non-empty array".to_string());
        }
        let mut prev_max = Decimal::ZERO;
        for (i, b) in self.buckets.iter().enumerate() {
            if b.step <= Decimal::ZERO {
                problems.push(format!("roundingBuckets.buckets[{i}].step must be positive"));
            }
            if b.max <= prev_max {
                problems.push(format!(
                    "roundingBuckets.buckets[{i}].max must be greater than the previous bucket"
                ));
            }
            prev_max = b.max;
        }
    }
}

/// An xSlot: a named bidder-side placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XSlot {
    /// Ad slot id understood by the bidder endpoint.
    pub ad_slot_id: String,
}

const fn default_true() -> bool {
    true
}

const fn default_expiry() -> i64 {
    -1
}

/// Static configuration of one partner module instance.
///
/// Deserializes from the orchestrator's JSON configuration block. Call
/// [`PartnerConfig::validate`] (the builders do) before using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerConfig {
    /// When set the module answers every request with empty demand.
    #[serde(default)]
    pub disabled: bool,
    /// Whether `prefetch` calls warm the cache.
    #[serde(default = "default_true")]
    pub prefetch_enabled: bool,
    /// Where targeting is applied.
    pub targeting_type: TargetingType,
    /// Bidder request timeout in milliseconds.
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    /// Orchestrator slot id to xSlot names; only the first name is requested.
    pub mapping: BTreeMap<String, Vec<String>>,
    /// xSlot definitions keyed by name.
    pub x_slots: BTreeMap<String, XSlot>,
    /// Optional targeting key overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_key_override: Option<TargetKeyOverride>,
    /// Optional price-bucket rounding; defaults apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounding_buckets: Option<RoundingConfig>,
    /// Maximum age of cached demand in milliseconds; negative disables expiry.
    #[serde(default = "default_expiry", rename = "demandExpiry")]
    pub demand_expiry_ms: i64,
}

impl PartnerConfig {
    /// Validate the configuration, collecting every problem found.
    ///
    /// # Errors
    /// Returns `TagbidError::InvalidConfig` listing all problems.
    pub fn validate(&self) -> Result<(), TagbidError> {
        let mut problems = Vec::new();

        if self.targeting_type != TargetingType::Slot {
            problems.push(format!(
                "targetingType {} is not supported",
                self.targeting_type
            ));
        }
        if self.timeout_ms == 0 {
            problems.push("timeout must be a positive number of milliseconds".to_string());
        }

        for (name, x) in &self.x_slots {
            if x.ad_slot_id.trim().is_empty() {
                problems.push(format!("xSlot {name} is missing adSlotId"));
            }
        }

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for (slot, names) in &self.mapping {
            if names.is_empty() {
                problems.push(format!("slot mappings missing or invalid for htSlot {slot}"));
                continue;
            }
            for n in names {
                if n.trim().is_empty() {
                    problems.push(format!("slot mappings missing or invalid for htSlot {slot}"));
                } else if !self.x_slots.contains_key(n) {
                    problems.push(format!("invalid xSlot {n} in mapping for htSlot {slot}"));
                } else if !seen.insert(n.as_str()) {
                    problems.push(format!("xSlot {n} mapped multiple times"));
                }
            }
        }

        if let Some(o) = &self.target_key_override {
            o.validate_into(&mut problems);
        }
        if let Some(r) = &self.rounding_buckets {
            r.validate_into(&mut problems);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TagbidError::InvalidConfig(problems))
        }
    }

    /// Demand expiry, or `None` when expiry is disabled.
    #[must_use]
    pub fn demand_expiry(&self) -> Option<Duration> {
        u64::try_from(self.demand_expiry_ms)
            .ok()
            .map(Duration::from_millis)
    }

    /// Bidder request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Effective targeting keys after applying any override.
    #[must_use]
    pub fn targeting_keys(&self) -> TargetingKeys {
        let keys = TargetingKeys::default();
        match &self.target_key_override {
            Some(o) => keys.with_override(o),
            None => keys,
        }
    }

    /// Effective rounding configuration.
    #[must_use]
    pub fn rounding(&self) -> RoundingConfig {
        self.rounding_buckets.clone().unwrap_or_default()
    }

    /// Bidder ad slot id for an orchestrator slot id.
    #[must_use]
    pub fn ad_slot_id(&self, slot: &str) -> Option<&str> {
        let first = self.mapping.get(slot)?.first()?;
        self.x_slots.get(first).map(|x| x.ad_slot_id.as_str())
    }

    /// Orchestrator slot id whose first xSlot carries `ad_slot_id`.
    #[must_use]
    pub fn slot_for_ad_slot(&self, ad_slot_id: &str) -> Option<&str> {
        self.mapping.iter().find_map(|(slot, names)| {
            let x = self.x_slots.get(names.first()?)?;
            (x.ad_slot_id == ad_slot_id).then_some(slot.as_str())
        })
    }
}
