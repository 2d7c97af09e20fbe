//! Price-bucket rounding of raw bidder prices into line-item targeting values.
//!
//! A raw price is converted to cents, dropped if below the configured floor,
//! snapped onto the step grid of the bucket it falls into, clamped to the top
//! bucket, and finally formatted in the output unit with a fixed precision.

use rust_decimal::{Decimal, RoundingStrategy};
use tagbid_types::{PriceBucket, RoundingConfig, RoundingType};

/// Applies a [`RoundingConfig`] to raw bidder prices.
#[derive(Debug, Clone)]
pub struct BidRounder {
    cfg: RoundingConfig,
}

impl Default for BidRounder {
    fn default() -> Self {
        Self::new(RoundingConfig::default())
    }
}

impl BidRounder {
    /// Create a rounder for `cfg`.
    #[must_use]
    pub const fn new(cfg: RoundingConfig) -> Self {
        Self { cfg }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &RoundingConfig {
        &self.cfg
    }

    /// Round a raw price and format it for targeting.
    ///
    /// Returns `None` for negative prices, prices under the floor, and when the
    /// output divisor is zero.
    #[must_use]
    pub fn transform(&self, price: Decimal) -> Option<String> {
        let cents = price.checked_mul(self.cfg.input_cents_multiplier)?;
        if cents.is_sign_negative() || cents < self.cfg.floor {
            return None;
        }
        let rounded = self.round_cents(cents);
        let out = rounded.checked_div(self.cfg.output_cents_divisor)?;
        let precision = self.cfg.output_precision;
        let out = out.round_dp_with_strategy(precision, RoundingStrategy::ToZero);
        Some(format!("{:.*}", precision as usize, out))
    }

    /// Snap `cents` onto its bucket's grid, clamping to the top bucket.
    #[must_use]
    pub fn round_cents(&self, cents: Decimal) -> Decimal {
        let mut lower = Decimal::ZERO;
        for bucket in &self.cfg.buckets {
            if cents <= bucket.max {
                return snap(cents, lower, bucket, self.cfg.rounding_type);
            }
            lower = bucket.max;
        }
        self.cfg.buckets.last().map_or(cents, |b| b.max)
    }
}

fn snap(cents: Decimal, lower: Decimal, bucket: &PriceBucket, ty: RoundingType) -> Decimal {
    if bucket.step <= Decimal::ZERO {
        return cents;
    }
    let steps = (cents - lower) / bucket.step;
    let steps = match ty {
        RoundingType::None => return cents,
        RoundingType::Floor => steps.floor(),
        RoundingType::Nearest => steps.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        RoundingType::Ceil => steps.ceil(),
    };
    (lower + steps * bucket.step).min(bucket.max)
}
