//! Pricing synthesis: cost → list price → competitor price set → profit.
//!
//! The whole computation is pure and reproducible: given the same cost,
//! seed, and configuration it always produces the same quote. Competitor
//! draws use a seeded [`StdRng`]; callers that need auditability thread an
//! explicit seed through, production paths may derive one from the job id.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::competitors::CompetitorBand;

/// Draw resolution for competitor multipliers. A draw is an integer in
/// `0..=DRAW_STEPS` lerped across the band, so the arithmetic stays in
/// `Decimal` end to end.
const DRAW_STEPS: u32 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    /// A quote can never be computed from a non-positive cost; callers must
    /// reject the record rather than coerce the cost.
    #[error("cost must be positive, got {cost}")]
    NonPositiveCost { cost: Decimal },
}

/// Classification of a quote against the configured profit threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitStatus {
    Profitable,
    BelowThreshold,
}

impl ProfitStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProfitStatus::Profitable => "profitable",
            ProfitStatus::BelowThreshold => "below_threshold",
        }
    }
}

impl std::fmt::Display for ProfitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profitable" => Ok(ProfitStatus::Profitable),
            "below_threshold" => Ok(ProfitStatus::BelowThreshold),
            other => Err(format!("unknown profit status: {other:?}")),
        }
    }
}

/// One synthesized competitor price.
///
/// `clamped` records that the raw draw fell below the minimum-markup floor
/// and was raised to it; the competitor is kept either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorPrice {
    pub competitor: String,
    pub price: Decimal,
    #[serde(default)]
    pub clamped: bool,
}

/// A fully derived price quote. Not persisted on its own; recomputable from
/// `(cost, seed, config)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub cost: Decimal,
    pub list_price: Decimal,
    pub competitor_prices: Vec<CompetitorPrice>,
    pub compare_at_price: Decimal,
    pub profit_amount: Decimal,
    pub profit_percent: Decimal,
    pub profit_status: ProfitStatus,
}

/// Tunables for the synthesis engine. Defaults match the documented policy:
/// 70% markup, 1.10× competitor floor, 30% profit threshold.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Multiplier from cost to list price.
    pub markup_multiplier: Decimal,
    /// Competitor prices are floored at `list_price × minimum_markup`.
    pub minimum_markup: Decimal,
    /// Profit-percent threshold for the `profitable` classification.
    pub minimum_profit_percent: Decimal,
    pub competitors: Vec<CompetitorBand>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            markup_multiplier: Decimal::new(170, 2),
            minimum_markup: Decimal::new(110, 2),
            minimum_profit_percent: Decimal::from(30),
            competitors: CompetitorBand::defaults(),
        }
    }
}

impl PricingConfig {
    /// Replaces the markup multiplier with one derived from a percentage
    /// (e.g. `70` → `1.70`), as accepted on the batch-submission surface.
    #[must_use]
    pub fn with_markup_percent(mut self, percent: Decimal) -> Self {
        self.markup_multiplier = Decimal::ONE + percent / Decimal::from(100);
        self
    }
}

/// Rounds to two decimal places, midpoints away from zero (currency rounding).
#[must_use]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes the full price quote for a cost.
///
/// Steps, in order: validate `cost > 0`; derive the list price from the
/// markup multiplier; draw one multiplier per configured competitor from its
/// `[min, max]` band (seeded, reproducible) and clamp the resulting price up
/// to the minimum-markup floor when needed; take the highest competitor
/// price as compare-at; derive profit amount/percent and classify.
///
/// # Errors
///
/// Returns [`PricingError::NonPositiveCost`] for `cost ≤ 0`.
pub fn calculate_all_prices(
    cost: Decimal,
    seed: u64,
    config: &PricingConfig,
) -> Result<PriceQuote, PricingError> {
    if cost <= Decimal::ZERO {
        return Err(PricingError::NonPositiveCost { cost });
    }

    let list_price = round2(cost * config.markup_multiplier);
    let floor = round2(list_price * config.minimum_markup);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut competitor_prices = Vec::with_capacity(config.competitors.len());
    for band in &config.competitors {
        let step = rng.random_range(0..=DRAW_STEPS);
        let t = Decimal::from(step) / Decimal::from(DRAW_STEPS);
        let multiplier = band.min_multiplier + (band.max_multiplier - band.min_multiplier) * t;
        let raw = round2(list_price * multiplier);

        let clamped = raw < floor;
        competitor_prices.push(CompetitorPrice {
            competitor: band.name.clone(),
            price: if clamped { floor } else { raw },
            clamped,
        });
    }

    let compare_at_price = competitor_prices
        .iter()
        .map(|c| c.price)
        .max()
        .unwrap_or(list_price);

    let profit_amount = round2(list_price - cost);
    let profit_percent = round2(profit_amount / cost * Decimal::from(100));
    let profit_status = if profit_percent >= config.minimum_profit_percent {
        ProfitStatus::Profitable
    } else {
        ProfitStatus::BelowThreshold
    };

    Ok(PriceQuote {
        cost,
        list_price,
        competitor_prices,
        compare_at_price,
        profit_amount,
        profit_percent,
        profit_status,
    })
}

#[cfg(test)]
#[path = "pricing_test.rs"]
mod tests;
