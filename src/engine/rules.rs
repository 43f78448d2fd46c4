//! Tiered ROI commission rule.
//!
//! Pure arithmetic, no I/O. ROI is truncated to 2 decimals before the tier
//! comparison; the thresholds are exactly 0.80 and 1.00 and there are
//! exactly three tiers.

use crate::domain::{Decimal, Tier};

/// Outcome of evaluating the commission rule for one advertiser-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionOutcome {
    pub roi: Decimal,
    pub tier: Tier,
    pub commission_per_order: i64,
    pub total_commission: i64,
}

/// Evaluate the tiered ROI rule over already-summed inputs.
///
/// ROI = (collected_amount_local / fx_rate) / ad_spend_usd, truncated to
/// 2 decimals. Zero spend is a defined case yielding ROI 0 and tier NONE,
/// not an error. Inputs must be the per-(advertiser, date) sums; evaluating
/// per-row and summing afterwards gives different (wrong) results.
pub fn evaluate(
    order_count: i64,
    ad_spend_usd: Decimal,
    collected_amount_local: Decimal,
    fx_rate: Decimal,
) -> CommissionOutcome {
    let roi = if ad_spend_usd.is_zero() || !fx_rate.is_positive() {
        Decimal::zero()
    } else {
        ((collected_amount_local / fx_rate) / ad_spend_usd).trunc_2()
    };

    let tier = tier_for(roi);
    let commission_per_order = tier.commission_per_order();
    CommissionOutcome {
        roi,
        tier,
        commission_per_order,
        total_commission: order_count * commission_per_order,
    }
}

fn tier_for(roi: Decimal) -> Tier {
    if roi >= Decimal::from_scaled(100, 2) {
        Tier::High
    } else if roi >= Decimal::from_scaled(80, 2) {
        Tier::Qualified
    } else {
        Tier::None
    }
}
