//! Delivery-fee bands and cart totals.
//!
//! The fee is a percentage of the subtotal picked from a fixed table of bands.
//! Orders of ₹500 and above ship free, which makes the grand total drop at that
//! boundary: a ₹499 cart costs ₹548.90 while a ₹500 cart costs ₹500.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::money::MAX_RUPEES;
use crate::models::Money;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("subtotal cannot be negative (got {0})")]
    NegativeSubtotal(Money),
    #[error("subtotal {0} exceeds the limit of {max} rupees", max = MAX_RUPEES)]
    SubtotalTooLarge(Money),
}

#[derive(Debug, Clone, Copy)]
struct FeeBand {
    ceiling: Money,
    inclusive: bool,
    percent: u32,
}

impl FeeBand {
    fn contains(&self, subtotal: Money) -> bool {
        if self.inclusive {
            subtotal <= self.ceiling
        } else {
            subtotal < self.ceiling
        }
    }
}

const FEE_BANDS: [FeeBand; 3] = [
    FeeBand { ceiling: Money::from_paise_const(200_00), inclusive: true, percent: 40 },
    FeeBand { ceiling: Money::from_paise_const(400_00), inclusive: true, percent: 20 },
    FeeBand { ceiling: Money::from_paise_const(500_00), inclusive: false, percent: 10 },
];

/// Subtotal at which delivery becomes free.
pub const FREE_DELIVERY_THRESHOLD: Money = Money::from_paise_const(500_00);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total_amount: Money,
    /// Percentage applied to the subtotal; 0 for empty carts and free delivery.
    pub fee_percent: u32,
    /// How much more the customer must add to reach free delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_to_free_delivery: Option<Money>,
}

fn fee_percent(subtotal: Money) -> u32 {
    if !subtotal.is_positive() {
        return 0;
    }
    FEE_BANDS
        .iter()
        .find(|band| band.contains(subtotal))
        .map_or(0, |band| band.percent)
}

pub fn delivery_fee(subtotal: Money) -> Result<Money, PricingError> {
    quote(subtotal).map(|b| b.delivery_fee)
}

/// Price a subtotal: delivery fee and grand total.
///
/// # Errors
///
/// Returns `PricingError::NegativeSubtotal` for amounts below zero and
/// `PricingError::SubtotalTooLarge` beyond [`MAX_RUPEES`].
pub fn quote(subtotal: Money) -> Result<PriceBreakdown, PricingError> {
    if subtotal.is_negative() {
        return Err(PricingError::NegativeSubtotal(subtotal));
    }
    if !subtotal.is_within_limit() {
        return Err(PricingError::SubtotalTooLarge(subtotal));
    }

    let percent = fee_percent(subtotal);
    let delivery_fee = subtotal.percent(percent);
    let amount_to_free_delivery = (subtotal.is_positive() && subtotal < FREE_DELIVERY_THRESHOLD)
        .then(|| FREE_DELIVERY_THRESHOLD - subtotal);

    Ok(PriceBreakdown {
        subtotal,
        delivery_fee,
        total_amount: subtotal + delivery_fee,
        fee_percent: percent,
        amount_to_free_delivery,
    })
}

/// Prefer the server-confirmed figures over a local estimate. Divergence is logged.
pub fn reconcile(estimate: &PriceBreakdown, confirmed: PriceBreakdown) -> PriceBreakdown {
    if estimate.total_amount != confirmed.total_amount
        || estimate.delivery_fee != confirmed.delivery_fee
    {
        tracing::warn!(
            estimated_total = %estimate.total_amount,
            confirmed_total = %confirmed.total_amount,
            estimated_fee = %estimate.delivery_fee,
            confirmed_fee = %confirmed.delivery_fee,
            "local price estimate diverged from server"
        );
    }
    confirmed
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 0, 0)]
    #[case(150_00, 60_00, 210_00)]
    #[case(200_00, 80_00, 280_00)]
    #[case(201_00, 40_20, 241_20)]
    #[case(300_00, 60_00, 360_00)]
    #[case(400_00, 80_00, 480_00)]
    #[case(450_00, 45_00, 495_00)]
    #[case(499_00, 49_90, 548_90)]
    #[case(499_99, 50_00, 549_99)]
    #[case(500_00, 0, 500_00)]
    #[case(1250_00, 0, 1250_00)]
    fn fee_bands(#[case] subtotal: i64, #[case] fee: i64, #[case] total: i64) {
        let breakdown = quote(Money::from_paise(subtotal)).unwrap();
        assert_eq!(breakdown.delivery_fee, Money::from_paise(fee));
        assert_eq!(breakdown.total_amount, Money::from_paise(total));
    }

    #[test]
    fn small_fractional_subtotal_uses_first_band() {
        let breakdown = quote(Money::from_paise(50)).unwrap();
        assert_eq!(breakdown.fee_percent, 40);
        assert_eq!(breakdown.delivery_fee, Money::from_paise(20));
    }

    #[test]
    fn fee_rounds_half_up_to_paise() {
        // 40% of ₹0.01 is 0.4 paise -> 0; 40% of ₹1.25 is 50 paise exactly; 10% of ₹401.05 = 40.105 -> 40.11
        assert_eq!(delivery_fee(Money::from_paise(1)).unwrap(), Money::ZERO);
        assert_eq!(delivery_fee(Money::from_paise(125)).unwrap(), Money::from_paise(50));
        assert_eq!(delivery_fee(Money::from_paise(401_05)).unwrap(), Money::from_paise(40_11));
    }

    #[test]
    fn total_is_not_monotonic_at_free_delivery_edge() {
        let just_below = quote(Money::rupees(499)).unwrap();
        let at_threshold = quote(Money::rupees(500)).unwrap();
        assert!(just_below.total_amount > at_threshold.total_amount);
    }

    #[test]
    fn negative_subtotal_is_rejected() {
        let err = quote(Money::from_paise(-1)).unwrap_err();
        assert_eq!(err, PricingError::NegativeSubtotal(Money::from_paise(-1)));
    }

    #[test]
    fn subtotal_beyond_limit_is_rejected() {
        let huge = Money::rupees(i64::MAX);
        assert_eq!(quote(huge).unwrap_err(), PricingError::SubtotalTooLarge(huge));

        let at_limit = quote(Money::rupees(MAX_RUPEES)).unwrap();
        assert_eq!(at_limit.delivery_fee, Money::ZERO);
        assert_eq!(at_limit.total_amount, Money::rupees(MAX_RUPEES));
    }

    #[test]
    fn reports_distance_to_free_delivery() {
        assert_eq!(
            quote(Money::rupees(450)).unwrap().amount_to_free_delivery,
            Some(Money::rupees(50))
        );
        assert_eq!(quote(Money::rupees(500)).unwrap().amount_to_free_delivery, None);
        assert_eq!(quote(Money::ZERO).unwrap().amount_to_free_delivery, None);
    }

    #[test]
    fn reconcile_keeps_server_figures() {
        let estimate = quote(Money::rupees(300)).unwrap();
        let mut confirmed = estimate;
        confirmed.delivery_fee = Money::from_paise(60_01);
        confirmed.total_amount = Money::from_paise(360_01);
        assert_eq!(reconcile(&estimate, confirmed), confirmed);
    }
}
