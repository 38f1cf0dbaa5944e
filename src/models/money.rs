use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Largest amount accepted from a request body, in rupees.
pub const MAX_RUPEES: i64 = 10_000_000_000;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount {0} is out of range")]
    OutOfRange(Money),
}

/// Rupee amount, always held at paise precision.
///
/// Construction rounds half-up to two decimal places so client-side estimates and
/// stored values agree to the paisa. Serialized as a JSON number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn from_paise(paise: i64) -> Self {
        Self(Decimal::new(paise, 2))
    }

    pub const fn from_paise_const(paise: u32) -> Self {
        Self(Decimal::from_parts(paise, 0, 0, false, 2))
    }

    pub fn rupees(rupees: i64) -> Self {
        Self(Decimal::from(rupees))
    }

    /// Storage representation.
    ///
    /// # Errors
    ///
    /// [`MoneyError::OutOfRange`] if the amount does not fit in `i64` paise.
    pub fn paise(&self) -> Result<i64, MoneyError> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|paise| paise.trunc().to_i64())
            .ok_or(MoneyError::OutOfRange(*self))
    }

    /// Whether the amount lies within `±MAX_RUPEES`.
    pub fn is_within_limit(&self) -> bool {
        self.0.abs() <= Decimal::from(MAX_RUPEES)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn times(&self, quantity: u32) -> Self {
        Self::new(self.0 * Decimal::from(quantity))
    }

    /// `percent`% of this amount, rounded half-up to the paisa.
    pub fn percent(&self, percent: u32) -> Self {
        Self::new(self.0 * Decimal::from(percent) / Decimal::ONE_HUNDRED)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = rust_decimal::serde::float::deserialize(deserializer)?;
        let money = Money::new(amount);
        if !money.is_within_limit() {
            return Err(D::Error::custom(format!(
                "amount {amount} exceeds the limit of {MAX_RUPEES} rupees"
            )));
        }
        Ok(money)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up_to_paise() {
        assert_eq!(Money::new(Decimal::new(12345, 3)), Money::from_paise(1235));
        assert_eq!(Money::new(Decimal::new(12344, 3)), Money::from_paise(1234));
    }

    #[test]
    fn paise_round_trips_through_storage() {
        let m = Money::new(Decimal::new(4990, 2));
        assert_eq!(m.paise(), Ok(4990));
        assert_eq!(Money::from_paise(m.paise().unwrap()), m);
    }

    #[test]
    fn paise_conversion_fails_beyond_storage_range() {
        let huge = Money::new(Decimal::from_i128_with_scale(10i128.pow(27), 0));
        assert_eq!(huge.paise(), Err(MoneyError::OutOfRange(huge)));

        let just_over = Money::from_paise(i64::MAX) + Money::from_paise(1);
        assert!(just_over.paise().is_err());
        assert_eq!(Money::from_paise(i64::MAX).paise(), Ok(i64::MAX));
    }

    #[test]
    fn oversized_amounts_are_rejected_when_deserialized() {
        assert!(serde_json::from_str::<Money>("1e27").is_err());
        assert!(serde_json::from_str::<Money>("1e17").is_err());
        assert!(serde_json::from_str::<Money>("-1e17").is_err());

        let limit: Money = serde_json::from_str("10000000000").unwrap();
        assert_eq!(limit, Money::rupees(MAX_RUPEES));
        assert!(serde_json::from_str::<Money>("10000000000.01").is_err());
    }

    #[test]
    fn serializes_as_json_number() {
        let json = serde_json::to_string(&Money::from_paise(4990)).unwrap();
        assert_eq!(json, "49.9");
        let back: Money = serde_json::from_str("120").unwrap();
        assert_eq!(back, Money::rupees(120));
    }

    #[test]
    fn display_uses_rupee_sign() {
        assert_eq!(Money::from_paise(50).to_string(), "₹0.50");
    }
}
