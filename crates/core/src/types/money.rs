//! Monetary amounts using decimal arithmetic.
//!
//! The store sells in Egyptian pounds only, so `Money` carries no currency
//! field. Amounts come from the backend as decimal strings (or numbers) and
//! are never converted through floating point.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO 4217 code of the store currency.
pub const CURRENCY_CODE: &str = "EGP";

/// An amount of money in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero pounds.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build an amount from whole piastres (1/100 pound).
    #[must_use]
    pub fn from_piastres(piastres: i64) -> Self {
        Self(Decimal::new(piastres, 2))
    }

    /// Returns the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply a unit price by a quantity, saturating at the largest
    /// representable amount.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(quantity)))
    }

    /// Subtract, clamping at zero. Discounts never make a total negative.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Amount rounded to two decimal places, formatted with thousands
    /// separators and no currency suffix (e.g. `"1,250.00"`).
    #[must_use]
    pub fn format_amount(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let text = format!("{rounded:.2}");
        let (sign, unsigned) = text
            .strip_prefix('-')
            .map_or(("", text.as_str()), |rest| ("-", rest));
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        format!("{sign}{grouped}.{fraction}")
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {CURRENCY_CODE}", self.format_amount())
    }
}

impl Add for Money {
    type Output = Self;

    /// Saturates instead of panicking on overflow.
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_times_quantity() {
        let unit = Money::from_piastres(125_050);
        assert_eq!(unit.times(3), Money::from_piastres(375_150));
        assert_eq!(unit.times(0), Money::ZERO);
    }

    #[test]
    fn test_overflow_saturates() {
        let huge = Money::new(Decimal::MAX);
        assert_eq!(huge.times(2), huge);
        assert_eq!(huge + Money::from_piastres(100), huge);
        assert_eq!([huge, huge].into_iter().sum::<Money>(), huge);
    }

    #[test]
    fn test_saturating_sub_clamps_at_zero() {
        let total = Money::from_piastres(10_000);
        assert_eq!(
            total.saturating_sub(Money::from_piastres(2_500)),
            Money::from_piastres(7_500)
        );
        assert_eq!(total.saturating_sub(Money::from_piastres(20_000)), Money::ZERO);
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_piastres(125_000).to_string(), "1,250.00 EGP");
        assert_eq!(Money::from_piastres(99).to_string(), "0.99 EGP");
        assert_eq!(Money::from_piastres(123_456_789).to_string(), "1,234,567.89 EGP");
        assert_eq!(Money::ZERO.to_string(), "0.00 EGP");
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_piastres(100), Money::from_piastres(250)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_piastres(350));
    }

    #[test]
    fn test_deserialize_string_and_number() {
        let from_str: Money = serde_json::from_str("\"1250.50\"").unwrap();
        let from_num: Money = serde_json::from_str("1250.5").unwrap();
        assert_eq!(from_str, Money::from_piastres(125_050));
        assert_eq!(from_num, from_str);
    }
}
