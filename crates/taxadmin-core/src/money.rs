//! # Exact Currency Amounts
//!
//! [`Money`] wraps a `rust_decimal::Decimal` normalized to two fractional
//! digits. It parses from strings and integers only; JSON floats are
//! rejected at deserialization so no amount ever round-trips through `f64`.
//!
//! Values are signed. Ledger balances may be negative (a credit position);
//! input boundaries call [`Money::positive`] or [`Money::non_negative`].

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Number of fractional digits carried by every amount.
pub const SCALE: u32 = 2;

/// Largest magnitude representable in a `NUMERIC(14,2)` column.
fn column_max() -> Decimal {
    Decimal::new(99_999_999_999_999, SCALE)
}

/// An exact currency amount with two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, SCALE));

    /// Build from a decimal, rounding half away from zero to two places.
    pub fn from_decimal(value: Decimal) -> Self {
        let mut rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(SCALE);
        Self(rounded)
    }

    /// Build from an integer number of minor units (cents).
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, SCALE))
    }

    /// Build from a whole number of major units.
    pub fn from_major(major: i64) -> Self {
        Self::from_decimal(Decimal::from(major))
    }

    /// Parse a decimal string such as `"150"`, `"150.5"` or `"-20.00"`.
    ///
    /// More than two fractional digits is an error rather than a silent
    /// rounding, as is anything outside the `NUMERIC(14,2)` range.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidAmount(input.to_string()));
        }
        let value = Decimal::from_str(trimmed)
            .map_err(|_| ValidationError::InvalidAmount(input.to_string()))?;
        if value.normalize().scale() > SCALE {
            return Err(ValidationError::InvalidAmount(input.to_string()));
        }
        if value.abs() > column_max() {
            return Err(ValidationError::AmountOutOfRange(input.to_string()));
        }
        Ok(Self::from_decimal(value))
    }

    /// The underlying decimal (always scale 2).
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// True when the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// True when the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// True when the amount is strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Require a strictly positive amount.
    pub fn positive(self, field: &'static str) -> Result<Self, ValidationError> {
        if self.is_positive() {
            Ok(self)
        } else {
            Err(ValidationError::NonPositiveAmount { field })
        }
    }

    /// Require a zero or positive amount.
    pub fn non_negative(self, field: &'static str) -> Result<Self, ValidationError> {
        if self.is_negative() {
            Err(ValidationError::NegativeAmount { field })
        } else {
            Ok(self)
        }
    }

    /// `max(0, self - other)`.
    pub fn less_floor_zero(self, other: Money) -> Money {
        let diff = self - other;
        if diff.is_negative() {
            Money::ZERO
        } else {
            diff
        }
    }

    /// Multiply by a ratio such as `0.8`, rounding to two places.
    pub fn scale_by(self, ratio: Decimal) -> Money {
        Money::from_decimal(self.0 * ratio)
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

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::from_decimal(value)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or an integer amount")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Money::parse(&v.to_string()).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Money::parse(&v.to_string()).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Money, E> {
        Err(E::custom(ValidationError::FloatAmount))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_normalizes_to_two_places() {
        assert_eq!(Money::parse("150").unwrap().to_string(), "150.00");
        assert_eq!(Money::parse("150.5").unwrap().to_string(), "150.50");
        assert_eq!(Money::parse(" 0.07 ").unwrap().to_string(), "0.07");
        assert_eq!(Money::parse("-20").unwrap().to_string(), "-20.00");
    }

    #[test]
    fn parse_rejects_excess_precision_and_garbage() {
        assert!(matches!(
            Money::parse("1.005"),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(Money::parse("").is_err());
        assert!(Money::parse("ten").is_err());
        // trailing zeros beyond two places are harmless
        assert_eq!(Money::parse("1.500").unwrap(), Money::from_minor(150));
    }

    #[test]
    fn parse_rejects_out_of_range() {
        assert!(matches!(
            Money::parse("1000000000000000"),
            Err(ValidationError::AmountOutOfRange(_))
        ));
        assert!(Money::parse("999999999999.99").is_ok());
    }

    #[test]
    fn equality_ignores_construction_path() {
        assert_eq!(Money::from_major(200), Money::parse("200.00").unwrap());
        assert_eq!(Money::from_minor(5000), Money::from_major(50));
    }

    #[test]
    fn less_floor_zero_clamps() {
        let due = Money::from_major(100);
        assert_eq!(due.less_floor_zero(Money::from_major(30)), Money::from_major(70));
        assert_eq!(due.less_floor_zero(Money::from_major(130)), Money::ZERO);
    }

    #[test]
    fn scale_by_rounds_half_away_from_zero() {
        let m = Money::parse("0.05").unwrap();
        assert_eq!(m.scale_by(Decimal::new(5, 1)).to_string(), "0.03");
        let due = Money::from_major(1000);
        assert_eq!(due.scale_by(Decimal::new(8, 1)), Money::from_major(800));
    }

    #[test]
    fn positive_and_non_negative_guards() {
        assert!(Money::ZERO.positive("amount").is_err());
        assert!(Money::ZERO.non_negative("amount").is_ok());
        assert_eq!(
            Money::from_major(-1).non_negative("due_amount"),
            Err(ValidationError::NegativeAmount { field: "due_amount" })
        );
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Money::from_minor(12345)).unwrap();
        assert_eq!(json, "\"123.45\"");
    }

    #[test]
    fn deserializes_strings_and_integers() {
        let a: Money = serde_json::from_str("\"99.90\"").unwrap();
        let b: Money = serde_json::from_str("100").unwrap();
        assert_eq!(a, Money::from_minor(9990));
        assert_eq!(b, Money::from_major(100));
    }

    #[test]
    fn deserialization_refuses_floats() {
        let err = serde_json::from_str::<Money>("150.25").unwrap_err();
        assert!(err.to_string().contains("decimal strings"), "got: {err}");
    }

    #[test]
    fn sum_of_amounts() {
        let total: Money = [Money::from_minor(10), Money::from_minor(20), Money::from_minor(5)]
            .iter()
            .sum();
        assert_eq!(total, Money::from_minor(35));
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(minor in -9_999_999_999_999i64..9_999_999_999_999i64) {
            let m = Money::from_minor(minor);
            prop_assert_eq!(Money::parse(&m.to_string()).unwrap(), m);
        }
    }
}
