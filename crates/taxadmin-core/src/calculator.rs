//! # Tax Calculator
//!
//! Indicative tax due for a taxable income, by tax type code. Flat types use
//! a single rate; PIT uses progressive bands. Taxable income is
//! `max(0, income - deductions)`. Unknown codes fall back to the default
//! flat rate.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::money::Money;

/// Rate for types without a specific rule.
pub fn default_rate() -> Decimal {
    Decimal::new(15, 2)
}

/// One progressive band: income above `floor` is taxed at `rate`, on top of
/// `base` owed for everything below.
#[derive(Debug, Clone, Copy)]
struct Band {
    floor: i64,
    base: i64,
    rate: Decimal,
}

fn pit_bands() -> [Band; 4] {
    [
        Band { floor: 0, base: 0, rate: Decimal::new(10, 2) },
        Band { floor: 50_000, base: 5_000, rate: Decimal::new(15, 2) },
        Band { floor: 100_000, base: 12_500, rate: Decimal::new(25, 2) },
        Band { floor: 250_000, base: 50_000, rate: Decimal::new(35, 2) },
    ]
}

/// How the tax was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Single rate on taxable income.
    Flat,
    /// Progressive bands.
    Progressive,
}

/// Calculator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Calculation {
    /// Tax type code, upper-cased.
    pub tax_type_code: String,
    /// `max(0, income - deductions)`.
    pub taxable_income: Money,
    /// Estimated tax due.
    pub tax_due: Money,
    /// Flat or progressive.
    pub method: Method,
    /// Marginal rate applied to the top slice, as a fraction.
    pub marginal_rate: Decimal,
}

fn flat_rate(code: &str) -> Decimal {
    match code {
        "VAT" => Decimal::new(15, 2),
        "CIT" => Decimal::new(28, 2),
        "WHT" => Decimal::new(15, 2),
        _ => default_rate(),
    }
}

/// Compute the tax due for `code` on `income` less `deductions`.
pub fn calculate(code: &str, income: Money, deductions: Money) -> Calculation {
    let code = code.trim().to_ascii_uppercase();
    let taxable_income = income.less_floor_zero(deductions);
    let taxable = taxable_income.as_decimal();

    let (tax, method, marginal_rate) = if code == "PIT" {
        let bands = pit_bands();
        let band = bands
            .iter()
            .rev()
            .find(|b| taxable > Decimal::from(b.floor))
            .copied()
            .unwrap_or(bands[0]);
        let tax = Decimal::from(band.base) + (taxable - Decimal::from(band.floor)) * band.rate;
        (tax, Method::Progressive, band.rate)
    } else {
        let rate = flat_rate(&code);
        (taxable * rate, Method::Flat, rate)
    };

    Calculation {
        tax_type_code: code,
        taxable_income,
        tax_due: Money::from_decimal(tax),
        method,
        marginal_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn due(code: &str, income: i64) -> Money {
        calculate(code, Money::from_major(income), Money::ZERO).tax_due
    }

    #[test]
    fn flat_rates() {
        assert_eq!(due("VAT", 1000), Money::from_major(150));
        assert_eq!(due("cit", 1000), Money::from_major(280));
        assert_eq!(due("WHT", 1000), Money::from_major(150));
        assert_eq!(due("XYZ", 1000), Money::from_major(150));
    }

    #[test]
    fn pit_band_edges() {
        assert_eq!(due("PIT", 0), Money::ZERO);
        assert_eq!(due("PIT", 50_000), Money::from_major(5_000));
        assert_eq!(due("PIT", 60_000), Money::from_major(6_500));
        assert_eq!(due("PIT", 100_000), Money::from_major(12_500));
        assert_eq!(due("PIT", 250_000), Money::from_major(50_000));
        assert_eq!(due("PIT", 300_000), Money::from_major(67_500));
    }

    #[test]
    fn deductions_floor_at_zero() {
        let c = calculate("VAT", Money::from_major(100), Money::from_major(500));
        assert_eq!(c.taxable_income, Money::ZERO);
        assert_eq!(c.tax_due, Money::ZERO);
    }

    #[test]
    fn rounds_to_cents() {
        let c = calculate("VAT", Money::parse("10.01").unwrap(), Money::ZERO);
        assert_eq!(c.tax_due.to_string(), "1.50");
        assert_eq!(c.method, Method::Flat);
    }
}
