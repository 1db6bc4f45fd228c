//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const INR: &str = "INR";

/// Stock keeping unit printed on a bottle label: upper-case ASCII letters, digits and
/// dashes, e.g. `ROSE-PREMIUM-12`. Input is trimmed and upper-cased; spaces and underscores
/// become dashes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

pub const MAX_SKU_LEN: usize = 40;

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let raw = value.into();
        let mut code = String::with_capacity(raw.len());
        for ch in raw.trim().chars() {
            match ch {
                'a'..='z' | 'A'..='Z' | '0'..='9' => code.push(ch.to_ascii_uppercase()),
                '-' | '_' | ' ' => code.push('-'),
                other => return Err(SkuError::InvalidCharacter(other)),
            }
        }
        if code.is_empty() { return Err(SkuError::Empty); }
        if code.len() > MAX_SKU_LEN { return Err(SkuError::TooLong); }
        if code.starts_with('-') || code.ends_with('-') || code.contains("--") {
            return Err(SkuError::MisplacedDash);
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU is empty")]
    Empty,
    #[error("SKU is longer than 40 characters")]
    TooLong,
    #[error("SKU contains '{0}'; use letters, digits and dashes")]
    InvalidCharacter(char),
    #[error("SKU dashes must separate letters or digits")]
    MisplacedDash,
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn inr(amount: Decimal) -> Self { Self::new(amount, INR) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }

    /// Amount in the currency's minor unit (paise for INR), as the gateway expects it.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        (self.amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(MoneyError::OutOfRange)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.currency == INR {
            write!(f, "₹{}", format_indian(self.amount))
        } else {
            write!(f, "{} {}", self.currency, self.amount.round_dp(2))
        }
    }
}

/// Groups digits the Indian way (last three, then pairs): `123456.5` becomes `1,23,456.50`.
/// Whole amounts are printed without decimals.
pub fn format_indian(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs();
    let whole = abs.trunc();
    let fraction = abs - whole;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 2);
    let len = digits.len();
    for (i, ch) in digits.chars().enumerate() {
        let remaining = len - i;
        if i > 0 && (remaining == 3 || (remaining > 3 && (remaining - 3) % 2 == 0)) {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = String::new();
    if negative { out.push('-'); }
    out.push_str(&grouped);
    if !fraction.is_zero() {
        let paise = (fraction * Decimal::ONE_HUNDRED).trunc().to_u32().unwrap_or(0);
        out.push_str(&format!(".{:02}", paise));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Amount out of range")]
    OutOfRange,
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new("attar-rose-10").unwrap(); assert_eq!(sku.as_str(), "ATTAR-ROSE-10"); }
    #[test]
    fn test_sku_rejects_blank() { assert_eq!(Sku::new("   "), Err(SkuError::Empty)); }
    #[test]
    fn test_sku_label_rules() {
        assert_eq!(Sku::new(" oud_royal 12 ").unwrap().as_str(), "OUD-ROYAL-12");
        assert_eq!(Sku::new("rose/6"), Err(SkuError::InvalidCharacter('/')));
        assert_eq!(Sku::new("gulab-ité"), Err(SkuError::InvalidCharacter('é')));
        assert_eq!(Sku::new("-ROSE"), Err(SkuError::MisplacedDash));
        assert_eq!(Sku::new("ROSE--6"), Err(SkuError::MisplacedDash));
        assert_eq!(Sku::new("A".repeat(41)), Err(SkuError::TooLong));
    }
    #[test]
    fn test_foreign_currency_display() {
        assert_eq!(Money::new(Decimal::new(1999, 2), "USD").to_string(), "USD 19.99");
    }
    #[test]
    fn test_minor_units() {
        assert_eq!(Money::inr(Decimal::new(2200, 0)).to_minor_units().unwrap(), 220_000);
        assert_eq!(Money::inr(Decimal::new(49999, 2)).to_minor_units().unwrap(), 49_999);
    }
    #[test]
    fn test_indian_grouping() {
        assert_eq!(format_indian(Decimal::new(999, 0)), "999");
        assert_eq!(format_indian(Decimal::new(2200, 0)), "2,200");
        assert_eq!(format_indian(Decimal::new(123456, 0)), "1,23,456");
        assert_eq!(format_indian(Decimal::new(1234567, 0)), "12,34,567");
        assert_eq!(format_indian(Decimal::new(12345650, 2)), "1,23,456.50");
        assert_eq!(Money::inr(Decimal::new(1200, 0)).to_string(), "₹1,200");
    }
}
