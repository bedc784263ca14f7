//! Precision-safe decimal price type.
//!
//! Uses `rust_decimal` for exact decimal arithmetic, avoiding
//! floating-point rounding errors critical in financial calculations.
//! Money settles to the cent on grid cell boundaries, so every price
//! that participates in the coordinate contract stays in `Decimal`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with other quantities in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Midpoint between two prices.
    #[inline]
    pub fn midpoint(&self, other: Price) -> Self {
        Self((self.0 + other.0) / Decimal::TWO)
    }

    /// Lossy conversion for the odds model, which needs `sqrt`.
    ///
    /// Never used in the coordinate contract or settlement-bound math.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Price {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_midpoint() {
        let low = Price::new(dec!(50000));
        let high = Price::new(dec!(50010));
        assert_eq!(low.midpoint(high), Price::new(dec!(50005)));
    }

    #[test]
    fn test_price_arithmetic() {
        let p = Price::new(dec!(100.50));
        assert_eq!(p + Price::new(dec!(0.50)), Price::new(dec!(101)));
        assert_eq!(p - Price::new(dec!(0.50)), Price::new(dec!(100)));
        assert_eq!(p * dec!(2), Price::new(dec!(201)));
        assert_eq!(p / dec!(2), Price::new(dec!(50.25)));
    }

    #[test]
    fn test_price_parse_roundtrip() {
        let p: Price = "50005.01".parse().unwrap();
        assert_eq!(p.to_string(), "50005.01");
    }

    #[test]
    fn test_price_positivity() {
        assert!(Price::new(dec!(1)).is_positive());
        assert!(!Price::ZERO.is_positive());
        assert!(!Price::new(dec!(-1)).is_positive());
    }
}
