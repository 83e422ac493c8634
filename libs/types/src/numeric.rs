//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point
//! errors). Prices and quantities entering the pipeline are validated once
//! at construction and never re-checked downstream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// A strictly positive price
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a price, returning None unless strictly positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from an integer price (convenience for tests and fixtures)
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Parse from a decimal string
    pub fn from_str(s: &str) -> Option<Self> {
        Decimal::from_str(s).ok().and_then(Self::try_new)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An order quantity
///
/// `try_new` enforces strict positivity; `zero` exists for accumulator
/// arithmetic only and never enters an order record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a quantity, returning None unless strictly positive
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// The zero quantity (accumulator identity)
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from an integer quantity (convenience for tests and fixtures)
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Parse from a decimal string
    pub fn from_str(s: &str) -> Option<Self> {
        Decimal::from_str(s).ok().and_then(Self::try_new)
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 - rhs.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_positive_only() {
        assert!(Price::try_new(Decimal::from(100)).is_some());
        assert!(Price::try_new(Decimal::ZERO).is_none());
        assert!(Price::try_new(Decimal::from(-1)).is_none());
    }

    #[test]
    fn test_price_from_str() {
        let price = Price::from_str("152.37").unwrap();
        assert_eq!(price.as_decimal(), Decimal::from_str("152.37").unwrap());
        assert!(Price::from_str("-5").is_none());
        assert!(Price::from_str("abc").is_none());
    }

    #[test]
    fn test_price_ordering() {
        let low = Price::from_str("99.5").unwrap();
        let high = Price::from_u64(100);
        assert!(low < high);
    }

    #[test]
    fn test_quantity_positive_only() {
        assert!(Quantity::from_str("2.5").is_some());
        assert!(Quantity::from_str("0").is_none());
        assert!(Quantity::from_str("-2.5").is_none());
    }

    #[test]
    fn test_quantity_arithmetic() {
        let a = Quantity::from_str("1.5").unwrap();
        let b = Quantity::from_str("0.5").unwrap();
        assert_eq!((a + b).as_decimal(), Decimal::from(2));
        assert_eq!((a - b).as_decimal(), Decimal::from(1));
    }

    #[test]
    fn test_quantity_zero() {
        assert!(Quantity::zero().is_zero());
        assert!(!Quantity::from_u64(1).is_zero());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let price = Price::from_str("3000.50").unwrap();
        let json = serde_json::to_string(&price).unwrap();
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, back);
    }
}
