//! Unique identifier types for pipeline entities
//!
//! Order and account IDs use UUID v7 for time-sortable ordering, enabling
//! efficient chronological queries over durable order records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an order
///
/// Uses UUID v7 for time-based sorting. Orders can be efficiently
/// queried in chronological order using the embedded timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Create a new OrderId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Check that the identifier is well-formed (non-nil)
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_nil()
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for the account that owns an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier for a liquidity venue
///
/// Venues are configured by name (e.g. "VenueA", "VenueB"); the declaration
/// order in configuration is significant for routing tie-breaks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VenueId(String);

impl VenueId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VenueId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Market identifier (trading pair)
///
/// Format: "BASE/QUOTE" (e.g., "SOL/USDC", "ETH/USDC"). Base and quote
/// assets must differ and both must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Create a new MarketId from a string
    ///
    /// # Panics
    /// Panics if the format is invalid; prefer [`MarketId::try_new`] for
    /// untrusted input.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::try_new(symbol).expect("MarketId must be in BASE/QUOTE format with distinct assets")
    }

    /// Try to create a MarketId, returning None if invalid
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        {
            let mut parts = s.splitn(2, '/');
            let base = parts.next()?;
            let quote = parts.next()?;
            if base.is_empty() || quote.is_empty() || base == quote {
                return None;
            }
        }
        Some(Self(s))
    }

    /// Build from separate base and quote assets
    pub fn from_assets(base: &str, quote: &str) -> Option<Self> {
        Self::try_new(format!("{}/{}", base, quote))
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into base and quote assets
    pub fn split(&self) -> (&str, &str) {
        let mut parts = self.0.splitn(2, '/');
        (parts.next().unwrap_or(""), parts.next().unwrap_or(""))
    }

    /// Base asset symbol
    pub fn base(&self) -> &str {
        self.split().0
    }

    /// Quote asset symbol
    pub fn quote(&self) -> &str {
        self.split().1
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_creation() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2, "OrderIds should be unique");
        assert!(id1.is_well_formed());
    }

    #[test]
    fn test_order_id_roundtrip() {
        let id = OrderId::new();
        let parsed: OrderId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_order_id_serialization() {
        let id = OrderId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_nil_order_id_not_well_formed() {
        let id = OrderId::from_uuid(uuid::Uuid::nil());
        assert!(!id.is_well_formed());
    }

    #[test]
    fn test_account_id_creation() {
        let id1 = AccountId::new();
        let id2 = AccountId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_account_id_from_str_rejects_garbage() {
        assert!("not-a-uuid".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_venue_id() {
        let venue = VenueId::new("VenueA");
        assert_eq!(venue.as_str(), "VenueA");
        assert_eq!(venue, VenueId::from("VenueA"));
    }

    #[test]
    fn test_market_id_creation() {
        let market = MarketId::new("SOL/USDC");
        assert_eq!(market.as_str(), "SOL/USDC");

        let (base, quote) = market.split();
        assert_eq!(base, "SOL");
        assert_eq!(quote, "USDC");
    }

    #[test]
    fn test_market_id_try_new() {
        assert!(MarketId::try_new("SOL/USDC").is_some());
        assert!(MarketId::try_new("INVALID").is_none());
        assert!(MarketId::try_new("/USDC").is_none());
        assert!(MarketId::try_new("SOL/").is_none());
    }

    #[test]
    fn test_market_id_rejects_identical_assets() {
        assert!(MarketId::try_new("USDC/USDC").is_none());
        assert!(MarketId::from_assets("SOL", "SOL").is_none());
    }

    #[test]
    #[should_panic(expected = "BASE/QUOTE")]
    fn test_market_id_invalid_format_panics() {
        MarketId::new("INVALID");
    }

    #[test]
    fn test_market_id_serialization() {
        let market = MarketId::new("ETH/USDC");
        let json = serde_json::to_string(&market).unwrap();
        assert_eq!(json, "\"ETH/USDC\"");

        let deserialized: MarketId = serde_json::from_str(&json).unwrap();
        assert_eq!(market, deserialized);
    }
}
