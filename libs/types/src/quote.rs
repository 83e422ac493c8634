//! Venue quote and routing decision types
//!
//! Quotes are ephemeral: they live for one routing comparison and only the
//! selected one survives, embedded in the completed order's execution
//! detail.

use crate::ids::VenueId;
use crate::numeric::{Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A priced, time-stamped offer from one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Venue that produced the quote
    pub venue: VenueId,
    /// Offered price per unit of base asset
    pub price: Price,
    /// Liquidity available at this price
    pub liquidity: Quantity,
    /// Estimated gas/fee cost of settling at this venue
    pub gas_estimate: Decimal,
    /// Venue confidence score in [0, 1]
    pub confidence: f64,
    /// Unix nanos when the quote was produced
    pub quoted_at: i64,
}

/// Outcome of one multi-venue comparison
///
/// Consumed immediately by the executor; never persisted as its own entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The winning quote
    pub best: Quote,
    /// Quotes that lost the comparison
    pub alternatives: Vec<Quote>,
    /// Total wall-clock time spent comparing venues, in milliseconds
    pub elapsed_ms: u64,
}

impl RoutingDecision {
    /// Number of venues that answered in time
    pub fn venues_answered(&self) -> usize {
        1 + self.alternatives.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_quote(venue: &str, price: &str) -> Quote {
        Quote {
            venue: VenueId::new(venue),
            price: Price::from_str(price).unwrap(),
            liquidity: Quantity::from_u64(1000),
            gas_estimate: Decimal::new(5, 3),
            confidence: 0.95,
            quoted_at: 1722400000000000000,
        }
    }

    #[test]
    fn test_decision_counts_all_answers() {
        let decision = RoutingDecision {
            best: make_quote("VenueA", "151.80"),
            alternatives: vec![make_quote("VenueB", "152.10")],
            elapsed_ms: 42,
        };
        assert_eq!(decision.venues_answered(), 2);
    }

    #[test]
    fn test_quote_serialization() {
        let quote = make_quote("VenueA", "151.80");
        let json = serde_json::to_string(&quote).unwrap();
        let back: Quote = serde_json::from_str(&json).unwrap();
        assert_eq!(quote, back);
    }
}
