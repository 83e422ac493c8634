//! Best-price routing across venues
//!
//! Queries every configured venue concurrently and applies the selection
//! rule: buys take the lowest price, sells the highest, and exact price
//! ties go to the venue configured first. Venue order is pinned to the
//! configuration, never to call-return order, so the tie-break is
//! deterministic across runs.

use crate::venue::VenueQuoteSource;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use types::errors::{RoutingError, VenueError};
use types::ids::{MarketId, VenueId};
use types::numeric::Quantity;
use types::order::Side;
use types::quote::{Quote, RoutingDecision};

/// Router timeouts.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Per-venue quote call timeout
    pub quote_timeout: Duration,
    /// Per-venue reachability probe timeout
    pub ping_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            quote_timeout: Duration::from_secs(3),
            ping_timeout: Duration::from_secs(1),
        }
    }
}

/// Multi-venue quote comparison. Stateless apart from its venue list.
pub struct Router {
    venues: Vec<Arc<dyn VenueQuoteSource>>,
    config: RouterConfig,
}

impl Router {
    pub fn new(venues: Vec<Arc<dyn VenueQuoteSource>>, config: RouterConfig) -> Self {
        Self { venues, config }
    }

    pub fn venue_count(&self) -> usize {
        self.venues.len()
    }

    /// Query all venues concurrently and pick the best quote.
    ///
    /// A slow or failing venue never delays a fast one beyond the per-call
    /// timeout. Partial success (at least one answer) always yields a
    /// decision; only all-fail is an error.
    pub async fn find_best_route(
        &self,
        symbol: &MarketId,
        quantity: Quantity,
        side: Side,
    ) -> Result<RoutingDecision, RoutingError> {
        if self.venues.is_empty() {
            return Err(RoutingError::NoVenues);
        }

        let started = Instant::now();
        let calls = self.venues.iter().map(|venue| async {
            match tokio::time::timeout(
                self.config.quote_timeout,
                venue.fetch_quote(symbol, quantity, side),
            )
            .await
            {
                Ok(Ok(quote)) => Ok(quote),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(VenueError::Timeout {
                    venue: venue.venue_id().to_string(),
                }),
            }
        });

        // join_all preserves input order, so `quotes` stays in venue
        // configuration order; the tie-break below depends on that.
        let mut quotes: Vec<Quote> = Vec::with_capacity(self.venues.len());
        let mut failures: Vec<VenueError> = Vec::new();
        for outcome in join_all(calls).await {
            match outcome {
                Ok(quote) => quotes.push(quote),
                Err(e) => {
                    debug!(venue = e.venue(), error = %e, "venue quote failed");
                    failures.push(e);
                }
            }
        }

        if quotes.is_empty() {
            let details = failures
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RoutingError::AllVenuesFailed { details });
        }

        // Strictly-better replacement keeps the earlier venue on ties.
        let mut best_idx = 0;
        for (i, candidate) in quotes.iter().enumerate().skip(1) {
            let better = match side {
                Side::BUY => candidate.price < quotes[best_idx].price,
                Side::SELL => candidate.price > quotes[best_idx].price,
            };
            if better {
                best_idx = i;
            }
        }

        let best = quotes.remove(best_idx);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            symbol = %symbol,
            venue = %best.venue,
            price = %best.price,
            answered = quotes.len() + 1,
            elapsed_ms,
            "route selected"
        );

        Ok(RoutingDecision {
            best,
            alternatives: quotes,
            elapsed_ms,
        })
    }

    /// Reachability of every venue, probed concurrently. Never blocks
    /// beyond the probe timeout; a timed-out probe reads as unreachable.
    pub async fn venue_health(&self) -> Vec<(VenueId, bool)> {
        let probes = self.venues.iter().map(|venue| async {
            let reachable = tokio::time::timeout(self.config.ping_timeout, venue.ping())
                .await
                .unwrap_or(false);
            (venue.venue_id().clone(), reachable)
        });
        join_all(probes).await
    }
}
