//! Venue quote sources
//!
//! The pipeline treats venues as opaque, possibly slow, possibly failing
//! external calls behind the [`VenueQuoteSource`] trait. The simulated
//! implementation uses a deterministic seeded RNG so runs are reproducible
//! under test.

use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::time::Duration;
use types::errors::VenueError;
use types::ids::{MarketId, VenueId};
use types::numeric::{Price, Quantity};
use types::order::Side;
use types::quote::Quote;
use types::time::now_nanos;

/// A liquidity source capable of quoting a trade.
#[async_trait]
pub trait VenueQuoteSource: Send + Sync {
    fn venue_id(&self) -> &VenueId;

    /// Obtain a quote for the given pair/amount/side. May be slow; callers
    /// bound the wait with their own timeout.
    async fn fetch_quote(
        &self,
        symbol: &MarketId,
        quantity: Quantity,
        side: Side,
    ) -> Result<Quote, VenueError>;

    /// Cheap reachability probe for the health surface.
    async fn ping(&self) -> bool;
}

/// Tuning knobs for a simulated venue.
#[derive(Debug, Clone)]
pub struct SimulatedVenueConfig {
    /// Mid price this venue quotes around
    pub mid_price: Decimal,
    /// Max random deviation from the mid price, in basis points
    pub price_jitter_bps: u32,
    /// Quote latency range
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Probability in [0, 1] that a quote call fails
    pub failure_rate: f64,
    /// Liquidity advertised with every quote
    pub liquidity: Quantity,
    /// Gas/fee estimate advertised with every quote
    pub gas_estimate: Decimal,
}

impl Default for SimulatedVenueConfig {
    fn default() -> Self {
        Self {
            mid_price: Decimal::from(150),
            price_jitter_bps: 40,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(120),
            failure_rate: 0.05,
            liquidity: Quantity::from_u64(10_000),
            gas_estimate: Decimal::new(5, 3), // 0.005
        }
    }
}

/// Simulated venue with deterministic seeded RNG.
pub struct SimulatedVenue {
    id: VenueId,
    config: SimulatedVenueConfig,
    rng: Mutex<ChaCha8Rng>,
}

impl SimulatedVenue {
    /// Create a simulated venue with a deterministic seed.
    pub fn new(id: VenueId, config: SimulatedVenueConfig, seed: u64) -> Self {
        Self {
            id,
            config,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Draw one quote outcome. All randomness happens here, under the
    /// lock, so the await points below never hold it.
    fn draw(&self) -> DrawnQuote {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let min_ms = self.config.min_delay.as_millis() as u64;
        let max_ms = self.config.max_delay.as_millis() as u64;
        let delay_ms = if max_ms > min_ms {
            rng.gen_range(min_ms..=max_ms)
        } else {
            min_ms
        };

        let jitter = self.config.price_jitter_bps as i64;
        let jitter_bps = if jitter > 0 {
            rng.gen_range(-jitter..=jitter)
        } else {
            0
        };

        DrawnQuote {
            delay: Duration::from_millis(delay_ms),
            fails: rng.gen_bool(self.config.failure_rate.clamp(0.0, 1.0)),
            jitter_bps,
            confidence: rng.gen_range(0.85..=0.99),
        }
    }
}

struct DrawnQuote {
    delay: Duration,
    fails: bool,
    jitter_bps: i64,
    confidence: f64,
}

#[async_trait]
impl VenueQuoteSource for SimulatedVenue {
    fn venue_id(&self) -> &VenueId {
        &self.id
    }

    async fn fetch_quote(
        &self,
        _symbol: &MarketId,
        _quantity: Quantity,
        _side: Side,
    ) -> Result<Quote, VenueError> {
        let drawn = self.draw();
        tokio::time::sleep(drawn.delay).await;

        if drawn.fails {
            return Err(VenueError::Unreachable {
                venue: self.id.to_string(),
                reason: "simulated venue outage".to_string(),
            });
        }

        let ratio = Decimal::new(drawn.jitter_bps, 4); // bps → fraction
        let raw = self.config.mid_price + self.config.mid_price * ratio;
        let price = Price::try_new(raw).ok_or_else(|| VenueError::Rejected {
            venue: self.id.to_string(),
            reason: "quote collapsed to a non-positive price".to_string(),
        })?;

        Ok(Quote {
            venue: self.id.clone(),
            price,
            liquidity: self.config.liquidity,
            gas_estimate: self.config.gas_estimate,
            confidence: drawn.confidence,
            quoted_at: now_nanos(),
        })
    }

    async fn ping(&self) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_bool(1.0 - self.config.failure_rate.clamp(0.0, 1.0))
    }
}
