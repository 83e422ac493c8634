//! Trade execution
//!
//! Realizes a chosen quote into a concrete fill. The simulated executor
//! applies slippage in the direction unfavorable to the trader (buys pay
//! more, sells receive less), may fill marginally below the requested
//! quantity, and fails with a venue-tagged structured reason at a
//! configurable probability. Failures are values, never panics.

use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::time::Duration;
use types::errors::ExecutionError;
use types::numeric::{Price, Quantity};
use types::order::{ExecutionDetail, Order, Side};
use types::quote::Quote;
use types::time::now_nanos;
use uuid::Uuid;

/// Executes a routed order at the quoted venue.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, order: &Order, quote: &Quote) -> Result<ExecutionDetail, ExecutionError>;
}

/// Tuning knobs for the simulated executor.
#[derive(Debug, Clone)]
pub struct SimulatedExecutorConfig {
    /// Max slippage applied against the trader, in basis points
    pub max_slippage_bps: u32,
    /// Max shortfall of the realized quantity, in basis points
    pub max_shortfall_bps: u32,
    /// Probability in [0, 1] that the venue rejects the fill
    pub failure_rate: f64,
    /// Settlement latency range
    pub min_settle_delay: Duration,
    pub max_settle_delay: Duration,
}

impl Default for SimulatedExecutorConfig {
    fn default() -> Self {
        Self {
            max_slippage_bps: 25,
            max_shortfall_bps: 20,
            failure_rate: 0.05,
            min_settle_delay: Duration::from_millis(30),
            max_settle_delay: Duration::from_millis(200),
        }
    }
}

const REJECT_REASONS: &[&str] = &[
    "insufficient liquidity at quoted depth",
    "venue rejected the order during settlement",
    "price moved beyond the venue tolerance",
];

/// Simulated venue execution with deterministic seeded RNG.
pub struct SimulatedExecutor {
    config: SimulatedExecutorConfig,
    rng: Mutex<ChaCha8Rng>,
}

impl SimulatedExecutor {
    pub fn new(config: SimulatedExecutorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    fn draw(&self) -> DrawnFill {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let min_ms = self.config.min_settle_delay.as_millis() as u64;
        let max_ms = self.config.max_settle_delay.as_millis() as u64;
        let delay_ms = if max_ms > min_ms {
            rng.gen_range(min_ms..=max_ms)
        } else {
            min_ms
        };

        DrawnFill {
            delay: Duration::from_millis(delay_ms),
            fails: rng.gen_bool(self.config.failure_rate.clamp(0.0, 1.0)),
            slippage_bps: rng.gen_range(0..=self.config.max_slippage_bps as i64),
            shortfall_bps: rng.gen_range(0..=self.config.max_shortfall_bps as i64),
            reason_idx: rng.gen_range(0..REJECT_REASONS.len()),
        }
    }
}

struct DrawnFill {
    delay: Duration,
    fails: bool,
    slippage_bps: i64,
    shortfall_bps: i64,
    reason_idx: usize,
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn execute(
        &self,
        order: &Order,
        quote: &Quote,
    ) -> Result<ExecutionDetail, ExecutionError> {
        let drawn = self.draw();
        tokio::time::sleep(drawn.delay).await;

        if drawn.fails {
            return Err(ExecutionError::VenueRejected {
                venue: quote.venue.to_string(),
                reason: REJECT_REASONS[drawn.reason_idx].to_string(),
            });
        }

        // Slippage moves the price against the trader relative to side.
        let slip = Decimal::new(drawn.slippage_bps, 4);
        let quoted = quote.price.as_decimal();
        let adjusted = match order.side {
            Side::BUY => quoted + quoted * slip,
            Side::SELL => quoted - quoted * slip,
        };
        let realized_price = Price::try_new(adjusted).ok_or_else(|| {
            ExecutionError::VenueRejected {
                venue: quote.venue.to_string(),
                reason: "slippage produced a non-positive price".to_string(),
            }
        })?;

        // Realized quantity may come in marginally under the request.
        let shortfall = Decimal::new(drawn.shortfall_bps, 4);
        let requested = order.quantity.as_decimal();
        let realized_quantity = Quantity::try_new(requested - requested * shortfall)
            .unwrap_or(order.quantity);

        Ok(ExecutionDetail {
            venue: quote.venue.clone(),
            realized_price,
            realized_quantity,
            settlement_ref: format!("stl-{}", Uuid::now_v7().simple()),
            executed_at: now_nanos(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{AccountId, MarketId, VenueId};

    fn instant_config(failure_rate: f64) -> SimulatedExecutorConfig {
        SimulatedExecutorConfig {
            failure_rate,
            min_settle_delay: Duration::from_millis(0),
            max_settle_delay: Duration::from_millis(0),
            ..SimulatedExecutorConfig::default()
        }
    }

    fn make_order(side: Side) -> Order {
        Order::new(
            AccountId::new(),
            MarketId::new("SOL/USDC"),
            side,
            Quantity::from_str("2.5").unwrap(),
            1722400000000000000,
        )
    }

    fn make_quote(price: &str) -> Quote {
        Quote {
            venue: VenueId::new("VenueA"),
            price: Price::from_str(price).unwrap(),
            liquidity: Quantity::from_u64(10_000),
            gas_estimate: Decimal::new(5, 3),
            confidence: 0.95,
            quoted_at: 1722400000000000000,
        }
    }

    #[tokio::test]
    async fn test_buy_slippage_is_unfavorable() {
        let executor = SimulatedExecutor::new(instant_config(0.0), 3);
        let order = make_order(Side::BUY);
        let quote = make_quote("150");

        for _ in 0..10 {
            let fill = executor.execute(&order, &quote).await.unwrap();
            // Buyer never pays less than quoted
            assert!(fill.realized_price >= quote.price);
        }
    }

    #[tokio::test]
    async fn test_sell_slippage_is_unfavorable() {
        let executor = SimulatedExecutor::new(instant_config(0.0), 3);
        let order = make_order(Side::SELL);
        let quote = make_quote("150");

        for _ in 0..10 {
            let fill = executor.execute(&order, &quote).await.unwrap();
            // Seller never receives more than quoted
            assert!(fill.realized_price <= quote.price);
        }
    }

    #[tokio::test]
    async fn test_slippage_within_configured_bound() {
        let config = SimulatedExecutorConfig {
            max_slippage_bps: 25,
            ..instant_config(0.0)
        };
        let executor = SimulatedExecutor::new(config, 11);
        let order = make_order(Side::BUY);
        let quote = make_quote("10000");

        for _ in 0..20 {
            let fill = executor.execute(&order, &quote).await.unwrap();
            let deviation = (fill.realized_price.as_decimal() - Decimal::from(10_000)).abs();
            // 25 bps of 10,000 = 25
            assert!(deviation <= Decimal::from(25));
        }
    }

    #[tokio::test]
    async fn test_realized_quantity_never_exceeds_requested() {
        let executor = SimulatedExecutor::new(instant_config(0.0), 5);
        let order = make_order(Side::BUY);
        let quote = make_quote("150");

        for _ in 0..20 {
            let fill = executor.execute(&order, &quote).await.unwrap();
            assert!(fill.realized_quantity <= order.quantity);
            assert!(!fill.realized_quantity.is_zero());
        }
    }

    #[tokio::test]
    async fn test_failure_is_structured_and_venue_tagged() {
        let executor = SimulatedExecutor::new(instant_config(1.0), 5);
        let order = make_order(Side::BUY);
        let quote = make_quote("150");

        let err = executor.execute(&order, &quote).await.unwrap_err();
        match err {
            ExecutionError::VenueRejected { venue, reason } => {
                assert_eq!(venue, "VenueA");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_settlement_refs_are_unique() {
        let executor = SimulatedExecutor::new(instant_config(0.0), 5);
        let order = make_order(Side::BUY);
        let quote = make_quote("150");

        let a = executor.execute(&order, &quote).await.unwrap();
        let b = executor.execute(&order, &quote).await.unwrap();
        assert_ne!(a.settlement_ref, b.settlement_ref);
        assert!(a.settlement_ref.starts_with("stl-"));
    }
}
