//! Gateway configuration
//!
//! Resolved once at startup from environment overrides on top of defaults,
//! then injected into the handlers; nothing reads the environment after
//! boot.

use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    /// Ceiling on a single order's quantity
    pub max_order_quantity: Decimal,
    /// Assets accepted at intake
    pub supported_assets: Vec<String>,
    /// List-endpoint page size when the caller supplies none
    pub default_list_limit: usize,
    /// Hard cap on caller-supplied list limits
    pub max_list_limit: usize,
    /// How long shutdown waits for in-flight orders
    pub shutdown_grace: Duration,
    /// Optional audit journal location; in-memory only when unset
    pub audit_journal_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_order_quantity: Decimal::from(10_000),
            supported_assets: ["SOL", "ETH", "BTC", "USDC", "USDT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_list_limit: 50,
            max_list_limit: 200,
            shutdown_grace: Duration::from_secs(30),
            audit_journal_path: None,
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by `GATEWAY_LISTEN_ADDR`, `MAX_ORDER_QUANTITY`
    /// and `AUDIT_JOURNAL_PATH` when present.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("GATEWAY_LISTEN_ADDR") {
            config.listen_addr = SocketAddr::from_str(&addr)
                .map_err(|e| anyhow::anyhow!("invalid GATEWAY_LISTEN_ADDR {addr:?}: {e}"))?;
        }
        if let Ok(ceiling) = std::env::var("MAX_ORDER_QUANTITY") {
            config.max_order_quantity = Decimal::from_str(&ceiling)
                .map_err(|e| anyhow::anyhow!("invalid MAX_ORDER_QUANTITY {ceiling:?}: {e}"))?;
        }
        if let Ok(path) = std::env::var("AUDIT_JOURNAL_PATH") {
            config.audit_journal_path = Some(PathBuf::from(path));
        }
        Ok(config)
    }

    pub fn supports_asset(&self, asset: &str) -> bool {
        self.supported_assets.iter().any(|a| a == asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.default_list_limit, 50);
        assert!(config.supports_asset("SOL"));
        assert!(!config.supports_asset("DOGE"));
        assert!(config.audit_journal_path.is_none());
    }
}
