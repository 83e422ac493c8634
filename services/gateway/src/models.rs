use crate::config::GatewayConfig;
use pipeline::scheduler::StatsSnapshot;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::errors::ValidationError;
use types::ids::{MarketId, OrderId, VenueId};
use types::numeric::Quantity;
use types::order::{OrderStatus, Side};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub base: String,
    pub quote: String,
    pub quantity: Decimal,
    pub side: Side,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderAccepted {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueHealth {
    pub venue: VenueId,
    pub reachable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub pipeline: StatsSnapshot,
    pub live_channels: usize,
    pub venues: Vec<VenueHealth>,
}

/// Intake validation: everything rejected here never enters the pipeline.
pub fn validate_order_request(
    request: &CreateOrderRequest,
    config: &GatewayConfig,
) -> Result<(MarketId, Quantity), ValidationError> {
    for asset in [&request.base, &request.quote] {
        if !config.supports_asset(asset) {
            return Err(ValidationError::UnsupportedAsset(asset.clone()));
        }
    }
    if request.base == request.quote {
        return Err(ValidationError::IdenticalAssets(request.base.clone()));
    }
    let symbol = MarketId::from_assets(&request.base, &request.quote)
        .ok_or_else(|| ValidationError::MalformedSymbol(format!("{}/{}", request.base, request.quote)))?;

    let quantity = Quantity::try_new(request.quantity).ok_or(ValidationError::NonPositiveQuantity)?;
    if request.quantity > config.max_order_quantity {
        return Err(ValidationError::QuantityCeiling {
            requested: request.quantity.to_string(),
            ceiling: config.max_order_quantity.to_string(),
        });
    }

    Ok((symbol, quantity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(base: &str, quote: &str, quantity: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            base: base.to_string(),
            quote: quote.to_string(),
            quantity: quantity.parse().unwrap(),
            side: Side::BUY,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        let config = GatewayConfig::default();
        let (symbol, quantity) =
            validate_order_request(&request("SOL", "USDC", "2.5"), &config).unwrap();
        assert_eq!(symbol.as_str(), "SOL/USDC");
        assert_eq!(quantity, Quantity::from_str("2.5").unwrap());
    }

    #[test]
    fn test_identical_assets_rejected() {
        let config = GatewayConfig::default();
        let err = validate_order_request(&request("USDC", "USDC", "2.5"), &config).unwrap_err();
        assert!(matches!(err, ValidationError::IdenticalAssets(_)));
    }

    #[test]
    fn test_unsupported_asset_rejected() {
        let config = GatewayConfig::default();
        let err = validate_order_request(&request("DOGE", "USDC", "2.5"), &config).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedAsset(_)));
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let config = GatewayConfig::default();
        for quantity in ["0", "-2.5"] {
            let err =
                validate_order_request(&request("SOL", "USDC", quantity), &config).unwrap_err();
            assert!(matches!(err, ValidationError::NonPositiveQuantity));
        }
    }

    #[test]
    fn test_ceiling_enforced() {
        let config = GatewayConfig::default();
        let err = validate_order_request(&request("SOL", "USDC", "10001"), &config).unwrap_err();
        assert!(matches!(err, ValidationError::QuantityCeiling { .. }));
    }
}
