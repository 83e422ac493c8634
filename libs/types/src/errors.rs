//! Error taxonomy for the order routing pipeline
//!
//! Layered thiserror enums: validation errors reject at intake, venue and
//! routing errors feed the retry policy, queue errors surface to the
//! submitter as retryable infrastructure failures.

use thiserror::Error;

/// Top-level pipeline error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Storage error: {message}")]
    Storage { message: String },
}

/// Malformed intake, rejected synchronously; the order never enters the
/// pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("base and quote assets must differ: {0}")]
    IdenticalAssets(String),

    #[error("malformed market symbol: {0}")]
    MalformedSymbol(String),

    #[error("unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("quantity must be strictly positive")]
    NonPositiveQuantity,

    #[error("quantity {requested} exceeds ceiling {ceiling}")]
    QuantityCeiling { requested: String, ceiling: String },
}

/// Order record errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("order not found: {order_id}")]
    NotFound { order_id: String },

    #[error("order {order_id} is not in a submittable state: {status}")]
    NotSubmittable { order_id: String, status: String },

    #[error("order identifier is not well-formed")]
    MalformedId,
}

/// A single venue call failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VenueError {
    #[error("venue {venue} timed out")]
    Timeout { venue: String },

    #[error("venue {venue} unreachable: {reason}")]
    Unreachable { venue: String, reason: String },

    #[error("venue {venue} rejected the request: {reason}")]
    Rejected { venue: String, reason: String },
}

impl VenueError {
    pub fn venue(&self) -> &str {
        match self {
            VenueError::Timeout { venue } => venue,
            VenueError::Unreachable { venue, .. } => venue,
            VenueError::Rejected { venue, .. } => venue,
        }
    }
}

/// Routing failure: raised only when every venue call failed or timed out
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("all venues failed: {details}")]
    AllVenuesFailed { details: String },

    #[error("no venues configured")]
    NoVenues,
}

/// Execution failure at the chosen venue
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("venue {venue} rejected the fill: {reason}")]
    VenueRejected { venue: String, reason: String },

    #[error("execution at {venue} timed out")]
    Timeout { venue: String },
}

/// Work queue infrastructure errors
///
/// Distinct from business failure: the order was never durably accepted, so
/// the submitter should retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("work queue unavailable: {0}")]
    Unavailable(String),

    #[error("work queue is shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::IdenticalAssets("USDC".to_string());
        assert_eq!(err.to_string(), "base and quote assets must differ: USDC");
    }

    #[test]
    fn test_quantity_ceiling_display() {
        let err = ValidationError::QuantityCeiling {
            requested: "5000".to_string(),
            ceiling: "1000".to_string(),
        };
        assert!(err.to_string().contains("5000"));
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn test_venue_error_names_venue() {
        let err = VenueError::Timeout {
            venue: "VenueB".to_string(),
        };
        assert_eq!(err.venue(), "VenueB");
    }

    #[test]
    fn test_pipeline_error_from_routing() {
        let routing = RoutingError::AllVenuesFailed {
            details: "VenueA: timeout; VenueB: unreachable".to_string(),
        };
        let err: PipelineError = routing.into();
        assert!(matches!(err, PipelineError::Routing(_)));
        assert!(err.to_string().contains("VenueA"));
    }

    #[test]
    fn test_queue_error_from() {
        let err: PipelineError = QueueError::Unavailable("broker down".to_string()).into();
        assert!(matches!(err, PipelineError::Queue(_)));
    }
}
