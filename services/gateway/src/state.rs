use crate::config::GatewayConfig;
use crate::rate_limit::RateLimiter;
use persistence::OrderStore;
use pipeline::router::Router as QuoteRouter;
use pipeline::{Notifier, Scheduler};
use std::sync::Arc;

/// Shared handler state; everything is resolved in `main` before the
/// listener starts.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn OrderStore>,
    pub notifier: Arc<Notifier>,
    pub quote_router: Arc<QuoteRouter>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<GatewayConfig>,
}
