mod auth;
mod config;
mod error;
mod handlers;
mod models;
mod rate_limit;
mod router;
mod state;

use config::GatewayConfig;
use persistence::{AuditJournal, MemoryStore, OrderStore};
use pipeline::router::Router as QuoteRouter;
use pipeline::{
    MemoryWorkQueue, Notifier, NotifierConfig, RouterConfig, Scheduler, SchedulerConfig,
    SimulatedExecutor, SimulatedExecutorConfig, SimulatedVenue, SimulatedVenueConfig,
    VenueQuoteSource, WorkQueue,
};
use rate_limit::RateLimiter;
use router::create_router;
use state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use types::ids::VenueId;
use types::time::now_nanos;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    tracing::info!("starting order routing gateway");
    let config = GatewayConfig::from_env()?;

    // Resolve every dependency before any background work starts; the
    // scheduler and sweeper only run once the full graph exists.
    let store: Arc<dyn OrderStore> = match &config.audit_journal_path {
        Some(path) => Arc::new(MemoryStore::with_journal(AuditJournal::open(path)?)),
        None => Arc::new(MemoryStore::new()),
    };

    let seed = now_nanos() as u64;
    let venues: Vec<Arc<dyn VenueQuoteSource>> = vec![
        Arc::new(SimulatedVenue::new(
            VenueId::new("VenueA"),
            SimulatedVenueConfig::default(),
            seed,
        )),
        Arc::new(SimulatedVenue::new(
            VenueId::new("VenueB"),
            SimulatedVenueConfig::default(),
            seed.wrapping_add(1),
        )),
    ];
    let quote_router = Arc::new(QuoteRouter::new(venues, RouterConfig::default()));
    let executor = Arc::new(SimulatedExecutor::new(
        SimulatedExecutorConfig::default(),
        seed.wrapping_add(2),
    ));
    let notifier = Arc::new(Notifier::new(NotifierConfig::default()));
    let queue: Arc<dyn WorkQueue> = Arc::new(MemoryWorkQueue::new());

    let scheduler = Arc::new(Scheduler::new(
        SchedulerConfig::default(),
        queue,
        quote_router.clone(),
        executor,
        notifier.clone(),
        store.clone(),
    ));
    scheduler.start();

    let (sweep_shutdown_tx, sweep_shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = notifier.start_sweeper(sweep_shutdown_rx);

    let state = AppState {
        scheduler: scheduler.clone(),
        store,
        notifier,
        quote_router,
        rate_limiter: Arc::new(RateLimiter::new()),
        config: Arc::new(config.clone()),
    };
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!("listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    let _ = sweep_shutdown_tx.send(true);
    let _ = sweeper.await;
    scheduler.shutdown(config.shutdown_grace).await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
