//! Pipeline scheduler
//!
//! Owns the worker pool and drives every order through the state machine:
//! dequeue → route → execute → terminal, with persist-then-notify on each
//! transition. Concurrency is bounded by the pool size, throughput by the
//! rolling start window, and failures feed the retry policy without ever
//! crashing a worker.
//!
//! Retries re-run routing and execution without re-emitting stages reached
//! on an earlier attempt, so the status stream a subscriber observes is
//! strictly monotonic and ends in exactly one terminal event.

use crate::executor::Executor;
use crate::notifier::Notifier;
use crate::queue::{OrderJob, WorkQueue};
use crate::rate_limit::StartWindow;
use crate::retry::RetryPolicy;
use crate::router::Router;
use dashmap::DashMap;
use futures::FutureExt;
use persistence::store::OrderStore;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::errors::{ExecutionError, OrderError, PipelineError, QueueError};
use types::event::{OrderEvent, StatusEvent};
use types::ids::OrderId;
use types::order::{ExecutionDetail, Order, OrderStatus};
use types::time::now_nanos;

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker pool size; bounds orders concurrently in flight
    pub worker_count: usize,
    /// Max processing starts within any rolling `rate_window`
    pub max_starts_per_window: usize,
    pub rate_window: Duration,
    /// Upper bound on one executor call
    pub execution_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            max_starts_per_window: 100,
            rate_window: Duration::from_secs(60),
            execution_timeout: Duration::from_secs(8),
            retry: RetryPolicy::default(),
        }
    }
}

/// Non-blocking stats snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub queued: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub retries_scheduled: u64,
}

struct Stats {
    active: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retries_scheduled: AtomicU64,
}

impl Stats {
    fn new() -> Self {
        Self {
            active: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retries_scheduled: AtomicU64::new(0),
        }
    }
}

struct Inner {
    config: SchedulerConfig,
    queue: Arc<dyn WorkQueue>,
    router: Arc<Router>,
    executor: Arc<dyn Executor>,
    notifier: Arc<Notifier>,
    store: Arc<dyn OrderStore>,
    limiter: StartWindow,
    stats: Stats,
    accepting: AtomicBool,
    /// Orders currently being processed by a worker; consulted at shutdown
    /// to mark abandoned work as recoverable
    in_flight: DashMap<OrderId, ()>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
}

/// The pipeline scheduler. All dependencies are injected up front; nothing
/// starts until [`Scheduler::start`].
pub struct Scheduler {
    inner: Arc<Inner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        queue: Arc<dyn WorkQueue>,
        router: Arc<Router>,
        executor: Arc<dyn Executor>,
        notifier: Arc<Notifier>,
        store: Arc<dyn OrderStore>,
    ) -> Self {
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        let limiter = StartWindow::new(config.max_starts_per_window, config.rate_window);
        Self {
            inner: Arc::new(Inner {
                config,
                queue,
                router,
                executor,
                notifier,
                store,
                limiter,
                stats: Stats::new(),
                accepting: AtomicBool::new(true),
                in_flight: DashMap::new(),
                shutdown_tx,
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the fixed worker pool. Idempotent.
    pub fn start(&self) {
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        if !workers.is_empty() {
            return;
        }
        for worker_id in 0..self.inner.config.worker_count {
            let inner = Arc::clone(&self.inner);
            workers.push(tokio::spawn(worker_loop(inner, worker_id)));
        }
        info!(
            workers = self.inner.config.worker_count,
            "pipeline scheduler started"
        );
    }

    /// Accept a submitted order into the pipeline. Non-blocking; returns
    /// as soon as the job is enqueued. A queue rejection surfaces as a
    /// retryable error, never a silent drop.
    pub fn submit(&self, order: &Order) -> Result<(), PipelineError> {
        if !order.order_id.is_well_formed() {
            return Err(OrderError::MalformedId.into());
        }
        if order.status != OrderStatus::Submitted {
            return Err(OrderError::NotSubmittable {
                order_id: order.order_id.to_string(),
                status: order.status.to_string(),
            }
            .into());
        }
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("scheduler is shutting down".to_string()).into());
        }
        self.inner
            .queue
            .enqueue(OrderJob::first(order.order_id))
            .map_err(PipelineError::from)?;
        debug!(order_id = %order.order_id, "order enqueued");
        Ok(())
    }

    /// Current counters; never blocks. Orders waiting out a retry backoff
    /// are in neither `queued` nor `active` — `retries_scheduled` accounts
    /// for them.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            queued: self.inner.queue.len() as u64,
            active: self.inner.stats.active.load(Ordering::Relaxed),
            completed: self.inner.stats.completed.load(Ordering::Relaxed),
            failed: self.inner.stats.failed.load(Ordering::Relaxed),
            retries_scheduled: self.inner.stats.retries_scheduled.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work, let in-flight orders finish within `grace`,
    /// then abandon the rest. Abandoned orders keep their non-terminal
    /// status and get an interruption marker in the audit trail; queued
    /// jobs stay in the queue. Nothing is silently lost.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.accepting.store(false, Ordering::SeqCst);
        let _ = self.inner.shutdown_tx.send(true);

        let mut handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            workers.drain(..).collect()
        };
        if handles.is_empty() {
            return;
        }

        let drained = tokio::time::timeout(grace, async {
            for handle in handles.iter_mut() {
                let _ = handle.await;
            }
        })
        .await;

        if drained.is_err() {
            warn!("shutdown grace deadline exceeded; abandoning in-flight work");
            for handle in &handles {
                handle.abort();
            }
            for entry in self.inner.in_flight.iter() {
                let order_id = *entry.key();
                warn!(%order_id, "order interrupted by shutdown; recoverable on restart");
                if let Err(e) = self
                    .inner
                    .store
                    .record_interruption(order_id, "scheduler shutdown before terminal state")
                    .await
                {
                    error!(%order_id, error = %e, "failed to record interruption");
                }
            }
        }
        info!("pipeline scheduler stopped");
    }
}

async fn worker_loop(inner: Arc<Inner>, worker_id: usize) {
    let mut shutdown = inner.shutdown_tx.subscribe();
    loop {
        let job = tokio::select! {
            _ = shutdown.changed() => break,
            job = inner.queue.dequeue() => match job {
                Some(job) => job,
                None => break,
            },
        };

        // Rate-bound processing starts across the whole pool
        inner.limiter.acquire().await;

        inner.stats.active.fetch_add(1, Ordering::Relaxed);
        inner.in_flight.insert(job.order_id, ());

        // A panic inside per-order processing is converted into the normal
        // failure path; it never takes down the worker or the pool.
        let outcome = AssertUnwindSafe(process_order(&inner, job))
            .catch_unwind()
            .await;
        if outcome.is_err() {
            error!(order_id = %job.order_id, worker_id, "order processing panicked");
            handle_failure(&inner, job, "internal processing fault".to_string()).await;
        }

        inner.in_flight.remove(&job.order_id);
        inner.stats.active.fetch_sub(1, Ordering::Relaxed);
    }
    debug!(worker_id, "worker stopped");
}

async fn process_order(inner: &Arc<Inner>, job: OrderJob) {
    let mut order = match inner.store.fetch_order(job.order_id).await {
        Ok(order) => order,
        Err(e) => {
            warn!(order_id = %job.order_id, error = %e, "dropping job for unknown order");
            return;
        }
    };
    if order.is_terminal() {
        debug!(order_id = %order.order_id, status = %order.status, "skipping job for terminal order");
        return;
    }

    info!(
        order_id = %order.order_id,
        attempt = job.attempt,
        symbol = %order.symbol,
        side = %order.side,
        "processing order"
    );

    advance_stage(inner, &mut order, OrderStatus::Processing, "claimed by worker").await;
    advance_stage(inner, &mut order, OrderStatus::Routing, "comparing venue quotes").await;

    let decision = match inner
        .router
        .find_best_route(&order.symbol, order.quantity, order.side)
        .await
    {
        Ok(decision) => decision,
        Err(e) => {
            handle_failure(inner, job, e.to_string()).await;
            return;
        }
    };

    let message = format!("executing at {}", decision.best.venue);
    advance_stage(inner, &mut order, OrderStatus::Executing, &message).await;

    let result = tokio::time::timeout(
        inner.config.execution_timeout,
        inner.executor.execute(&order, &decision.best),
    )
    .await;
    match result {
        Ok(Ok(detail)) => complete_order(inner, &mut order, detail).await,
        Ok(Err(e)) => handle_failure(inner, job, e.to_string()).await,
        Err(_) => {
            let e = ExecutionError::Timeout {
                venue: decision.best.venue.to_string(),
            };
            handle_failure(inner, job, e.to_string()).await;
        }
    }
}

/// Advance one stage if the order is not already there. Retry attempts
/// pass through stages reached earlier without re-emitting them, keeping
/// the observed status stream strictly monotonic.
async fn advance_stage(inner: &Arc<Inner>, order: &mut Order, next: OrderStatus, message: &str) {
    if !order.status.can_transition_to(next) {
        return;
    }
    let previous = order.status;
    let now = now_nanos();
    if let Err(e) = order.advance(next, now) {
        error!(order_id = %order.order_id, error = %e, "stage advance rejected");
        return;
    }
    let event = StatusEvent::transition(
        order.order_id,
        order.account_id,
        previous,
        next,
        message,
        now,
    );
    persist_then_notify(inner, order, &event, None).await;
}

/// Persist the transition, then publish it. The apparent order is always
/// persist-then-notify; notification is best-effort and a transition that
/// failed to persist is not announced.
async fn persist_then_notify(
    inner: &Arc<Inner>,
    order: &Order,
    event: &StatusEvent,
    terminal: Option<OrderEvent>,
) {
    if let Err(e) = inner.store.record_transition(order, event).await {
        error!(order_id = %order.order_id, error = %e, "failed to persist transition");
        return;
    }
    let envelope = terminal.unwrap_or_else(|| OrderEvent::Status(event.clone()));
    inner.notifier.publish(order.account_id, &envelope);
}

async fn complete_order(inner: &Arc<Inner>, order: &mut Order, detail: ExecutionDetail) {
    let previous = order.status;
    let now = now_nanos();
    if let Err(e) = order.complete(detail, now) {
        error!(order_id = %order.order_id, error = %e, "completion rejected by state machine");
        return;
    }

    let event = StatusEvent::transition(
        order.order_id,
        order.account_id,
        previous,
        OrderStatus::Completed,
        "order filled",
        now,
    );
    if let Err(e) = inner.store.record_transition(order, &event).await {
        error!(order_id = %order.order_id, error = %e, "failed to persist completion");
        return;
    }
    if let Err(e) = inner.store.record_execution(order).await {
        error!(order_id = %order.order_id, error = %e, "failed to persist execution detail");
    }

    if let Some(detail) = order.execution.clone() {
        info!(
            order_id = %order.order_id,
            venue = %detail.venue,
            price = %detail.realized_price,
            "order completed"
        );
        inner.notifier.publish(
            order.account_id,
            &OrderEvent::Completed {
                order_id: order.order_id,
                account_id: order.account_id,
                detail,
                timestamp: now,
            },
        );
    }
    inner.stats.completed.fetch_add(1, Ordering::Relaxed);
}

/// Apply the retry policy to a failed attempt. While attempts remain the
/// retry is scheduled off-worker and the subscriber sees no regression;
/// once exhausted the order goes terminal with the captured reason.
async fn handle_failure(inner: &Arc<Inner>, job: OrderJob, reason: String) {
    if let Some(delay) = inner.config.retry.delay_after(job.attempt) {
        inner.stats.retries_scheduled.fetch_add(1, Ordering::Relaxed);
        warn!(
            order_id = %job.order_id,
            attempt = job.attempt,
            delay_ms = delay.as_millis() as u64,
            %reason,
            "attempt failed; retry scheduled"
        );
        let queue = Arc::clone(&inner.queue);
        let next = job.next_attempt();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.enqueue(next) {
                error!(order_id = %next.order_id, error = %e, "failed to re-enqueue retry");
            }
        });
        return;
    }

    let mut order = match inner.store.fetch_order(job.order_id).await {
        Ok(order) => order,
        Err(e) => {
            error!(order_id = %job.order_id, error = %e, "failed order not found in store");
            return;
        }
    };
    if order.is_terminal() {
        return;
    }

    let previous = order.status;
    let now = now_nanos();
    if let Err(e) = order.fail(reason.clone(), now) {
        error!(order_id = %order.order_id, error = %e, "failure transition rejected");
        return;
    }
    let event = StatusEvent::transition(
        order.order_id,
        order.account_id,
        previous,
        OrderStatus::Failed,
        reason.clone(),
        now,
    );
    persist_then_notify(
        inner,
        &order,
        &event,
        Some(OrderEvent::Failed {
            order_id: order.order_id,
            account_id: order.account_id,
            reason: reason.clone(),
            timestamp: now,
        }),
    )
    .await;
    inner.stats.failed.fetch_add(1, Ordering::Relaxed);
    error!(order_id = %order.order_id, %reason, "order failed after exhausting attempts");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{SimulatedExecutor, SimulatedExecutorConfig};
    use crate::notifier::NotifierConfig;
    use crate::queue::MemoryWorkQueue;
    use crate::router::RouterConfig;
    use crate::venue::{SimulatedVenue, SimulatedVenueConfig, VenueQuoteSource};
    use persistence::store::MemoryStore;
    use types::ids::{AccountId, MarketId, VenueId};
    use types::numeric::Quantity;
    use types::order::Side;

    fn build_scheduler() -> (Scheduler, Arc<MemoryStore>, Arc<dyn WorkQueue>) {
        let queue: Arc<dyn WorkQueue> = Arc::new(MemoryWorkQueue::new());
        let store = Arc::new(MemoryStore::new());
        let venues: Vec<Arc<dyn VenueQuoteSource>> = vec![Arc::new(SimulatedVenue::new(
            VenueId::new("VenueA"),
            SimulatedVenueConfig::default(),
            1,
        ))];
        let router = Arc::new(Router::new(venues, RouterConfig::default()));
        let executor = Arc::new(SimulatedExecutor::new(SimulatedExecutorConfig::default(), 1));
        let notifier = Arc::new(Notifier::new(NotifierConfig::default()));
        let scheduler = Scheduler::new(
            SchedulerConfig::default(),
            queue.clone(),
            router,
            executor,
            notifier,
            store.clone(),
        );
        (scheduler, store, queue)
    }

    fn make_order() -> Order {
        Order::new(
            AccountId::new(),
            MarketId::new("SOL/USDC"),
            Side::BUY,
            Quantity::from_str("2.5").unwrap(),
            now_nanos(),
        )
    }

    #[tokio::test]
    async fn test_submit_enqueues() {
        let (scheduler, store, _) = build_scheduler();
        let order = make_order();
        store.create_order(&order).await.unwrap();

        scheduler.submit(&order).unwrap();
        assert_eq!(scheduler.stats().queued, 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_non_submitted_status() {
        let (scheduler, _, _) = build_scheduler();
        let mut order = make_order();
        order.advance(OrderStatus::Processing, now_nanos()).unwrap();

        let err = scheduler.submit(&order).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Order(OrderError::NotSubmittable { .. })
        ));
    }

    #[tokio::test]
    async fn test_submit_rejects_malformed_id() {
        let (scheduler, _, _) = build_scheduler();
        let mut order = make_order();
        order.order_id = OrderId::from_uuid(uuid::Uuid::nil());

        let err = scheduler.submit(&order).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Order(OrderError::MalformedId)
        ));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_retryable_infrastructure_error() {
        let (scheduler, store, _) = build_scheduler();
        scheduler.shutdown(Duration::from_millis(10)).await;

        let order = make_order();
        store.create_order(&order).await.unwrap();
        let err = scheduler.submit(&order).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Queue(QueueError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_queue_surfaces_to_submitter() {
        let (scheduler, store, queue) = build_scheduler();
        queue.close();

        let order = make_order();
        store.create_order(&order).await.unwrap();
        let err = scheduler.submit(&order).unwrap_err();
        assert!(matches!(err, PipelineError::Queue(QueueError::Closed)));
    }

    #[tokio::test]
    async fn test_stats_start_at_zero() {
        let (scheduler, _, _) = build_scheduler();
        let stats = scheduler.stats();
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.failed, 0);
    }
}
