//! Shared work queue
//!
//! The queue is the only hand-off point between intake and the worker pool.
//! A job is dequeued by exactly one worker, which is what gives the
//! pipeline its single-writer-per-order guarantee; no in-memory locking of
//! order records is needed anywhere.
//!
//! The trait is the injected "work-queue client" handle: the in-memory
//! implementation below backs tests and the simulated deployment, a
//! broker-backed one can be dropped in without touching the scheduler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use types::errors::QueueError;
use types::ids::OrderId;

/// One unit of scheduled work: an order and which attempt this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderJob {
    pub order_id: OrderId,
    /// 1-based attempt counter
    pub attempt: u32,
}

impl OrderJob {
    /// The initial attempt for a freshly submitted order.
    pub fn first(order_id: OrderId) -> Self {
        Self {
            order_id,
            attempt: 1,
        }
    }

    /// The follow-up job scheduled after a failed attempt.
    pub fn next_attempt(self) -> Self {
        Self {
            order_id: self.order_id,
            attempt: self.attempt + 1,
        }
    }
}

/// FIFO-by-arrival work queue shared by all workers.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue a job without blocking. `QueueError` means the backing
    /// queue cannot accept work; callers must surface it, never drop the
    /// job silently.
    fn enqueue(&self, job: OrderJob) -> Result<(), QueueError>;

    /// Wait for the next job. Returns `None` once the queue is closed and
    /// drained.
    async fn dequeue(&self) -> Option<OrderJob>;

    /// Jobs currently waiting.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting new jobs; waiting workers drain what is left.
    fn close(&self);
}

/// Unbounded in-memory FIFO queue over an MPMC channel.
pub struct MemoryWorkQueue {
    tx: Mutex<Option<flume::Sender<OrderJob>>>,
    rx: flume::Receiver<OrderJob>,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }
}

impl Default for MemoryWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    fn enqueue(&self, job: OrderJob) -> Result<(), QueueError> {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        match tx.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| QueueError::Closed),
            None => Err(QueueError::Closed),
        }
    }

    async fn dequeue(&self) -> Option<OrderJob> {
        self.rx.recv_async().await.ok()
    }

    fn len(&self) -> usize {
        self.rx.len()
    }

    fn close(&self) {
        let mut tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        tx.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MemoryWorkQueue::new();
        let a = OrderJob::first(OrderId::new());
        let b = OrderJob::first(OrderId::new());

        queue.enqueue(a).unwrap();
        queue.enqueue(b).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue().await, Some(a));
        assert_eq!(queue.dequeue().await, Some(b));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = MemoryWorkQueue::new();
        let job = OrderJob::first(OrderId::new());
        queue.enqueue(job).unwrap();
        queue.close();

        // Enqueue after close is rejected, not dropped silently
        assert!(matches!(
            queue.enqueue(OrderJob::first(OrderId::new())),
            Err(QueueError::Closed)
        ));

        // Remaining work is still drained before the end-of-queue signal
        assert_eq!(queue.dequeue().await, Some(job));
        assert_eq!(queue.dequeue().await, None);
    }

    #[tokio::test]
    async fn test_attempt_counter() {
        let job = OrderJob::first(OrderId::new());
        assert_eq!(job.attempt, 1);
        assert_eq!(job.next_attempt().attempt, 2);
        assert_eq!(job.next_attempt().order_id, job.order_id);
    }

    #[tokio::test]
    async fn test_single_consumer_per_job() {
        let queue = std::sync::Arc::new(MemoryWorkQueue::new());
        for _ in 0..100 {
            queue.enqueue(OrderJob::first(OrderId::new())).unwrap();
        }
        queue.close();

        // Two competing consumers never observe the same job
        let q1 = queue.clone();
        let q2 = queue.clone();
        let c1 = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(job) = q1.dequeue().await {
                seen.push(job.order_id);
            }
            seen
        });
        let c2 = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(job) = q2.dequeue().await {
                seen.push(job.order_id);
            }
            seen
        });

        let (seen1, seen2) = (c1.await.unwrap(), c2.await.unwrap());
        assert_eq!(seen1.len() + seen2.len(), 100);
        for id in &seen1 {
            assert!(!seen2.contains(id));
        }
    }
}
