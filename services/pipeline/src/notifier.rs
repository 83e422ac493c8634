//! Event fan-out to subscriber channels
//!
//! Keeps an owner-keyed registry of live channels. Publishing to an owner
//! with no channels is a no-op; a channel that fails a send (closed, or
//! lagging with a full buffer) is dropped from the registry while delivery
//! continues to the rest. Per-channel ordering follows publish order; no
//! ordering is guaranteed across channels.
//!
//! A background sweep evicts channels that have shown no activity within
//! the liveness window, closing them with a policy reason code.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use types::event::OrderEvent;
use types::ids::AccountId;
use types::time::now_nanos;

/// Identifier of one subscriber channel.
pub type ChannelId = u64;

/// Reason code sent when the liveness sweep closes a channel.
pub const CLOSE_CODE_IDLE: &str = "POLICY_IDLE_TIMEOUT";

/// What a subscriber channel receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelMessage {
    /// A lifecycle event for one of the owner's orders
    Event { event: OrderEvent },
    /// The notifier closed this channel; no more messages will follow
    Closed { code: String, reason: String },
}

/// Notifier tuning.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Evict channels with no activity for this long
    pub idle_timeout: Duration,
    /// How often the sweep runs
    pub sweep_interval: Duration,
    /// Per-channel outbound buffer; a full buffer marks the channel as
    /// lagging and it is dropped rather than blocking the publisher
    pub channel_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            channel_capacity: 64,
        }
    }
}

struct ChannelHandle {
    id: ChannelId,
    sender: mpsc::Sender<ChannelMessage>,
    /// Unix nanos of the last observed client activity
    last_activity: AtomicI64,
}

/// Owner-keyed registry of live subscriber channels.
pub struct Notifier {
    channels: DashMap<AccountId, Vec<ChannelHandle>>,
    next_id: AtomicU64,
    config: NotifierConfig,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Register a new channel for `account`; events published for that
    /// account from this moment on are delivered to the returned receiver.
    pub fn subscribe(&self, account: AccountId) -> (ChannelId, mpsc::Receiver<ChannelMessage>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = ChannelHandle {
            id,
            sender: tx,
            last_activity: AtomicI64::new(now_nanos()),
        };
        self.channels.entry(account).or_default().push(handle);
        debug!(%account, channel = id, "subscriber channel registered");
        (id, rx)
    }

    /// Remove a channel (client disconnected).
    pub fn unsubscribe(&self, account: AccountId, id: ChannelId) {
        if let Some(mut entry) = self.channels.get_mut(&account) {
            entry.retain(|h| h.id != id);
            let empty = entry.is_empty();
            drop(entry);
            if empty {
                self.channels.remove_if(&account, |_, v| v.is_empty());
            }
        }
    }

    /// Record client activity on a channel, deferring its eviction.
    pub fn touch(&self, account: AccountId, id: ChannelId) {
        self.touch_at(account, id, now_nanos());
    }

    /// Record client activity with an explicit timestamp.
    pub fn touch_at(&self, account: AccountId, id: ChannelId, now: i64) {
        if let Some(entry) = self.channels.get(&account) {
            if let Some(handle) = entry.iter().find(|h| h.id == id) {
                handle.last_activity.store(now, Ordering::Relaxed);
            }
        }
    }

    /// Deliver an event to every channel registered for `account`.
    ///
    /// Zero registered channels is a no-op. A channel that fails the send
    /// is dropped; the rest still get the event. Returns the number of
    /// channels the event reached.
    pub fn publish(&self, account: AccountId, event: &OrderEvent) -> usize {
        let Some(mut entry) = self.channels.get_mut(&account) else {
            return 0;
        };

        let mut delivered = 0;
        entry.retain(|handle| {
            match handle.sender.try_send(ChannelMessage::Event {
                event: event.clone(),
            }) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    debug!(%account, channel = handle.id, "dropping lagging subscriber channel");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%account, channel = handle.id, "dropping closed subscriber channel");
                    false
                }
            }
        });

        let empty = entry.is_empty();
        drop(entry);
        if empty {
            self.channels.remove_if(&account, |_, v| v.is_empty());
        }
        delivered
    }

    /// Live channels across all owners.
    pub fn channel_count(&self) -> usize {
        self.channels.iter().map(|e| e.value().len()).sum()
    }

    /// One sweep pass: evict channels idle past the timeout, closing each
    /// with the policy reason code. Returns the number evicted.
    pub fn sweep_once(&self, now: i64) -> usize {
        let idle_nanos = self.config.idle_timeout.as_nanos() as i64;
        let accounts: Vec<AccountId> = self.channels.iter().map(|e| *e.key()).collect();

        let mut evicted = 0;
        for account in accounts {
            if let Some(mut entry) = self.channels.get_mut(&account) {
                entry.retain(|handle| {
                    let idle = now - handle.last_activity.load(Ordering::Relaxed) >= idle_nanos;
                    if idle {
                        let _ = handle.sender.try_send(ChannelMessage::Closed {
                            code: CLOSE_CODE_IDLE.to_string(),
                            reason: "no activity within the liveness window".to_string(),
                        });
                        evicted += 1;
                        false
                    } else {
                        true
                    }
                });
                let empty = entry.is_empty();
                drop(entry);
                if empty {
                    self.channels.remove_if(&account, |_, v| v.is_empty());
                }
            }
        }
        evicted
    }

    /// Spawn the background liveness sweep; stops on shutdown signal.
    pub fn start_sweeper(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(notifier.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = notifier.sweep_once(now_nanos());
                        if evicted > 0 {
                            debug!(evicted, "evicted idle subscriber channels");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::event::StatusEvent;
    use types::ids::OrderId;
    use types::order::OrderStatus;

    fn make_event(account: AccountId) -> OrderEvent {
        OrderEvent::Status(StatusEvent::transition(
            OrderId::new(),
            account,
            OrderStatus::Submitted,
            OrderStatus::Processing,
            "claimed by worker",
            now_nanos(),
        ))
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let notifier = Notifier::new(NotifierConfig::default());
        let delivered = notifier.publish(AccountId::new(), &make_event(AccountId::new()));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_all_channels_receive_in_publish_order() {
        let notifier = Notifier::new(NotifierConfig::default());
        let account = AccountId::new();
        let (_, mut rx1) = notifier.subscribe(account);
        let (_, mut rx2) = notifier.subscribe(account);

        let events: Vec<OrderEvent> = (0..3).map(|_| make_event(account)).collect();
        for event in &events {
            assert_eq!(notifier.publish(account, event), 2);
        }

        for rx in [&mut rx1, &mut rx2] {
            for expected in &events {
                match rx.recv().await.unwrap() {
                    ChannelMessage::Event { event } => {
                        assert_eq!(event.order_id(), expected.order_id())
                    }
                    other => panic!("unexpected message: {:?}", other),
                }
            }
        }
    }

    #[tokio::test]
    async fn test_failed_channel_dropped_others_survive() {
        let notifier = Notifier::new(NotifierConfig::default());
        let account = AccountId::new();
        let (_, rx1) = notifier.subscribe(account);
        let (_, mut rx2) = notifier.subscribe(account);
        assert_eq!(notifier.channel_count(), 2);

        // Close the first channel mid-stream
        drop(rx1);

        let delivered = notifier.publish(account, &make_event(account));
        assert_eq!(delivered, 1);
        assert_eq!(notifier.channel_count(), 1);
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_lagging_channel_is_disconnected() {
        let config = NotifierConfig {
            channel_capacity: 1,
            ..NotifierConfig::default()
        };
        let notifier = Notifier::new(config);
        let account = AccountId::new();
        let (_, _rx) = notifier.subscribe(account);

        // First fill the buffer, then overflow it without draining
        assert_eq!(notifier.publish(account, &make_event(account)), 1);
        assert_eq!(notifier.publish(account, &make_event(account)), 0);
        assert_eq!(notifier.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_channel() {
        let notifier = Notifier::new(NotifierConfig::default());
        let account = AccountId::new();
        let (id, _rx) = notifier.subscribe(account);
        assert_eq!(notifier.channel_count(), 1);

        notifier.unsubscribe(account, id);
        assert_eq!(notifier.channel_count(), 0);
        assert_eq!(notifier.publish(account, &make_event(account)), 0);
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_idle_channels() {
        let notifier = Notifier::new(NotifierConfig {
            idle_timeout: Duration::from_secs(300),
            ..NotifierConfig::default()
        });
        let account = AccountId::new();
        let (_, mut idle_rx) = notifier.subscribe(account);
        let (live_id, _live_rx) = notifier.subscribe(account);

        // Five simulated minutes pass; only the second client shows
        // activity near the sweep
        let later = now_nanos() + Duration::from_secs(301).as_nanos() as i64;
        notifier.touch_at(account, live_id, later - 1);

        let evicted = notifier.sweep_once(later);
        assert_eq!(evicted, 1);
        assert_eq!(notifier.channel_count(), 1);

        match idle_rx.recv().await.unwrap() {
            ChannelMessage::Closed { code, .. } => assert_eq!(code, CLOSE_CODE_IDLE),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fresh_channels_survive_sweep() {
        let notifier = Notifier::new(NotifierConfig::default());
        let account = AccountId::new();
        let (_, _rx) = notifier.subscribe(account);

        let evicted = notifier.sweep_once(now_nanos());
        assert_eq!(evicted, 0);
        assert_eq!(notifier.channel_count(), 1);
    }

    #[tokio::test]
    async fn test_background_sweeper_closes_idle_channels() {
        let config = NotifierConfig {
            idle_timeout: Duration::from_millis(0),
            sweep_interval: Duration::from_millis(10),
            ..NotifierConfig::default()
        };
        let notifier = Arc::new(Notifier::new(config));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweeper = notifier.start_sweeper(shutdown_rx);

        let (_, mut rx) = notifier.subscribe(AccountId::new());
        let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("sweeper should close the channel");
        assert!(matches!(message, Some(ChannelMessage::Closed { .. })));

        shutdown_tx.send(true).unwrap();
        sweeper.await.unwrap();
    }
}
