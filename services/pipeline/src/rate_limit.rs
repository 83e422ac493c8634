//! Rolling-window rate limiting on processing starts
//!
//! Bounds how many order-processing starts may occur within any rolling
//! window. Workers call [`StartWindow::acquire`] after dequeueing and
//! before touching the order; the call suspends until a slot frees up, so
//! the bound holds across the whole pool without busy-waiting.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rolling-window counter: at most `max_starts` within any `window`.
pub struct StartWindow {
    max_starts: usize,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl StartWindow {
    pub fn new(max_starts: usize, window: Duration) -> Self {
        Self {
            max_starts,
            window,
            starts: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a processing start, waiting until the window has room.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut starts = self.starts.lock().await;
                let now = Instant::now();
                Self::prune(&mut starts, now, self.window);

                if starts.len() < self.max_starts {
                    starts.push_back(now);
                    return;
                }
                // Window full: sleep until the oldest start expires.
                // front() is Some here since max_starts > 0 kept us out of
                // the branch above.
                match starts.front() {
                    Some(oldest) => (*oldest + self.window).saturating_duration_since(now),
                    None => Duration::from_millis(1),
                }
            };
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Record a start only if the window has room right now.
    pub async fn try_acquire(&self) -> bool {
        let mut starts = self.starts.lock().await;
        let now = Instant::now();
        Self::prune(&mut starts, now, self.window);
        if starts.len() < self.max_starts {
            starts.push_back(now);
            true
        } else {
            false
        }
    }

    /// Starts currently counted in the window.
    pub async fn current_load(&self) -> usize {
        let mut starts = self.starts.lock().await;
        Self::prune(&mut starts, Instant::now(), self.window);
        starts.len()
    }

    fn prune(starts: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = starts.front() {
            if now.duration_since(*oldest) >= window {
                starts.pop_front();
            } else {
                break;
            }
        }
    }
}
