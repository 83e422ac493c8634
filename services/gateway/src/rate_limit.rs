use crate::error::AppError;
use dashmap::DashMap;
use std::time::Instant;

#[derive(Clone)]
struct Bucket {
    capacity: u32,
    tokens: f64,
    refill_rate: f64,
    last_update: Instant,
}

impl Bucket {
    fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate,
            last_update: Instant::now(),
        }
    }

    fn allow_request(&mut self, tokens: u32) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = f64::min(
            self.capacity as f64,
            self.tokens + elapsed * self.refill_rate,
        );
        self.last_update = now;

        if self.tokens >= tokens as f64 {
            self.tokens -= tokens as f64;
            true
        } else {
            false // Rate limited
        }
    }
}

/// Per-key token buckets, e.g. keyed "account_id:endpoint".
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    pub fn check(&self, key: &str, capacity: u32, refill_rate: f64) -> Result<(), AppError> {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(capacity, refill_rate));

        if bucket.allow_request(1) {
            Ok(())
        } else {
            Err(AppError::RateLimitExceeded(format!("rate limit for {}", key)))
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_within_capacity() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check("acct:submit", 5, 0.0).is_ok());
        }
        assert!(limiter.check("acct:submit", 5, 0.0).is_err());
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("a:submit", 1, 0.0).is_ok());
        assert!(limiter.check("a:submit", 1, 0.0).is_err());
        assert!(limiter.check("b:submit", 1, 0.0).is_ok());
    }

    #[test]
    fn test_bucket_refills_over_time() {
        let mut bucket = Bucket::new(1, 1000.0);
        assert!(bucket.allow_request(1));
        assert!(!bucket.allow_request(1));
        std::thread::sleep(std::time::Duration::from_millis(5));
        // 5ms at 1000 tokens/s refills well past one token
        assert!(bucket.allow_request(1));
    }
}
