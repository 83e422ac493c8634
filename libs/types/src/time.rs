//! Timestamp capture
//!
//! All timestamps in the system are Unix nanoseconds as i64, captured here
//! so tests can compare against a single convention.

use chrono::Utc;

/// Current wall-clock time as Unix nanoseconds.
pub fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_nanos_monotonic_enough() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
        // Sanity: after 2020, before 2120
        assert!(a > 1_577_836_800_000_000_000);
        assert!(a < 4_733_510_400_000_000_000);
    }
}
