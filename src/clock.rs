//! Clock capability for deadline logic
//!
//! Challenge deadlines are real wall-clock time, but the decision procedure
//! takes the clock as a capability so deadline tests run without waiting.

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    /// Current Unix time in milliseconds
    fn now_ms(&self) -> u64;
}

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        // Sanity: later than 2020-01-01 and monotone enough for coarse use
        assert!(clock.now_ms() > 1_577_836_800_000);
        assert!(clock.now_ms() <= SystemClock.now_ms());
    }
}
