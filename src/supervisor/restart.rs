//! Bounded restart policy for crashed backends.
//!
//! The reference behavior relaunched a crashed backend on every tick with
//! no ceiling, which turns a backend that dies on startup into a tight
//! restart loop. Relaunches here are spaced by exponential backoff and
//! capped by a consecutive-failure ceiling.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RestartPolicy {
    pub max_consecutive_failures: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RestartPolicy {
    /// Delay before the nth consecutive relaunch attempt (1-based). The
    /// first relaunch is immediate, so a one-off crash is replaced on the
    /// tick that detects it; backoff starts with the second failure.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures <= 1 {
            return Duration::ZERO;
        }
        let exponent = (failures - 2).min(31);
        let delay_ms = (self.base_delay.as_millis() as f64
            * self.backoff_multiplier.powi(exponent as i32)) as u64;
        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}

/// Per-backend restart state, driven by the monitor loop.
#[derive(Debug)]
pub struct RestartTracker {
    consecutive_failures: u32,
    next_attempt: Option<Instant>,
}

impl RestartTracker {
    pub fn new() -> Self {
        Self {
            consecutive_failures: 0,
            next_attempt: None,
        }
    }

    /// Called when the backend is observed alive on a tick.
    pub fn note_healthy(&mut self) {
        self.consecutive_failures = 0;
        self.next_attempt = None;
    }

    /// Called when a crash or a failed relaunch is observed. Returns the
    /// new consecutive-failure count; the next attempt is scheduled with
    /// backoff from `now`.
    pub fn note_failure(&mut self, policy: &RestartPolicy, now: Instant) -> u32 {
        self.consecutive_failures += 1;
        self.next_attempt = Some(now + policy.delay_for(self.consecutive_failures));
        self.consecutive_failures
    }

    /// Called once a relaunch has been issued; the entry is considered
    /// provisional until the next tick sees it alive.
    pub fn note_relaunched(&mut self) {
        self.next_attempt = None;
    }

    /// Whether a relaunch attempt is due.
    pub fn ready(&self, now: Instant) -> bool {
        match self.next_attempt {
            Some(at) => now >= at,
            None => true,
        }
    }

    pub fn pending(&self) -> bool {
        self.next_attempt.is_some()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

impl Default for RestartTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_progression() {
        let policy = RestartPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RestartPolicy::default();
        assert_eq!(policy.delay_for(20), policy.max_delay);
        assert_eq!(policy.delay_for(u32::MAX), policy.max_delay);
    }

    #[test]
    fn test_tracker_schedules_and_resets() {
        let policy = RestartPolicy::default();
        let mut tracker = RestartTracker::new();
        let now = Instant::now();

        assert!(tracker.ready(now));
        // First failure relaunches immediately, the second backs off.
        assert_eq!(tracker.note_failure(&policy, now), 1);
        assert!(tracker.pending());
        assert!(tracker.ready(now));
        assert_eq!(tracker.note_failure(&policy, now), 2);
        assert!(!tracker.ready(now));
        assert!(tracker.ready(now + Duration::from_millis(100)));

        tracker.note_healthy();
        assert_eq!(tracker.consecutive_failures(), 0);
        assert!(tracker.ready(now));
    }

    #[test]
    fn test_failures_accumulate_until_healthy() {
        let policy = RestartPolicy::default();
        let mut tracker = RestartTracker::new();
        let now = Instant::now();

        for expected in 1..=4 {
            assert_eq!(tracker.note_failure(&policy, now), expected);
        }
        tracker.note_healthy();
        assert_eq!(tracker.note_failure(&policy, now), 1);
    }
}
