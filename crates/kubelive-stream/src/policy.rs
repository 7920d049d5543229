//! Reconnect policy: capped exponential backoff with an attempt ceiling.
//!
//! Pure, testable state machine with no IO or clock access. Jitter is
//! applied by the connection driver, so the tracker returns pre-jitter
//! delays.

use rand::Rng;

// ─── Reconnect Policy ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt in milliseconds (default 1000).
    pub initial_delay_ms: u64,
    /// Upper bound on the pre-jitter delay in milliseconds (default 30000).
    pub max_delay_ms: u64,
    /// Exclusive upper bound of the random jitter added to each delay
    /// (default 1000).
    pub max_jitter_ms: u64,
    /// Reconnect attempts allowed before giving up (default 10).
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_jitter_ms: 1_000,
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// `min(initial * 2^attempt, max)` for a zero-based attempt.
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        self.initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms)
    }

    /// Add uniform jitter in `0..max_jitter_ms` to a delay.
    pub fn jittered(&self, delay_ms: u64) -> u64 {
        if self.max_jitter_ms == 0 {
            return delay_ms;
        }
        delay_ms.saturating_add(rand::thread_rng().gen_range(0..self.max_jitter_ms))
    }
}

// ─── Tracker ─────────────────────────────────────────────────────

/// Decision returned after a transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reconnect after `delay_ms` (before jitter). `attempt` is zero-based.
    Retry { attempt: u32, delay_ms: u64 },
    /// Ceiling reached; no further automatic attempts.
    GiveUp { attempts: u32 },
}

/// Counts consecutive failed attempts for one connection.
#[derive(Debug, Clone)]
pub struct ReconnectTracker {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Reconnect attempts scheduled since the last success or reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed open or a dropped connection.
    ///
    /// The counter is incremented here, before the delayed attempt runs.
    pub fn record_failure(&mut self) -> ReconnectDecision {
        if self.attempts >= self.policy.max_attempts {
            return ReconnectDecision::GiveUp {
                attempts: self.attempts,
            };
        }
        let attempt = self.attempts;
        self.attempts += 1;
        ReconnectDecision::Retry {
            attempt,
            delay_ms: self.policy.base_delay_ms(attempt),
        }
    }

    /// A successful open resets the counter (and so the delay).
    pub fn record_success(&mut self) {
        self.attempts = 0;
    }

    /// Manual disconnect or filter change: not a failure, start over.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_values() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.initial_delay_ms, 1_000);
        assert_eq!(p.max_delay_ms, 30_000);
        assert_eq!(p.max_jitter_ms, 1_000);
        assert_eq!(p.max_attempts, 10);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let p = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..7).map(|k| p.base_delay_ms(k)).collect();
        assert_eq!(
            delays,
            vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]
        );
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.base_delay_ms(63), 30_000);
        assert_eq!(p.base_delay_ms(200), 30_000);
    }

    #[test]
    fn jitter_stays_in_range() {
        let p = ReconnectPolicy::default();
        for _ in 0..200 {
            let d = p.jittered(4_000);
            assert!((4_000..5_000).contains(&d), "jittered delay {d}");
        }
        let none = ReconnectPolicy {
            max_jitter_ms: 0,
            ..Default::default()
        };
        assert_eq!(none.jittered(4_000), 4_000);
    }

    #[test]
    fn tracker_retries_until_ceiling() {
        let mut tracker = ReconnectTracker::new(ReconnectPolicy::default());
        for k in 0..10 {
            let decision = tracker.record_failure();
            assert_eq!(
                decision,
                ReconnectDecision::Retry {
                    attempt: k,
                    delay_ms: ReconnectPolicy::default().base_delay_ms(k),
                },
                "failure {k}"
            );
        }
        assert_eq!(tracker.attempts(), 10);
        assert_eq!(
            tracker.record_failure(),
            ReconnectDecision::GiveUp { attempts: 10 }
        );
        // Stays given up until reset.
        assert_eq!(
            tracker.record_failure(),
            ReconnectDecision::GiveUp { attempts: 10 }
        );
    }

    #[test]
    fn success_restarts_at_initial_delay() {
        let mut tracker = ReconnectTracker::new(ReconnectPolicy::default());
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_failure();
        tracker.record_success();
        assert_eq!(tracker.attempts(), 0);
        assert_eq!(
            tracker.record_failure(),
            ReconnectDecision::Retry {
                attempt: 0,
                delay_ms: 1_000
            }
        );
    }

    #[test]
    fn reset_is_not_a_failure() {
        let mut tracker = ReconnectTracker::new(ReconnectPolicy {
            max_attempts: 1,
            ..Default::default()
        });
        tracker.record_failure();
        tracker.reset();
        assert!(matches!(
            tracker.record_failure(),
            ReconnectDecision::Retry { attempt: 0, .. }
        ));
    }
}
