//! # Circuit Breaker
//! Per-channel failure-aware gate with the classic three states.
//!
//! CLOSED passes calls through and counts consecutive failures; OPEN fails
//! fast until a cooldown elapses; HALF_OPEN admits a bounded number of trial
//! calls before deciding to close or reopen. Owned by the channel, mutated
//! only by the retry executor reporting attempt outcomes. No I/O.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::channel::Channel;

/// Breaker state as exposed in health snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Read-only view for `HealthStatus`.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub channel: Channel,
    pub state: BreakerState,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    /// Trials admitted in HALF_OPEN that have not reported an outcome yet.
    trials_in_flight: u32,
    trial_started_at: Option<Instant>,
}

/// Thread-safe circuit breaker for one channel. One mutex per channel, so
/// concurrent requests on different channels never contend.
#[derive(Debug)]
pub struct CircuitBreaker {
    channel: Channel,
    failure_threshold: u32,
    success_threshold: u32,
    cooldown: Duration,
    max_trials: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(
        channel: Channel,
        failure_threshold: u32,
        success_threshold: u32,
        cooldown: Duration,
    ) -> Self {
        Self {
            channel,
            failure_threshold: failure_threshold.max(1),
            success_threshold: success_threshold.max(1),
            cooldown,
            max_trials: 1,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                trials_in_flight: 0,
                trial_started_at: None,
            }),
        }
    }

    /// May the next call proceed? In OPEN, the first call after the cooldown
    /// flips the breaker to HALF_OPEN and is admitted as the trial; further
    /// callers are rejected until that trial settles. A trial abandoned for
    /// longer than the cooldown (caller cancelled mid-flight) releases its
    /// slot, since an abandoned call reports neither success nor failure.
    pub fn allow(&self) -> bool {
        let mut g = self.inner.lock().expect("breaker mutex poisoned");
        match g.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = g
                    .opened_at
                    .map(|t| t.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if !elapsed {
                    return false;
                }
                g.state = BreakerState::HalfOpen;
                g.consecutive_successes = 0;
                g.trials_in_flight = 1;
                g.trial_started_at = Some(Instant::now());
                tracing::debug!(channel = %self.channel, "breaker half-open, admitting trial");
                true
            }
            BreakerState::HalfOpen => {
                if g.trials_in_flight >= self.max_trials {
                    let stale = g
                        .trial_started_at
                        .map(|t| t.elapsed() >= self.cooldown)
                        .unwrap_or(false);
                    if !stale {
                        return false;
                    }
                    g.trials_in_flight = 0;
                }
                g.trials_in_flight += 1;
                g.trial_started_at = Some(Instant::now());
                true
            }
        }
    }

    /// Report a successful attempt.
    pub fn record_success(&self) {
        let mut g = self.inner.lock().expect("breaker mutex poisoned");
        match g.state {
            BreakerState::Closed => {
                g.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                g.trials_in_flight = g.trials_in_flight.saturating_sub(1);
                g.consecutive_successes += 1;
                if g.consecutive_successes >= self.success_threshold {
                    tracing::info!(channel = %self.channel, "breaker closed after trial successes");
                    g.state = BreakerState::Closed;
                    g.consecutive_failures = 0;
                    g.consecutive_successes = 0;
                    g.opened_at = None;
                    g.trial_started_at = None;
                }
            }
            // Success in OPEN cannot happen: calls are rejected.
            BreakerState::Open => {}
        }
    }

    /// Give back a trial slot admitted by `allow()` when the call never ran
    /// (e.g. rejected by the rate window). Counts neither success nor
    /// failure, so the next caller can take the trial immediately instead of
    /// waiting out the staleness reclaim.
    pub fn release_trial(&self) {
        let mut g = self.inner.lock().expect("breaker mutex poisoned");
        if g.state == BreakerState::HalfOpen {
            g.trials_in_flight = g.trials_in_flight.saturating_sub(1);
            if g.trials_in_flight == 0 {
                g.trial_started_at = None;
            }
        }
    }

    /// Report a failed attempt.
    pub fn record_failure(&self) {
        let mut g = self.inner.lock().expect("breaker mutex poisoned");
        match g.state {
            BreakerState::Closed => {
                g.consecutive_failures += 1;
                if g.consecutive_failures >= self.failure_threshold {
                    tracing::warn!(
                        channel = %self.channel,
                        failures = g.consecutive_failures,
                        "breaker opened"
                    );
                    Self::open(&mut g);
                }
            }
            BreakerState::HalfOpen => {
                // Trial failure reopens immediately and restarts the cooldown.
                tracing::warn!(channel = %self.channel, "trial failed, breaker reopened");
                Self::open(&mut g);
            }
            BreakerState::Open => {}
        }
    }

    fn open(g: &mut Inner) {
        g.state = BreakerState::Open;
        g.opened_at = Some(Instant::now());
        g.consecutive_successes = 0;
        g.trials_in_flight = 0;
        g.trial_started_at = None;
    }

    /// Current state without transition side effects (monitoring only).
    pub fn snapshot(&self) -> BreakerSnapshot {
        let g = self.inner.lock().expect("breaker mutex poisoned");
        BreakerSnapshot {
            channel: self.channel,
            state: g.state,
            consecutive_failures: g.consecutive_failures,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    #[cfg(test)]
    pub(crate) fn force_open(&self) {
        let mut g = self.inner.lock().expect("breaker mutex poisoned");
        Self::open(&mut g);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            Channel::News,
            3,
            2,
            Duration::from_millis(cooldown_ms),
        )
    }

    #[test]
    fn opens_after_threshold_failures() {
        let b = breaker(60_000);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.snapshot().state, BreakerState::Closed);
        assert!(b.allow());
        b.record_failure();
        assert_eq!(b.snapshot().state, BreakerState::Open);
        assert!(!b.allow());
    }

    #[test]
    fn success_resets_failure_streak() {
        let b = breaker(60_000);
        b.record_failure();
        b.record_failure();
        b.record_success();
        assert_eq!(b.snapshot().consecutive_failures, 0);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.snapshot().state, BreakerState::Closed);
    }

    #[test]
    fn single_trial_after_cooldown() {
        let b = breaker(10);
        for _ in 0..3 {
            b.record_failure();
        }
        assert!(!b.allow());
        std::thread::sleep(Duration::from_millis(20));

        // First caller gets the trial, a concurrent second caller does not.
        assert!(b.allow());
        assert_eq!(b.snapshot().state, BreakerState::HalfOpen);
        assert!(!b.allow());
    }

    #[test]
    fn trial_failure_reopens_and_restarts_cooldown() {
        let b = breaker(10);
        for _ in 0..3 {
            b.record_failure();
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.allow());
        b.record_failure();
        assert_eq!(b.snapshot().state, BreakerState::Open);
        // Cooldown clock restarted, so the trial slot is not yet available.
        assert!(!b.allow());
    }

    #[test]
    fn closes_after_success_threshold() {
        let b = breaker(10);
        for _ in 0..3 {
            b.record_failure();
        }
        std::thread::sleep(Duration::from_millis(20));

        assert!(b.allow());
        b.record_success();
        assert_eq!(b.snapshot().state, BreakerState::HalfOpen);
        assert!(b.allow());
        b.record_success();
        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Closed);
        assert_eq!(snap.consecutive_failures, 0);
    }

    #[test]
    fn released_trial_slot_admits_the_next_caller() {
        let b = breaker(100);
        for _ in 0..3 {
            b.record_failure();
        }
        std::thread::sleep(Duration::from_millis(120));
        assert!(b.allow());
        assert!(!b.allow());

        // Slot handed back without an outcome, no staleness wait needed.
        b.release_trial();
        assert!(b.allow());
        assert_eq!(b.snapshot().state, BreakerState::HalfOpen);
    }

    #[test]
    fn abandoned_trial_slot_is_reclaimed() {
        let b = breaker(10);
        for _ in 0..3 {
            b.record_failure();
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.allow());
        // Trial never settles (caller cancelled). After another cooldown the
        // slot is released to a new caller.
        assert!(!b.allow());
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.allow());
    }
}
