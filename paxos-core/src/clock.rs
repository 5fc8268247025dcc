//! External collaborators for time (spec.md §6). The core never reads the wall
//! clock or a PRNG directly — both are injected so that tests (and the in-process
//! cluster harness) can drive them deterministically.

/// `Clock.now()` (spec.md §6): a monotonic, non-decreasing millisecond counter.
pub trait Clock {
    fn now(&self) -> i64;
}

/// `Random.uniform()` (spec.md §6): draws the follower's randomized election timeout
/// from `[leader_timeout_min, leader_timeout_max)`.
pub trait Random {
    fn uniform_timeout(&mut self, leader_timeout_min: i64, leader_timeout_max: i64) -> i64;
}

/// A `Clock` over a caller-managed counter, useful for tests and for any runtime that
/// already tracks its own logical time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: std::cell::Cell<i64>,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: std::cell::Cell::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.set(now);
    }

    pub fn advance(&self, by: i64) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.get()
    }
}

/// A deterministic `Random` for tests: always returns the midpoint of the range
/// (or `min` if the range is degenerate), so test traces are reproducible.
#[derive(Clone, Debug, Default)]
pub struct DeterministicRandom;

impl Random for DeterministicRandom {
    fn uniform_timeout(&mut self, leader_timeout_min: i64, leader_timeout_max: i64) -> i64 {
        if leader_timeout_max <= leader_timeout_min {
            leader_timeout_min
        } else {
            leader_timeout_min + (leader_timeout_max - leader_timeout_min) / 2
        }
    }
}
