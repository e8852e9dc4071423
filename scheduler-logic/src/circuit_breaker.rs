use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use chrono::{DateTime, Utc};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

/// Per-dependency breaker around downstream `publish` and each store
/// (`spec.md` §7). Opens after `failure_threshold` consecutive
/// failures, half-opens after `cool_down`, and closes again on the
/// first success observed while half-open.
///
/// Built from plain atomics, in the style of the `AtomicU64`/
/// `AtomicBool` state in `celestia::da::CelestiaDA`, rather than a
/// `Mutex<State>`, since every transition is a single
/// compare-and-swap on an independent field.
pub struct CircuitBreaker {
    name: &'static str,
    failure_threshold: u32,
    cool_down_seconds: i64,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    opened_at_unix: AtomicI64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, failure_threshold: u32, cool_down_seconds: i64) -> Self {
        Self {
            name,
            failure_threshold,
            cool_down_seconds,
            state: AtomicU8::new(CLOSED),
            consecutive_failures: AtomicU32::new(0),
            opened_at_unix: AtomicI64::new(0),
        }
    }

    /// Whether a call should be attempted right now. Transitions
    /// `Open -> HalfOpen` once the cool-down has elapsed.
    pub fn allow(&self, now: DateTime<Utc>) -> bool {
        match self.state.load(Ordering::Acquire) {
            CLOSED | HALF_OPEN => true,
            _ => {
                let opened_at = self.opened_at_unix.load(Ordering::Acquire);
                if now.timestamp() - opened_at >= self.cool_down_seconds {
                    let _ = self.state.compare_exchange(
                        OPEN,
                        HALF_OPEN,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn state(&self) -> BreakerState {
        match self.state.load(Ordering::Acquire) {
            CLOSED => BreakerState::Closed,
            OPEN => BreakerState::Open,
            _ => BreakerState::HalfOpen,
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        if self.state.swap(CLOSED, Ordering::AcqRel) == OPEN {
            tracing::info!(breaker = self.name, "circuit closed after recovery");
        }
    }

    pub fn record_failure(&self, now: DateTime<Utc>) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.failure_threshold {
            if self.state.swap(OPEN, Ordering::AcqRel) != OPEN {
                tracing::warn!(
                    breaker = self.name,
                    failures,
                    "circuit opened after consecutive failures"
                );
            }
            self.opened_at_unix.store(now.timestamp(), Ordering::Release);
        }
    }
}
