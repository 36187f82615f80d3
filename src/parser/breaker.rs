// src/parser/breaker.rs
// Circuit breaker for the external parser — tracks consecutive failures and
// temporarily stops calling a collaborator that is down or overloaded.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
enum State {
    /// Normal operation — counting consecutive failures.
    Closed { failures: u32 },
    /// Tripped — calls are skipped until cooldown expires.
    Open { tripped_at: Instant },
}

/// Thread-safe two-state circuit breaker. After `failure_threshold`
/// consecutive failures the circuit opens for `cooldown`; once the cooldown
/// elapses it closes again with the counter reset.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<State>,
    /// Calls skipped while the circuit was open.
    suppressed: Mutex<u64>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(State::Closed { failures: 0 }),
            suppressed: Mutex::new(0),
        }
    }

    /// Whether a call may proceed. An open circuit whose cooldown has
    /// elapsed closes here, with the failure counter reset.
    pub fn allow(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return true; // Poisoned mutex: let the call through
        };
        match &*state {
            State::Closed { .. } => true,
            State::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    info!("Parser circuit cooldown elapsed, closing");
                    *state = State::Closed { failures: 0 };
                    true
                } else {
                    if let Ok(mut suppressed) = self.suppressed.lock() {
                        *suppressed += 1;
                    }
                    false
                }
            }
        }
    }

    /// A successful call resets the consecutive-failure counter.
    pub fn record_success(&self) {
        if let Ok(mut state) = self.state.lock() {
            if let State::Closed { .. } = &*state {
                *state = State::Closed { failures: 0 };
            }
        }
    }

    /// A failure (network error, non-success status, or timeout). May trip
    /// the circuit.
    pub fn record_failure(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let State::Closed { failures } = &*state {
            let failures = failures + 1;
            if failures >= self.failure_threshold {
                warn!(
                    failures,
                    cooldown_secs = self.cooldown.as_secs(),
                    "Parser circuit tripped — external calls suspended"
                );
                *state = State::Open {
                    tripped_at: Instant::now(),
                };
            } else {
                *state = State::Closed { failures };
            }
        }
    }

    /// Total calls skipped while open (diagnostics only).
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.lock().map(|s| *s).unwrap_or(0)
    }

    pub fn is_open(&self) -> bool {
        match self.state.lock() {
            Ok(state) => matches!(&*state, State::Open { tripped_at } if tripped_at.elapsed() < self.cooldown),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(threshold, Duration::from_secs(60))
    }

    #[test]
    fn test_fresh_breaker_allows() {
        assert!(breaker(3).allow());
    }

    #[test]
    fn test_below_threshold_stays_closed() {
        let cb = breaker(3);
        cb.record_failure();
        cb.record_failure();
        assert!(cb.allow());
        assert!(!cb.is_open());
    }

    #[test]
    fn test_threshold_failures_trip_circuit() {
        let cb = breaker(3);
        for _ in 0..3 {
            cb.record_failure();
        }
        assert!(cb.is_open());
        assert!(!cb.allow());
    }

    #[test]
    fn test_success_resets_counter() {
        let cb = breaker(3);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
    }

    #[test]
    fn test_open_circuit_counts_suppressed_calls() {
        let cb = breaker(1);
        cb.record_failure();
        assert!(!cb.allow());
        assert!(!cb.allow());
        assert_eq!(cb.suppressed_count(), 2);
    }

    #[test]
    fn test_cooldown_elapsed_closes_and_resets() {
        let cb = CircuitBreaker::new(2, Duration::from_millis(0));
        cb.record_failure();
        cb.record_failure();
        // Zero cooldown: the next allow() closes the circuit immediately
        assert!(cb.allow());
        // Counter was reset — one failure should not re-trip
        cb.record_failure();
        assert!(cb.allow());
    }
}
