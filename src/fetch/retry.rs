//! Retry policy for the weather API fetch.
//!
//! Modeled as an explicit state machine rather than a bare loop so the
//! attempt counting and backoff delays are testable on their own. The
//! driver in `client.rs` owns the actual sleeping and HTTP work; this
//! module only decides what happens next.

use std::time::Duration;

/// HTTP statuses worth another attempt: rate limiting and transient
/// server-side failures.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Exponential backoff without jitter: delay = `backoff_base * 2^attempt`,
/// with `attempt` counted from 0. `max_retries` is the number of *extra*
/// attempts after the first one.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }

    /// Advance the machine after an attempt has concluded.
    pub fn next(&self, state: RetryState, outcome: AttemptOutcome) -> RetryState {
        match (state, outcome) {
            (RetryState::Attempting { .. }, AttemptOutcome::Done) => RetryState::Succeeded,
            (RetryState::Attempting { attempt }, AttemptOutcome::Transient) => {
                if attempt < self.max_retries {
                    RetryState::BackingOff {
                        attempt: attempt + 1,
                        delay: self.backoff_delay(attempt),
                    }
                } else {
                    RetryState::Exhausted
                }
            }
            // Terminal states and mid-backoff states do not advance on
            // attempt outcomes.
            (state, _) => state,
        }
    }
}

/// How one attempt ended. `Done` covers success *and* non-retryable HTTP
/// errors: both stop the machine and hand the response to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Done,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    BackingOff { attempt: u32, delay: Duration },
    Succeeded,
    Exhausted,
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting { attempt: 0 }
    }

    /// Leave the backoff state once the delay has been slept.
    pub fn resume(self) -> Self {
        match self {
            RetryState::BackingOff { attempt, .. } => RetryState::Attempting { attempt },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32, base_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(base_ms),
        }
    }

    #[test]
    fn retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status}");
        }
        for status in [200, 201, 400, 401, 404, 418, 501, 505] {
            assert!(!is_retryable_status(status), "{status}");
        }
    }

    #[test]
    fn delays_double_per_attempt() {
        let p = policy(5, 100);
        assert_eq!(p.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(p.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(p.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(p.backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn success_on_first_attempt() {
        let p = policy(3, 100);
        let state = p.next(RetryState::start(), AttemptOutcome::Done);
        assert_eq!(state, RetryState::Succeeded);
    }

    #[test]
    fn transient_then_success_walks_through_backoff() {
        let p = policy(3, 100);

        let state = p.next(RetryState::start(), AttemptOutcome::Transient);
        assert_eq!(
            state,
            RetryState::BackingOff {
                attempt: 1,
                delay: Duration::from_millis(100)
            }
        );

        let state = state.resume();
        assert_eq!(state, RetryState::Attempting { attempt: 1 });

        let state = p.next(state, AttemptOutcome::Transient);
        assert_eq!(
            state,
            RetryState::BackingOff {
                attempt: 2,
                delay: Duration::from_millis(200)
            }
        );

        let state = p.next(state.resume(), AttemptOutcome::Done);
        assert_eq!(state, RetryState::Succeeded);
    }

    #[test]
    fn exhausts_after_max_retries_extra_attempts() {
        let p = policy(2, 50);
        let mut state = RetryState::start();
        let mut delays = Vec::new();

        loop {
            state = p.next(state, AttemptOutcome::Transient);
            match state {
                RetryState::BackingOff { delay, .. } => {
                    delays.push(delay);
                    state = state.resume();
                }
                RetryState::Exhausted => break,
                other => panic!("unexpected state {other:?}"),
            }
        }

        // 1 initial + 2 retries = 3 attempts, 2 backoffs between them.
        assert_eq!(
            delays,
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );
    }

    #[test]
    fn zero_retries_exhausts_immediately() {
        let p = policy(0, 50);
        let state = p.next(RetryState::start(), AttemptOutcome::Transient);
        assert_eq!(state, RetryState::Exhausted);
    }

    #[test]
    fn terminal_states_stay_put() {
        let p = policy(3, 100);
        assert_eq!(
            p.next(RetryState::Succeeded, AttemptOutcome::Transient),
            RetryState::Succeeded
        );
        assert_eq!(
            p.next(RetryState::Exhausted, AttemptOutcome::Done),
            RetryState::Exhausted
        );
    }
}
