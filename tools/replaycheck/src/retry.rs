//! The two waiting shapes the harness uses: bounded attempts with a fixed
//! inter-attempt delay (connect-wait, locate-retry) and an unbounded
//! spin-with-yield (offer-retry). Both go through the Clock seam so tests
//! never sleep for real.

use crate::errors::ReplayCheckError;
use crate::runtime::Clock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

/// Run `attempt` up to `policy.max_attempts` times, sleeping
/// `policy.interval` between tries. The first `Some` wins; `None` after the
/// last attempt means the caller's condition never held. Attempt numbers
/// passed to the closure are 1-based.
pub fn retry<T>(
    clock: &dyn Clock,
    policy: RetryPolicy,
    mut attempt: impl FnMut(u32) -> Result<Option<T>, ReplayCheckError>,
) -> Result<Option<T>, ReplayCheckError> {
    for n in 1..=policy.max_attempts {
        if let Some(value) = attempt(n)? {
            return Ok(Some(value));
        }
        if n < policy.max_attempts {
            clock.sleep(policy.interval)?;
        }
    }
    Ok(None)
}

/// Spin until `attempt` produces a value, yielding the scheduling slot
/// between tries. No upper bound: an unresponsive counterpart blocks the
/// caller indefinitely, which is the intended trade at this layer.
pub fn spin<T>(
    clock: &dyn Clock,
    mut attempt: impl FnMut() -> Result<Option<T>, ReplayCheckError>,
) -> Result<T, ReplayCheckError> {
    loop {
        if let Some(value) = attempt()? {
            return Ok(value);
        }
        clock.yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::FakeClock;

    #[test]
    fn retry_stops_at_first_success() {
        let clock = FakeClock::default();
        let policy = RetryPolicy::new(10, Duration::from_millis(500));
        let result = retry(&clock, policy, |n| {
            Ok(if n == 3 { Some(n) } else { None })
        })
        .expect("retry");
        assert_eq!(result, Some(3));
        // Two failed attempts, one sleep after each.
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn retry_exhausts_after_max_attempts_without_trailing_sleep() {
        let clock = FakeClock::default();
        let policy = RetryPolicy::new(10, Duration::from_millis(500));
        let mut attempts = 0;
        let result: Option<()> = retry(&clock, policy, |_| {
            attempts += 1;
            Ok(None)
        })
        .expect("retry");
        assert_eq!(result, None);
        assert_eq!(attempts, 10);
        assert_eq!(clock.sleeps().len(), 9);
    }

    #[test]
    fn retry_propagates_attempt_errors() {
        let clock = FakeClock::default();
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: Result<Option<()>, _> = retry(&clock, policy, |_| {
            Err(ReplayCheckError::Archive("control channel down".to_string()))
        });
        assert!(matches!(result, Err(ReplayCheckError::Archive(_))));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn spin_yields_between_attempts() {
        let clock = FakeClock::default();
        let mut tries = 0;
        let value = spin(&clock, || {
            tries += 1;
            Ok(if tries == 4 { Some(tries) } else { None })
        })
        .expect("spin");
        assert_eq!(value, 4);
        assert_eq!(clock.yield_count(), 3);
        assert!(clock.sleeps().is_empty());
    }
}
