//! Bounded connection retry.

use std::time::Duration;

use dp_core::{Error, Result};

/// Fixed-interval retry policy for connection establishment.
///
/// Only connection bootstrap is ever retried; business-logic failures are
/// never requeued (see the stage loop's skip-and-ack policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of connection attempts.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    /// 12 attempts, 5 s apart: up to one minute waiting for the broker.
    fn default() -> Self {
        Self { max_attempts: 12, interval: Duration::from_secs(5) }
    }
}

/// Run `connect` until it succeeds or the policy is exhausted.
///
/// Exhaustion yields [`Error::Connection`]; the caller is expected to exit
/// with a non-zero status.
pub fn connect_with_retry<T, F>(mut connect: F, policy: &RetryPolicy) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut last_error = String::from("no attempts made");
    for attempt in 1..=policy.max_attempts {
        match connect() {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                log::warn!(
                    "connection attempt {attempt}/{} failed: {e}",
                    policy.max_attempts
                );
                last_error = e.to_string();
                if attempt < policy.max_attempts {
                    std::thread::sleep(policy.interval);
                }
            }
        }
    }
    Err(Error::Connection(format!(
        "gave up after {} attempts: {last_error}",
        policy.max_attempts
    )))
}
