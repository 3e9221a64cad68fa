//! Bounded retry for blocking calls.

use anyhow::{Result, anyhow};
use tracing::warn;

/// Number of attempts made for each remote chat request.
pub const DEFAULT_ATTEMPTS: usize = 5;

/// Call `op` until it succeeds or `attempts` calls have failed.
///
/// `op` receives the 1-based attempt number. There is no backoff between attempts. When every
/// attempt fails the last error is returned with the attempt count attached as context.
pub fn retry<T>(attempts: usize, mut op: impl FnMut(usize) -> Result<T>) -> Result<T> {
    let attempts = attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, attempts, error = %format!("{err:#}"), "attempt failed");
                last_err = Some(err);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| anyhow!("no attempts were made"));
    Err(err.context(format!("giving up after {attempts} attempts")))
}
