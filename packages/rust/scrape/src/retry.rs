//! Exponential backoff with jitter for transient failures.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use keywordscout_shared::RetryPolicy;

/// Errors that know whether repeating the operation could succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Apply `±jitter` relative noise to a delay.
pub fn jittered(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 || delay.is_zero() {
        return delay;
    }
    let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
    delay.mul_f64(factor.max(0.0))
}

/// Run `op` until it succeeds, fails non-transiently, or the attempt budget
/// is spent. `op` receives the 0-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, target: &str, mut op: F) -> Result<T, E>
where
    E: Transient + Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = jittered(policy.delay_for(attempt), policy.jitter);
                warn!(
                    target_resource = target,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
