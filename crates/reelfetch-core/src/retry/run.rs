use crate::retry::classify::classify;
use crate::retry::policy::{RetryDecision, RetryPolicy};
use crate::transport::TransportError;

/// Runs `f` until it succeeds or the policy says to stop, sleeping the retry
/// interval between attempts. Returns the last error on give-up.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, mut f: F) -> Result<T, TransportError>
where
    F: FnMut() -> Result<T, TransportError>,
{
    let mut failures = 0u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => {
                failures += 1;
                match policy.decide(failures) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(attempt = failures, kind = ?classify(&e), error = %e, "retrying");
                        std::thread::sleep(d);
                    }
                }
            }
        }
    }
}
