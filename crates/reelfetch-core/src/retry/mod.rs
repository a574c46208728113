//! Retry policy for transport failures.
//!
//! Every transport failure is retried with a flat interval until the retry
//! budget runs out. [`classify`] maps failures to an [`ErrorKind`] so logs and
//! events can say what went wrong.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
