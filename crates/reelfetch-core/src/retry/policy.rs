use serde::Serialize;
use std::time::Duration;

/// What kind of failure a transport error was. Informational: the policy
/// retries every kind the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    Http5xx(u16),
    /// Any other non-success status (4xx, unexpected 3xx).
    HttpOther(u16),
    /// Body shorter or longer than the requested range.
    Partial,
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Flat retry policy: up to `max_retries` attempts in total, `interval` apart.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            interval: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// `failures` counts failed attempts so far, including the one just seen.
    pub fn decide(&self, failures: u32) -> RetryDecision {
        if failures >= self.max_retries {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_until_budget_spent() {
        let p = RetryPolicy {
            max_retries: 3,
            interval: Duration::from_millis(10),
        };
        assert_eq!(p.decide(1), RetryDecision::RetryAfter(Duration::from_millis(10)));
        assert_eq!(p.decide(2), RetryDecision::RetryAfter(Duration::from_millis(10)));
        assert_eq!(p.decide(3), RetryDecision::NoRetry);
        assert_eq!(p.decide(9), RetryDecision::NoRetry);
    }

    #[test]
    fn interval_is_flat() {
        let p = RetryPolicy {
            max_retries: 10,
            ..RetryPolicy::default()
        };
        assert_eq!(p.decide(1), p.decide(8));
    }

    #[test]
    fn zero_or_one_budget_never_retries() {
        for max in [0, 1] {
            let p = RetryPolicy {
                max_retries: max,
                ..RetryPolicy::default()
            };
            assert_eq!(p.decide(1), RetryDecision::NoRetry);
        }
    }
}
