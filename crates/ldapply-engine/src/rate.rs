//! Operation rate limiting.
//!
//! A fixed-rate budget with a one-second window. The engine waits on the
//! budget before each dispatch; for bulk modification the wait happens in
//! the per-entry handler rather than the outer record loop.

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use ldapply_client::ClientError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A budget of at most N operations per second.
pub struct RateBudget {
    limiter: DirectLimiter,
}

impl RateBudget {
    /// Creates a budget allowing `per_second` operations each second.
    pub fn per_second(per_second: u32) -> Result<Self, ClientError> {
        let quota = NonZeroU32::new(per_second)
            .ok_or_else(|| ClientError::Param("rate per second must be positive".into()))?;
        Ok(RateBudget {
            limiter: RateLimiter::direct(Quota::per_second(quota)),
        })
    }

    /// Waits until the budget admits one more operation.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_zero_rate_rejected() {
        assert!(RateBudget::per_second(0).is_err());
    }

    #[tokio::test]
    async fn test_budget_delays_excess_operations() {
        let budget = RateBudget::per_second(10).unwrap();
        let start = Instant::now();
        // The burst allowance covers the first operations; the next waits
        // for the window to refill.
        for _ in 0..12 {
            budget.acquire().await;
        }
        assert!(start.elapsed().as_millis() >= 100);
    }
}
