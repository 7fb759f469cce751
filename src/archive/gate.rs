use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum spacing between outbound requests. Clones share one budget.
#[derive(Clone)]
pub struct RequestGate {
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl RequestGate {
    /// A zero interval disables the gate.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { limiter }
    }

    pub fn open() -> Self {
        Self { limiter: None }
    }

    /// Waits until the next request may be sent.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn spaces_consecutive_requests() {
        let gate = RequestGate::new(Duration::from_millis(60));
        let started = Instant::now();
        for _ in 0..3 {
            gate.wait().await;
        }
        // first pass is free, the next two each wait one interval
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn clones_share_the_budget() {
        let gate = RequestGate::new(Duration::from_millis(60));
        let other = gate.clone();
        let started = Instant::now();
        gate.wait().await;
        other.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let gate = RequestGate::new(Duration::ZERO);
        let started = Instant::now();
        for _ in 0..50 {
            gate.wait().await;
        }
        assert!(started.elapsed() < Duration::from_millis(50));
        RequestGate::open().wait().await;
    }
}
