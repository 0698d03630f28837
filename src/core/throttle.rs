//! Fixed-interval gate pacing upstream fetches.
//!
//! Uses the `governor` crate with a quota of one permit per interval and no
//! burst, so the first caller passes immediately and each subsequent caller
//! waits until one interval has elapsed since the previous permit.

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use std::time::Duration;
use tracing::debug;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

pub struct Throttle {
    limiter: Option<Limiter>,
    interval: Duration,
}

impl Throttle {
    /// A zero interval disables pacing.
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval).map(RateLimiter::direct);
        Throttle { limiter, interval }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Waits for the next permit.
    pub async fn until_ready(&self) {
        if let Some(limiter) = &self.limiter {
            debug!("Waiting for fetch permit ({:?} interval)", self.interval);
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("interval", &self.interval)
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}
