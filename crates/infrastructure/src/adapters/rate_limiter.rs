//! Sliding-window rate limiter
//!
//! Admits at most `max_requests` calls in any window of `window` length.
//! Used by the media pipeline to bound the upload rate towards the remote
//! systems; callers either probe with [`SlidingWindowRateLimiter::allow`] or
//! park in [`SlidingWindowRateLimiter::wait`] until a slot frees up.

use std::{collections::VecDeque, time::Duration};

use application::ApplicationError;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Rate limiter configuration
#[derive(Clone, Debug)]
pub struct RateLimiterConfig {
    /// Maximum admitted calls per window
    pub max_requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(1),
        }
    }
}

/// Sliding-window limiter over admission timestamps
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    config: RateLimiterConfig,
    admitted: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowRateLimiter {
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            admitted: Mutex::new(VecDeque::with_capacity(config.max_requests as usize)),
            config,
        }
    }

    /// Admit a call if the window has room
    pub fn allow(&self) -> bool {
        self.try_acquire().is_ok()
    }

    /// Wait for a slot, giving up when `cancel` fires
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::Cancelled`] if the token is cancelled first.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), ApplicationError> {
        loop {
            let delay = match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(delay) => delay,
            };

            trace!(delay_ms = delay.as_millis(), "Rate limit reached, waiting for a slot");
            tokio::select! {
                () = cancel.cancelled() => return Err(ApplicationError::Cancelled),
                () = tokio::time::sleep(delay) => {},
            }
        }
    }

    /// Calls currently counted in the window
    pub fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock();
        self.prune(&mut admitted, Instant::now());
        admitted.len()
    }

    /// Record an admission, or return how long until the oldest stamp expires
    fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut admitted = self.admitted.lock();
        self.prune(&mut admitted, now);

        if admitted.len() < self.config.max_requests as usize {
            admitted.push_back(now);
            return Ok(());
        }

        let wait = admitted
            .front()
            .map_or(self.config.window, |oldest| {
                (*oldest + self.config.window).saturating_duration_since(now)
            });
        Err(wait.max(Duration::from_millis(1)))
    }

    fn prune(&self, admitted: &mut VecDeque<Instant>, now: Instant) {
        while admitted
            .front()
            .is_some_and(|stamp| now.saturating_duration_since(*stamp) >= self.config.window)
        {
            admitted.pop_front();
        }
    }
}
