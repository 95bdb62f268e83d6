//! Retry backoff throttle and deadline computation
//!
//! The transaction retry loop sleeps between attempts using a bounded
//! exponential backoff: the delay doubles per throttled attempt, clamped at
//! a per-attempt cap. If enough quiet time passes between throttles the
//! delay resets to its initial value, so a long-lived coordinator does not
//! stay maximally backed off forever.
//!
//! Deadlines follow the repository's historical timeout mapping:
//! - timeout < 0  -> the deadline has already passed (no retries)
//! - timeout == 0 -> unbounded (retry indefinitely)
//! - timeout > 0  -> now + timeout
//!
//! The zero/negative mapping is intentional and must not be "fixed".

use std::time::{Duration, Instant};

/// Default initial backoff delay in milliseconds
pub const DEFAULT_INIT_DELAY_MS: u64 = 500;
/// Default per-attempt delay cap in milliseconds
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
/// Default quiet period after which the delay resets, in milliseconds
pub const DEFAULT_RESET_AFTER_MS: u64 = 10_000;

/// Bounded exponential backoff between retry attempts.
///
/// `throttle()` blocks the calling thread; the coordinator runs a single
/// logical thread of control, so there is nothing to yield to.
#[derive(Debug)]
pub struct BackoffThrottle {
    init_delay: Duration,
    max_delay: Duration,
    reset_after: Duration,
    delay: Duration,
    last_throttle: Option<Instant>,
}

impl BackoffThrottle {
    /// Create a throttle with explicit tuning, all in milliseconds.
    pub fn new(init_delay_ms: u64, max_delay_ms: u64, reset_after_ms: u64) -> Self {
        let init_delay = Duration::from_millis(init_delay_ms);
        Self {
            init_delay,
            max_delay: Duration::from_millis(max_delay_ms),
            reset_after: Duration::from_millis(reset_after_ms),
            delay: init_delay,
            last_throttle: None,
        }
    }

    /// Sleep for the current delay, then grow the delay for the next call.
    pub fn throttle(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_throttle {
            if now.duration_since(last) > self.reset_after {
                self.delay = self.init_delay;
            }
        }

        std::thread::sleep(self.delay);

        self.last_throttle = Some(Instant::now());
        self.delay = std::cmp::min(self.delay * 2, self.max_delay);
    }

    /// The delay the next `throttle()` call would sleep for, absent a reset.
    pub fn next_delay(&self) -> Duration {
        self.delay
    }

    /// Reset the delay to its initial value.
    pub fn reset(&mut self) {
        self.delay = self.init_delay;
        self.last_throttle = None;
    }
}

impl Default for BackoffThrottle {
    fn default() -> Self {
        Self::new(
            DEFAULT_INIT_DELAY_MS,
            DEFAULT_MAX_DELAY_MS,
            DEFAULT_RESET_AFTER_MS,
        )
    }
}

/// Retry deadline derived from a configured timeout in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Retry indefinitely (timeout == 0)
    Unbounded,
    /// Retry until the given instant (timeout > 0, or already passed for
    /// negative timeouts)
    At(Instant),
}

impl Deadline {
    /// Derive a deadline from a timeout in seconds.
    ///
    /// Negative timeouts yield a deadline that has already passed, which
    /// gives "no retries beyond the first attempt" without a special case
    /// in the retry loop.
    pub fn from_timeout_s(timeout_s: i64) -> Self {
        if timeout_s == 0 {
            return Deadline::Unbounded;
        }
        let now = Instant::now();
        if timeout_s < 0 {
            return Deadline::At(now);
        }
        Deadline::At(now + Duration::from_secs(timeout_s as u64))
    }

    /// Whether the deadline has passed.
    pub fn is_elapsed(&self) -> bool {
        match self {
            Deadline::Unbounded => false,
            Deadline::At(at) => Instant::now() >= *at,
        }
    }
}
