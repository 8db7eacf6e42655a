//! # AIMD concurrency limiter.
//!
//! [`AdaptiveLimiter`] owns the concurrency limit and the signals that move it:
//! an EMA of processing latency and two streak counters.
//!
//! ## Algorithm (per reported outcome)
//! ```text
//! ema = first sample, then ema + 0.2 * (sample - ema)
//!
//! success:
//!   failures = 0; successes += 1
//!   backlog  = queue_depth >= backlog_boost_threshold
//!   required = max(5, successes_for_increase / (backlog ? 2 : 1))
//!   if (fast && successes >= required) || (backlog && successes >= 5):
//!       successes = 0; limit = clamp(limit + 1, floor, ceiling)
//! failure:
//!   failures += 1; successes = 0; shrink
//! any outcome with duration_ms > 2 * target_ms:
//!   successes = 0; shrink
//!
//! shrink: limit = max(floor, floor(limit * ratio)) if that is smaller
//! ```
//!
//! ## Concurrency
//! Every field is an atomic updated with read-modify-write loops
//! (`fetch_update` / `compare_exchange`). A streak that reaches the increase
//! threshold is claimed with a CAS back to zero, so two racing completions
//! cannot both grow the limit from the same streak.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::AdaptiveConfig;

/// EMA weight of the newest sample.
pub const EMA_ALPHA: f64 = 0.2;

/// Lower bound on the success streak required for an increase.
pub const MIN_SUCCESSES_FOR_INCREASE: u32 = 5;

/// Bit pattern marking an EMA that has not seen a sample yet (a NaN no arithmetic produces).
const EMA_UNSEEDED: u64 = u64::MAX;

/// Limit movement caused by one reported outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Adjustment {
    pub before: usize,
    pub after: usize,
}

impl Adjustment {
    pub fn is_increase(&self) -> bool {
        self.after > self.before
    }

    pub fn is_decrease(&self) -> bool {
        self.after < self.before
    }

    pub fn is_unchanged(&self) -> bool {
        self.after == self.before
    }
}

/// Self-tuning concurrency limit.
pub struct AdaptiveLimiter {
    floor: usize,
    ceiling: usize,
    target_latency_ms: u64,
    decrease_ratio: f64,
    successes_for_increase: u32,
    backlog_boost_threshold: usize,

    limit: AtomicUsize,
    ema_bits: AtomicU64,
    successes_since_increase: AtomicU32,
    consecutive_failures: AtomicU32,
    processed: AtomicU64,
}

impl AdaptiveLimiter {
    /// Creates a limiter starting at the configured floor (at least 1).
    ///
    /// A floor above the ceiling is pulled down to the ceiling.
    pub fn new(cfg: &AdaptiveConfig) -> Self {
        let ceiling = cfg.max_concurrent.max(1);
        let floor = cfg.initial_limit().min(ceiling);
        Self {
            floor,
            ceiling,
            target_latency_ms: cfg.target_latency_ms,
            decrease_ratio: cfg.effective_decrease_ratio(),
            successes_for_increase: cfg.successes_for_increase,
            backlog_boost_threshold: cfg.backlog_boost_threshold,
            limit: AtomicUsize::new(floor),
            ema_bits: AtomicU64::new(EMA_UNSEEDED),
            successes_since_increase: AtomicU32::new(0),
            consecutive_failures: AtomicU32::new(0),
            processed: AtomicU64::new(0),
        }
    }

    /// Current concurrency limit.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Acquire)
    }

    /// Lowest limit the controller will shrink to.
    pub fn floor(&self) -> usize {
        self.floor
    }

    /// Highest limit the controller will grow to.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Operator override. Not clamped; returns the previous limit.
    pub fn set_limit(&self, limit: usize) -> usize {
        self.limit.swap(limit, Ordering::AcqRel)
    }

    /// EMA of observed latency in milliseconds (`0.0` before the first sample).
    pub fn ema_latency_ms(&self) -> f64 {
        match self.ema_bits.load(Ordering::Acquire) {
            EMA_UNSEEDED => 0.0,
            bits => f64::from_bits(bits),
        }
    }

    /// Outcomes reported so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Successes accumulated toward the next increase.
    pub fn successes_since_increase(&self) -> u32 {
        self.successes_since_increase.load(Ordering::Relaxed)
    }

    /// Feeds one completed request into the controller.
    ///
    /// `queue_depth` is the number of requests still waiting, used for the backlog boost.
    pub fn report(&self, duration: Duration, success: bool, queue_depth: usize) -> Adjustment {
        let before = self.limit();
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.observe_latency(duration);
        // thresholds compare whole milliseconds, truncated
        let elapsed_ms = duration.as_millis();
        let target_ms = u128::from(self.target_latency_ms);

        if success {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            let fast = elapsed_ms <= target_ms;
            let streak = self.successes_since_increase.fetch_add(1, Ordering::AcqRel) + 1;
            let backlog = queue_depth >= self.backlog_boost_threshold;
            let divisor = if backlog { 2 } else { 1 };
            let required = (self.successes_for_increase / divisor).max(MIN_SUCCESSES_FOR_INCREASE);

            if ((fast && streak >= required) || (backlog && streak >= MIN_SUCCESSES_FOR_INCREASE))
                && self
                    .successes_since_increase
                    .compare_exchange(streak, 0, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                self.increase();
            }
        } else {
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
            self.successes_since_increase.store(0, Ordering::Release);
            self.shrink();
        }

        if elapsed_ms > target_ms * 2 {
            self.successes_since_increase.store(0, Ordering::Release);
            self.shrink();
        }

        Adjustment {
            before,
            after: self.limit(),
        }
    }

    fn observe_latency(&self, duration: Duration) {
        let sample = duration.as_secs_f64() * 1000.0;
        let _ = self
            .ema_bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let next = match bits {
                    EMA_UNSEEDED => sample,
                    bits => {
                        let prev = f64::from_bits(bits);
                        prev + EMA_ALPHA * (sample - prev)
                    }
                };
                Some(next.to_bits())
            });
    }

    /// `+1`, clamped to `[floor, ceiling]`.
    fn increase(&self) {
        let (floor, ceiling) = (self.floor, self.ceiling);
        let _ = self
            .limit
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                let next = cur.saturating_add(1).clamp(floor, ceiling);
                (next != cur).then_some(next)
            });
    }

    /// Multiplicative decrease, never below the floor, applied only if it shrinks.
    fn shrink(&self) {
        let (floor, ratio) = (self.floor, self.decrease_ratio);
        let _ = self
            .limit
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                let next = ((cur as f64 * ratio).floor() as usize).max(floor);
                (next < cur).then_some(next)
            });
    }
}
