use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::AdaptiveConfig;
use crate::model::{EnrollmentRequest, Priority};

use super::{AdaptiveLimiter, Adjustment};

/// Heap entry: ordered by priority, then arrival.
struct Pending {
    priority: Priority,
    seq: u64,
    request: EnrollmentRequest,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    // BinaryHeap is a max-heap: invert so the lowest (priority, seq) pops first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Snapshot of queue and limiter state, serialized as the status document.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_size: usize,
    pub current_processing: usize,
    pub max_concurrent_requests: usize,
    pub ema_latency_ms: f64,
    pub processed_count: u64,
    pub consecutive_failures: u32,
}

/// Priority buffer gated by an [`AdaptiveLimiter`].
///
/// Shared as `Arc<AdmissionQueue>`; admitted requests carry a [`SlotPermit`]
/// pointing back at the queue.
pub struct AdmissionQueue {
    heap: Mutex<BinaryHeap<Pending>>,
    depth: AtomicUsize,
    next_seq: AtomicU64,
    in_flight: AtomicUsize,
    limiter: AdaptiveLimiter,
}

impl AdmissionQueue {
    /// Creates an empty queue whose limit starts at the configured floor.
    pub fn new(cfg: &AdaptiveConfig) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            depth: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            limiter: AdaptiveLimiter::new(cfg),
        }
    }

    /// Appends a request; returns the depth after insertion.
    pub fn enqueue(&self, request: EnrollmentRequest) -> usize {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut heap = self.heap.lock();
        heap.push(Pending {
            priority: request.priority(),
            seq,
            request,
        });
        let depth = heap.len();
        self.depth.store(depth, Ordering::Release);
        depth
    }

    /// Takes the most urgent request if a slot is free.
    ///
    /// Returns `None` without side effects when the buffer is empty or
    /// `in_flight >= limit`.
    pub fn try_admit(self: &Arc<Self>) -> Option<Admitted> {
        if self.depth() == 0 {
            return None;
        }
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limiter.limit()).then_some(n + 1)
            })
            .ok()?;

        let popped = {
            let mut heap = self.heap.lock();
            let popped = heap.pop();
            self.depth.store(heap.len(), Ordering::Release);
            popped
        };

        match popped {
            Some(p) => Some(Admitted {
                request: p.request,
                permit: SlotPermit {
                    queue: Arc::clone(self),
                    released: false,
                },
            }),
            None => {
                // lost a race for the last entry
                self.release_slot();
                None
            }
        }
    }

    /// Feeds an outcome into the limiter using the current backlog.
    pub fn report_outcome(&self, duration: Duration, success: bool) -> Adjustment {
        self.limiter.report(duration, success, self.depth())
    }

    /// Operator override of the limit (unclamped). Returns the previous value.
    pub fn set_limit(&self, limit: usize) -> usize {
        self.limiter.set_limit(limit)
    }

    /// Discards every waiting request; returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut heap = self.heap.lock();
        let dropped = heap.len();
        heap.clear();
        self.depth.store(0, Ordering::Release);
        dropped
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limiter.limit()
    }

    pub fn limiter(&self) -> &AdaptiveLimiter {
        &self.limiter
    }

    /// True when nothing is waiting and nothing is running.
    pub fn is_idle(&self) -> bool {
        self.depth() == 0 && self.in_flight() == 0
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_size: self.depth(),
            current_processing: self.in_flight(),
            max_concurrent_requests: self.limiter.limit(),
            ema_latency_ms: self.limiter.ema_latency_ms(),
            processed_count: self.limiter.processed(),
            consecutive_failures: self.limiter.consecutive_failures(),
        }
    }

    fn release_slot(&self) {
        let prev = self.in_flight.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "slot released more times than admitted");
    }
}

/// A request that won a slot.
pub struct Admitted {
    pub request: EnrollmentRequest,
    pub permit: SlotPermit,
}

impl Admitted {
    pub fn into_parts(self) -> (EnrollmentRequest, SlotPermit) {
        (self.request, self.permit)
    }
}

/// Ownership of one concurrency slot.
///
/// The slot is returned exactly once: by [`complete`](Self::complete),
/// [`release`](Self::release), or on drop.
#[must_use = "dropping a permit releases its slot without reporting an outcome"]
pub struct SlotPermit {
    queue: Arc<AdmissionQueue>,
    released: bool,
}

impl SlotPermit {
    /// Reports the outcome to the limiter, then frees the slot.
    pub fn complete(mut self, duration: Duration, success: bool) -> Adjustment {
        let adj = self.queue.report_outcome(duration, success);
        self.release_inner();
        adj
    }

    /// Frees the slot without feeding the limiter.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.queue.release_slot();
        }
    }
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.release_inner();
    }
}
