//! # Outcome tally with sequence tracking.
//!
//! Counts terminal outcomes, limit moves and edge results as they arrive.
//!
//! ## Rules
//! - Every event bumps at most one counter.
//! - `last_seq` is the highest sequence number observed; events arrive per
//!   subscriber in FIFO order, so a snapshot reflects a prefix of the bus.
//! - Rejections are split by reason (`course is full` vs `already enrolled`).

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::enrollment::{REASON_ALREADY_ENROLLED, REASON_COURSE_FULL};
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Point-in-time copy of an [`OutcomeTally`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TallySnapshot {
    pub succeeded: u64,
    pub rejected_full: u64,
    pub rejected_duplicate: u64,
    pub failed: u64,
    pub limit_increases: u64,
    pub limit_decreases: u64,
    pub forwarded: u64,
    pub forward_failures: u64,
    pub last_seq: u64,
}

impl TallySnapshot {
    /// Total terminal outcomes.
    pub fn outcomes(&self) -> u64 {
        self.succeeded + self.rejected_full + self.rejected_duplicate + self.failed
    }
}

/// Stateful subscriber counting what happened.
#[derive(Default)]
pub struct OutcomeTally {
    state: Mutex<TallySnapshot>,
}

impl OutcomeTally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current counters.
    pub fn snapshot(&self) -> TallySnapshot {
        *self.state.lock()
    }

    /// Applies one event; returns whether a counter moved.
    pub fn record(&self, ev: &Event) -> bool {
        let mut s = self.state.lock();
        s.last_seq = s.last_seq.max(ev.seq);
        let counter = match ev.kind {
            EventKind::EnrollmentSucceeded => &mut s.succeeded,
            EventKind::EnrollmentRejected => match ev.reason.as_deref() {
                Some(REASON_COURSE_FULL) => &mut s.rejected_full,
                Some(REASON_ALREADY_ENROLLED) => &mut s.rejected_duplicate,
                _ => &mut s.failed,
            },
            EventKind::EnrollmentFailed => &mut s.failed,
            EventKind::LimitIncreased => &mut s.limit_increases,
            EventKind::LimitDecreased => &mut s.limit_decreases,
            EventKind::RequestForwarded => &mut s.forwarded,
            EventKind::ForwardFailed => &mut s.forward_failures,
            _ => return false,
        };
        *counter += 1;
        true
    }
}

#[async_trait]
impl Subscribe for OutcomeTally {
    async fn on_event(&self, ev: &Event) {
        self.record(ev);
    }

    fn name(&self) -> &'static str {
        "OutcomeTally"
    }

    fn queue_capacity(&self) -> usize {
        8192
    }
}
