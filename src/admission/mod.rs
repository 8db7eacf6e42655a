//! # Admission control: priority buffer + adaptive concurrency limit.
//!
//! ```text
//! enqueue(req) ──► [ BinaryHeap (priority asc, FIFO on ties) ]
//!                               │
//!            try_admit() ───────┤  in_flight < limit ?  (CAS reserve)
//!                               ▼
//!                      Admitted { request, permit }
//!                               │
//!        permit.complete(d, ok) ├─► AdaptiveLimiter::report (EMA + AIMD)
//!                               └─► release slot (exactly once)
//! ```
//!
//! ## Invariants
//! - `try_admit` never hands out a request while `in_flight >= limit`.
//! - Every admission is released exactly once (permit is consumed or dropped).
//! - Limiter moves keep the limit inside `[floor, ceiling]`; only
//!   [`AdmissionQueue::set_limit`] may step outside.
//!
//! Shared state is atomics plus one short lock around the heap; nothing is
//! held across an `.await`.

mod limiter;
mod queue;

pub use limiter::{AdaptiveLimiter, Adjustment};
pub use queue::{AdmissionQueue, Admitted, QueueStatus, SlotPermit};
