//! # seatvisor
//!
//! **Seatvisor** admits, processes, and distributes course enrollment
//! requests without ever overselling a course.
//!
//! Each backend instance runs a [`Pipeline`]: requests wait in a priority
//! [`AdmissionQueue`] whose concurrency window is tuned by an AIMD
//! [`AdaptiveLimiter`], and every admitted request goes through the
//! [`EnrollmentProcessor`] critical section on an [`EnrollmentStore`].
//! A [`Dispatcher`] spreads traffic over many instances round-robin.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                 ┌──────────────────────────────┐
//!   client ─────► │ Dispatcher (round-robin)     │ ──► 503 on backend failure
//!                 └──────┬──────────┬────────────┘
//!                        ▼          ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  Pipeline (one per instance)                                     │
//! │  - AdmissionQueue (priority heap + AdaptiveLimiter)              │
//! │  - drain loop (admits while in_flight < limit)                   │
//! │  - TaskTracker (one unit per admitted request)                   │
//! └──────┬──────────────────┬──────────────────┬─────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌───────────┐      ┌───────────┐      ┌───────────┐
//!   │ process() │      │ process() │      │ process() │
//!   └─────┬─────┘      └─────┬─────┘      └─────┬─────┘
//!         │ course scope     │                  │
//!         ▼                  ▼                  ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  EnrollmentStore (KeyedLocks: one writer per course)             │
//! └──────────────────────────────────────────────────────────────────┘
//!
//!   Pipeline / Dispatcher ──publish──► Bus ──► SubscriberSet
//!                                              ├─► LogWriter
//!                                              └─► OutcomeTally
//! ```
//!
//! ### Lifecycle of one request
//! ```text
//! submit(req) ──► queue.enqueue ──► wake drain loop
//!
//! drain loop {
//!   ├─► try_admit: in_flight < limit ? pop highest priority (FIFO on ties)
//!   ├─► spawn unit on tracker
//!   │       ├─ processor.process(req)
//!   │       │     ├─ duplicate?      ─► AlreadyEnrolled
//!   │       │     ├─ course full?    ─► CourseFull
//!   │       │     ├─ store error     ─► Failed (rolled back)
//!   │       │     └─ ok              ─► Enrolled{id}
//!   │       ├─ limiter.report(duration, success, depth)
//!   │       ├─ publish outcome (+ LimitIncreased / LimitDecreased)
//!   │       └─ release slot, wake drain loop
//!   └─ exit on shutdown token
//! }
//! ```
//!
//! ## Features
//! | Area            | Description                                               | Key types                                   |
//! |-----------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Admission**   | Priority queue with an adaptive concurrency window.       | [`AdmissionQueue`], [`AdaptiveLimiter`]     |
//! | **Enrollment**  | Capacity-safe, duplicate-free enrollment transaction.     | [`EnrollmentProcessor`], [`EnrollmentStore`]|
//! | **Pipeline**    | Drain loop, worker tracking, graceful shutdown.           | [`Pipeline`], [`PipelineBuilder`]           |
//! | **Dispatch**    | Round-robin forwarding with a synthetic 503 fallback.     | [`Dispatcher`], [`ProxyResponse`]           |
//! | **Events**      | Broadcast bus and subscriber fan-out.                     | [`Bus`], [`Event`], [`Subscribe`]           |
//! | **Errors**      | Typed errors with stable labels.                          | [`RuntimeError`], [`StoreError`]            |
//! | **Config**      | TOML-backed settings with defaults.                       | [`Config`]                                  |
//!
//! ## Optional features
//! - `server` (default): axum routers, the fleet runner and the `seatvisor` binary.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use seatvisor::{Config, EnrollmentRequest, EnrollmentStore, MemoryStore, Pipeline};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!     let course = store.insert_course("Rust Programming", 2).await?;
//!
//!     let pipeline = Pipeline::builder(Config::default())
//!         .with_store(Arc::new(store.clone()))
//!         .build();
//!
//!     for user in 1..=5 {
//!         pipeline.submit(EnrollmentRequest::new(user, course.id(), 0))?;
//!     }
//!     pipeline.wait_idle().await;
//!
//!     let course = store.course(course.id()).await?.expect("course exists");
//!     assert_eq!(course.current_enrollment(), 2);
//!
//!     pipeline.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod admission;
mod config;
mod dispatch;
mod enrollment;
mod error;
mod events;
mod model;
mod pipeline;
mod signals;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use admission::{AdaptiveLimiter, AdmissionQueue, Admitted, Adjustment, QueueStatus, SlotPermit};
pub use config::{AdaptiveConfig, Config, DispatcherConfig};
pub use dispatch::{Dispatcher, HOP_BY_HOP_HEADERS, ProxyResponse, is_hop_by_hop, sanitize_headers};
pub use enrollment::{
    EnrollmentOutcome, EnrollmentProcessor, REASON_ALREADY_ENROLLED, REASON_COURSE_FULL,
    REASON_ENROLLED,
};
pub use error::{ConfigError, DispatchError, RuntimeError, StoreError};
pub use events::{Bus, Event, EventKind};
pub use model::{
    Course, CourseId, Enrollment, EnrollmentId, EnrollmentRequest, EnrollmentStatus,
    NewEnrollment, Priority, UserId,
};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use signals::wait_for_shutdown_signal;
pub use store::{EnrollmentStore, KeyedLocks, MemoryStore, UnitOfWork};
pub use subscribers::{LogWriter, OutcomeTally, Subscribe, SubscriberSet, TallySnapshot};

// HTTP surface: instance and edge routers plus the in-process fleet.
// Enable with: `--features server` (on by default)
#[cfg(feature = "server")]
pub mod server;
