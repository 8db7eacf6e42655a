//! # Pipeline: glue between the admission queue and the critical section.
//!
//! A [`Pipeline`] owns one [`AdmissionQueue`](crate::AdmissionQueue), an
//! [`EnrollmentProcessor`](crate::EnrollmentProcessor), the event bus and the
//! subscriber fan-out. There is no poller: a single drain loop sleeps on a
//! `Notify` that every submit, completion and limit override pokes.
//!
//! ```text
//! submit(req) ──► queue.enqueue ──► wake.notify_one()
//!                                        │
//!                      drain loop ◄──────┘
//!                        while let Some(a) = queue.try_admit():
//!                            tracker.spawn(unit(a))
//!
//! unit(a):  process(req) ─► report_outcome(d, ok) ─► publish events
//!                        ─► permit.release() ─► wake.notify_one()
//!
//! shutdown(): cancel ─► clear queue ─► wait tracker (grace) ─► flush subscribers
//! ```
//!
//! ## Rules
//! - Units run concurrently up to the current adaptive limit.
//! - A slot is reusable only after its unit reported and released.
//! - Requests still queued at shutdown are dropped.

mod builder;
mod runtime;

pub use builder::PipelineBuilder;
pub use runtime::Pipeline;
