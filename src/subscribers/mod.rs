//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the non-blocking fan-out
//! [`SubscriberSet`], and built-in subscribers.
//!
//! ## Architecture
//! ```text
//! Pipeline / Dispatcher ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                                   │
//!                                                      ┌────────────┼────────────┐
//!                                                      ▼            ▼            ▼
//!                                                  LogWriter   OutcomeTally    custom
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers**: observe and react to events (logging, alerts)
//! - **Stateful subscribers**: maintain counters from events ([`OutcomeTally`])

mod embedded;
mod set;
mod subscribe;

pub use embedded::{LogWriter, OutcomeTally, TallySnapshot};
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
