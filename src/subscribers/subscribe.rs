//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom event handlers into a
//! pipeline or dispatcher. Each subscriber is driven by a dedicated worker fed by
//! a bounded queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they never block the request path nor other subscribers.
//! - If a subscriber's queue overflows, events for that subscriber are **dropped**.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use seatvisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct FullCourses(AtomicUsize);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for FullCourses {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::EnrollmentRejected
//!             && ev.reason.as_deref() == Some("course is full")
//!         {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "full-courses" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
