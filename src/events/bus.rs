//! # Event bus for pipeline and dispatcher events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so that many publishers (drain loop,
//! request units, dispatcher) can report without blocking the hot path.
//!
//! ```text
//! Publishers:                        Listener:
//!   drain loop ──┐
//!   unit #1    ──┼──► Bus ──► fan-out listener ──► SubscriberSet
//!   unit #N    ──┤
//!   dispatcher ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; without receivers the event is dropped.
//! - One ring buffer of `capacity` events is shared by all receivers.
//! - A receiver that falls behind gets `RecvError::Lagged(n)` and skips `n` events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to every current receiver.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates an independent receiver for events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
