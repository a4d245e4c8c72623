//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so any component of the controller can
//! publish without blocking and without knowing who listens.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Listeners:
//!   EventSource ──┐
//!   Resync      ──┤                  ┌─► subscriber listener ──► SubscriberSet
//!   Worker 0..N ──┼──► Bus ──────────┤     (in Controller)
//!   Gate        ──┤ (broadcast chan) └─► Controller::subscribe() receivers
//!   Pipeline    ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks and never fails; with no receivers the event is dropped.
//! - One ring buffer of `capacity` events is shared by all receivers.
//! - Slow receivers observe `RecvError::Lagged(n)` and skip the `n` oldest events.
//! - Events are observational only; losing them never changes control flow.

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

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
