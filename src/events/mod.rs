//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the controller, the leadership
//! gate, the event source, the resync loop and the workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Controller`, `leader::gate`, `core::pipeline`, `source::EventSource`,
//!   `core::resync`, `core::worker`, `core::runner`.
//! - **Consumers**: the controller's subscriber listener (fans out to `SubscriberSet`)
//!   and anyone holding a receiver from [`Controller::subscribe`](crate::Controller::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
