//! # Controller lifecycle state.
//!
//! ```text
//! Created ──run()──► Running ──stop / fatal error──► Stopping ──drained──► Stopped
//! ```
//!
//! Transitions only move forward. The current value lives in a
//! `tokio::sync::watch` channel so callers can both read it and await changes.

use tokio::sync::watch;

/// Lifecycle state of a [`Controller`](crate::Controller).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ControllerRunState {
    /// Built, `run` not called yet.
    Created,
    /// `run` is active (leading or waiting for leadership).
    Running,
    /// Stop requested or a fatal error occurred; draining workers.
    Stopping,
    /// Fully stopped; no handler will be invoked again.
    Stopped,
}

impl ControllerRunState {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ControllerRunState::Created => "created",
            ControllerRunState::Running => "running",
            ControllerRunState::Stopping => "stopping",
            ControllerRunState::Stopped => "stopped",
        }
    }
}

/// Forward-only state holder.
#[derive(Clone)]
pub(crate) struct StateCell {
    tx: watch::Sender<ControllerRunState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(ControllerRunState::Created);
        Self { tx }
    }

    pub(crate) fn get(&self) -> ControllerRunState {
        *self.tx.borrow()
    }

    /// Moves to `next` if it is later than the current state; returns whether it moved.
    pub(crate) fn advance(&self, next: ControllerRunState) -> bool {
        self.tx.send_if_modified(|cur| {
            if next > *cur {
                *cur = next;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ControllerRunState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_never_moves_backwards() {
        let cell = StateCell::new();
        assert!(cell.advance(ControllerRunState::Running));
        assert!(cell.advance(ControllerRunState::Stopped));
        assert!(!cell.advance(ControllerRunState::Stopping));
        assert_eq!(cell.get(), ControllerRunState::Stopped);
    }
}
