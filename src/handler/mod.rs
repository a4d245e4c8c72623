//! # Handler abstractions.
//!
//! - [`Handler`] trait for reconciliation logic (async, cancelable)
//! - [`HandlerFn`] closure-backed implementation
//! - [`HandlerRef`] shared reference to a handler (`Arc<dyn Handler<P>>`)

#[allow(clippy::module_inception)]
mod handler;
mod handler_fn;

pub use handler::{Handler, HandlerRef};
pub use handler_fn::HandlerFn;
