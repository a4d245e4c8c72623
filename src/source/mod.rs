//! Event source: list+watch ingestion.
//!
//! ## Contents
//! - [`ResourceEvent`] normalized add/update/delete notification
//! - [`Retriever`], [`ListResult`], [`WatchStream`] the caller-supplied list+watch capability
//! - [`Store`] latest payload per known key (what resync enumerates and handlers receive)
//! - `EventSource` (internal) the adapter that turns list+watch into queue adds, relisting
//!   whenever a watch ends
//!
//! ## Flow
//! ```text
//! Retriever::list() ──► Store::replace() ──► WorkQueue::add(key) for every item (+ vanished keys)
//!        │
//!        ▼
//! Retriever::watch(version) ──► ResourceEvent ──► Store::apply() ──► WorkQueue::add(key)
//!        │
//!        └─ stream ends / errors ──► (backoff if it delivered nothing) ──► relist
//! ```

mod adapter;
mod event;
mod retriever;
mod store;

pub(crate) use adapter::EventSource;
pub use event::ResourceEvent;
pub use retriever::{ListResult, Retriever, RetrieverRef, WatchStream};
pub use store::Store;
