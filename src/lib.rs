//! # reconvisor
//!
//! **Reconvisor** is a level-triggered reconciliation controller runtime for Rust.
//!
//! You supply a [`Retriever`] (list + watch over some remote collection) and a
//! [`Handler`] (drive the world toward the desired state for one key). The
//! runtime turns every observed change into a deduplicated key in a work queue,
//! hands keys to a pool of workers, retries failures with backoff, periodically
//! re-enqueues everything it knows about, and can gate all of this behind leader
//! election.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌────────────────────┐
//!   │ Retriever (caller) │  list() → (items, version)   watch(version) → stream
//!   └─────────┬──────────┘
//!             ▼
//!   ┌────────────────────┐        ┌────────────────────┐
//!   │    EventSource     │──────► │       Store        │  latest payload per key
//!   │  (list + watch,    │        └─────────┬──────────┘
//!   │   relist on end)   │                  │ keys()
//!   └─────────┬──────────┘        ┌─────────▼──────────┐
//!             │ add(key)          │       Resync       │  every resync_interval
//!             ▼                   └─────────┬──────────┘
//!   ┌──────────────────────────────────────────────────┐
//!   │ WorkQueue  (dedup set · in-flight set · backoff) │ ◄── add(key)
//!   └──────┬───────────────────┬───────────────────┬───┘
//!          ▼ get()             ▼ get()             ▼ get()
//!     ┌──────────┐        ┌──────────┐        ┌──────────┐
//!     │ Worker 0 │        │ Worker 1 │        │ Worker N │ ──► Handler (caller)
//!     └──────────┘        └──────────┘        └──────────┘
//!
//!   every component ── publish(Event) ──► Bus ──► SubscriberSet ──► LogWriter / Counters / custom
//! ```
//!
//! ### Lifecycle
//! ```text
//! Created ──run()──► Running ──stop / fatal source error──► Stopping ──► Stopped
//!
//! With a LeaderElector, Running alternates between
//!   Follower: try_acquire() every retry_period
//!   Leader:   one running period (fresh queue + store), until stop or lost()
//! and leadership is released only after the period has fully stopped.
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Capabilities**  | Plug in the remote API and the reconciliation logic.          | [`Retriever`], [`Handler`], [`HandlerFn`]   |
//! | **Work queue**    | Deduplicating, rate-limited key queue usable on its own.      | [`WorkQueue`], [`Lease`], [`Retry`]         |
//! | **Controller**    | Lifecycle, worker pool, resync, graceful stop.                | [`Controller`], [`ControllerConfig`]        |
//! | **Leadership**    | Optional gate; in-process lease included.                     | [`LeaderElector`], [`LeaseLock`]            |
//! | **Policies**      | Per-key and relist backoff with optional jitter.              | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Observability** | Runtime events, `tracing` output, in-process counters.        | [`Subscribe`], [`LogWriter`], [`Counters`]  |
//! | **Errors**        | Typed errors for construction, runtime, sources and handlers. | [`BuildError`], [`RuntimeError`]            |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use futures::{StreamExt, stream};
//! use tokio_util::sync::CancellationToken;
//! use reconvisor::{
//!     Controller, ControllerConfig, HandlerError, HandlerFn, ListResult, ResourceKey,
//!     Retriever, SourceError, WatchStream,
//! };
//!
//! struct Deployments;
//!
//! #[async_trait]
//! impl Retriever<u32> for Deployments {
//!     async fn list(&self) -> Result<ListResult<u32>, SourceError> {
//!         Ok(ListResult::new(vec![(ResourceKey::namespaced("default", "web"), 3)], "42"))
//!     }
//!
//!     async fn watch(&self, _version: &str) -> Result<WatchStream<u32>, SourceError> {
//!         Ok(stream::pending().boxed())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stop = CancellationToken::new();
//!     let done = stop.clone();
//!
//!     let handler = HandlerFn::arc(
//!         move |_ctx: CancellationToken, key: ResourceKey, replicas: Option<Arc<u32>>| {
//!             let done = done.clone();
//!             async move {
//!                 println!("scale {key} to {replicas:?}");
//!                 done.cancel();
//!                 Ok::<_, HandlerError>(())
//!             }
//!         },
//!     );
//!
//!     let cfg = ControllerConfig {
//!         concurrent_workers: 2,
//!         grace: Duration::from_secs(5),
//!         ..ControllerConfig::default()
//!     };
//!     let controller = Controller::builder(cfg)
//!         .with_handler(handler)
//!         .with_retriever(Arc::new(Deployments))
//!         .build()?;
//!
//!     controller.run(stop).await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod handler;
mod key;
mod leader;
mod policies;
mod queue;
mod source;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{Controller, ControllerBuilder, ControllerConfig, ControllerRunState};
pub use error::{BuildError, HandlerError, RuntimeError, SourceError};
pub use events::{Bus, Event, EventKind};
pub use handler::{Handler, HandlerFn, HandlerRef};
pub use key::ResourceKey;
pub use leader::{LeaderConfig, LeaderElector, LeadershipState, LeaseLock, LocalElector};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use queue::{Lease, Retry, WorkQueue};
pub use source::{ListResult, ResourceEvent, Retriever, RetrieverRef, Store, WatchStream};
pub use subscribers::{Counters, CountersSnapshot, LogWriter, Subscribe, SubscriberSet};
