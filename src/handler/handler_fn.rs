//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `F: Fn(CancellationToken, ResourceKey, Option<Arc<P>>) -> Fut`,
//! producing a fresh future per invocation. No state is shared between invocations
//! unless the closure captures it explicitly (an `Arc<...>` moved into it).
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use reconvisor::{HandlerError, HandlerFn, HandlerRef, ResourceKey};
//! use std::sync::Arc;
//!
//! let h: HandlerRef<u32> = HandlerFn::arc(
//!     |_ctx: CancellationToken, key: ResourceKey, replicas: Option<Arc<u32>>| async move {
//!         match replicas {
//!             Some(n) => println!("scale {key} to {n}"),
//!             None => println!("{key} deleted"),
//!         }
//!         Ok::<_, HandlerError>(())
//!     },
//! );
//! # let _ = h;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handler::Handler;
use crate::key::ResourceKey;

/// Function-backed handler implementation.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`](crate::HandlerRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<P, F, Fut> Handler<P> for HandlerFn<F>
where
    P: Send + Sync + 'static,
    F: Fn(CancellationToken, ResourceKey, Option<Arc<P>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(
        &self,
        ctx: CancellationToken,
        key: &ResourceKey,
        payload: Option<Arc<P>>,
    ) -> Result<(), HandlerError> {
        (self.f)(ctx, key.clone(), payload).await
    }
}
