//! # Handler abstraction.
//!
//! The [`Handler`] is the caller's reconciliation logic. It receives a resource key
//! plus the latest known payload (`None` when the resource no longer exists) and
//! drives the world toward that desired state.
//!
//! Invocations for one key are strictly sequential; different keys may run in
//! parallel on different workers. A handler must be idempotent: intermediate
//! events for a key may be collapsed into one invocation, and resync repeats
//! invocations with nothing new to do.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::key::ResourceKey;

/// # Reconciliation logic for one resource key.
///
/// Implementors should watch `ctx` and return [`HandlerError::Canceled`] promptly
/// once it is cancelled (shutdown, leadership loss or processing timeout).
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use reconvisor::{Handler, HandlerError, ResourceKey};
///
/// struct Printer;
///
/// #[async_trait]
/// impl Handler<String> for Printer {
///     async fn handle(
///         &self,
///         ctx: CancellationToken,
///         key: &ResourceKey,
///         payload: Option<Arc<String>>,
///     ) -> Result<(), HandlerError> {
///         if ctx.is_cancelled() {
///             return Err(HandlerError::Canceled);
///         }
///         match payload {
///             Some(spec) => println!("ensure {key} matches {spec}"),
///             None => println!("clean up after {key}"),
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<P>: Send + Sync + 'static {
    /// Reconciles `key` against `payload`.
    async fn handle(
        &self,
        ctx: CancellationToken,
        key: &ResourceKey,
        payload: Option<Arc<P>>,
    ) -> Result<(), HandlerError>;
}

/// Shared handle to a handler.
pub type HandlerRef<P> = Arc<dyn Handler<P>>;
