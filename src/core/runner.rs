//! # Run a single handler invocation.
//!
//! Executes one attempt of a [`Handler`] for one key with an optional timeout and
//! publishes the outcome to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   handle() → Ok(())            → publish ProcessingSucceeded
//!
//! Failure / cancellation:
//!   handle() → Err(e)            → publish ProcessingFailed
//!
//! Timeout:
//!   deadline hit → cancel child  → publish TimeoutHit
//!                                → publish ProcessingFailed (timeout)
//!                                → return Timeout error
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event.
//! - `TimeoutHit` is published **in addition to** `ProcessingFailed`.
//! - Derives a **child token** per attempt; cancelling it never touches the parent.
//! - A panicking handler is caught and reported as a retryable failure.
//! - Does not decide about retries; that is the worker's job.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::events::{Bus, Event, EventKind};
use crate::handler::Handler;
use crate::key::ResourceKey;

/// Identifies one attempt in published events.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Attempt {
    /// 1-based attempt number for the key.
    pub(crate) number: u32,
    /// Worker slot running the attempt.
    pub(crate) worker: u32,
}

/// Executes a single invocation of `handler` for `key`.
pub(crate) async fn run_once<P, H>(
    handler: &H,
    parent: &CancellationToken,
    key: &ResourceKey,
    payload: Option<Arc<P>>,
    timeout: Option<Duration>,
    attempt: Attempt,
    bus: &Bus,
) -> Result<(), HandlerError>
where
    P: Send + Sync + 'static,
    H: Handler<P> + ?Sized,
{
    let child = parent.child_token();
    let started = Instant::now();

    let fut = guarded(handler.handle(child.clone(), key, payload));
    let res = match timeout.filter(|d| !d.is_zero()) {
        Some(dur) => match time::timeout(dur, fut).await {
            Ok(r) => r,
            Err(_elapsed) => {
                child.cancel();
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_key(key.shared())
                        .with_attempt(attempt.number)
                        .with_worker(attempt.worker)
                        .with_timeout(dur),
                );
                Err(HandlerError::Timeout { timeout: dur })
            }
        },
        None => fut.await,
    };

    let elapsed = started.elapsed();
    let ev = match &res {
        Ok(()) => Event::new(EventKind::ProcessingSucceeded),
        Err(e) => Event::new(EventKind::ProcessingFailed).with_reason(e.to_string()),
    };
    bus.publish(
        ev.with_key(key.shared())
            .with_attempt(attempt.number)
            .with_worker(attempt.worker)
            .with_elapsed(elapsed),
    );
    res
}

/// Turns a panic inside the handler future into [`HandlerError::Fail`].
async fn guarded<F>(fut: F) -> Result<(), HandlerError>
where
    F: Future<Output = Result<(), HandlerError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(HandlerError::panicked(&*panic)),
    }
}
