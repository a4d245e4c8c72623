//! # Leadership gate.
//!
//! Runs the pipeline only while this instance leads.
//!
//! ```text
//! loop {
//!   ├─► Follower: try_acquire() every retry_period     (stop → return Ok)
//!   ├─► Leader:   publish LeadershipAcquired
//!   │             run pipeline until
//!   │               ├─ stop / source error      → pipeline result
//!   │               └─ lost()                   → publish LeadershipLost,
//!   │                                             stop pipeline, wait for it
//!   ├─► release()                               (skipped if workers were detached)
//!   └─► error or stop or !reacquire → return; else compete again
//! }
//! ```
//!
//! Leadership is released only after the running period has fully stopped. When
//! the drain window was exceeded, handlers may still be running on detached workers,
//! so the lease is kept and the error ends the controller.

use tokio::select;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::Pipeline;
use crate::error::RuntimeError;
use crate::events::{Event, EventKind};
use crate::leader::{LeaderConfig, LeaderElector, LeadershipState};

/// Runs `pipeline` under `elector` until `stop` is cancelled or a period fails.
pub(crate) async fn run_gated<P: Send + Sync + 'static>(
    pipeline: &Pipeline<P>,
    elector: &dyn LeaderElector,
    cfg: &LeaderConfig,
    leadership: &watch::Sender<LeadershipState>,
    stop: &CancellationToken,
) -> Result<(), RuntimeError> {
    loop {
        leadership.send_replace(LeadershipState::Follower);
        if !acquire(elector, cfg, stop).await {
            return Ok(());
        }

        leadership.send_replace(LeadershipState::Leader);
        pipeline
            .bus
            .publish(Event::new(EventKind::LeadershipAcquired));

        let period = stop.child_token();
        let run = pipeline.run(period.clone(), stop);
        tokio::pin!(run);

        let res = select! {
            res = &mut run => res,
            _ = elector.lost() => {
                pipeline.bus.publish(Event::new(EventKind::LeadershipLost));
                period.cancel();
                run.await
            }
        };

        if !matches!(res, Err(RuntimeError::GraceExceeded { .. })) {
            elector.release().await;
        }
        leadership.send_replace(LeadershipState::Follower);

        res?;
        if stop.is_cancelled() || !cfg.reacquire {
            return Ok(());
        }
    }
}

/// Polls `try_acquire` until it succeeds; returns `false` if `stop` fires first.
async fn acquire(
    elector: &dyn LeaderElector,
    cfg: &LeaderConfig,
    stop: &CancellationToken,
) -> bool {
    loop {
        if stop.is_cancelled() {
            return false;
        }
        let acquired = select! {
            ok = elector.try_acquire() => ok,
            _ = stop.cancelled() => return false,
        };
        if acquired {
            return true;
        }
        select! {
            _ = time::sleep(cfg.retry_period) => {}
            _ = stop.cancelled() => return false,
        }
    }
}
