//! # In-process leases.
//!
//! [`LeaseLock`] is a lease shared by several controllers in one process; each
//! controller competes through its own [`LocalElector`]. Useful for tests and for
//! running hot standbys inside a single binary.
//!
//! ```text
//!            try_acquire (free)                 expire()
//!  (free) ─────────────────────► HELD(id) ───────────────────► REVOKED(id)
//!     ▲                              │                              │
//!     └──────── release() ───────────┴──────── release() ───────────┘
//! ```
//!
//! A revoked lease still blocks everybody until its holder calls `release`, so
//! the next leader can only start after the previous one has stopped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::leader::LeaderElector;

#[derive(Default)]
struct Lease {
    holder: Option<u64>,
    revoked: bool,
}

struct Inner {
    lease: Mutex<Lease>,
    changed: watch::Sender<u64>,
    next_id: AtomicU64,
}

/// Shared in-process lease. Cheap to clone.
///
/// # Example
/// ```
/// use reconvisor::{LeaderElector, LeaseLock};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let lock = LeaseLock::new();
/// let a = lock.elector();
/// let b = lock.elector();
///
/// assert!(a.try_acquire().await);
/// assert!(!b.try_acquire().await);
///
/// lock.expire();       // a's lost() resolves
/// a.lost().await;
/// assert!(!b.try_acquire().await); // still blocked until a releases
///
/// a.release().await;
/// assert!(b.try_acquire().await);
/// # }
/// ```
#[derive(Clone)]
pub struct LeaseLock {
    inner: Arc<Inner>,
}

impl Default for LeaseLock {
    fn default() -> Self {
        let (changed, _rx) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                lease: Mutex::new(Lease::default()),
                changed,
                next_id: AtomicU64::new(1),
            }),
        }
    }
}

impl LeaseLock {
    /// Creates a free lease.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new competitor for this lease.
    pub fn elector(&self) -> LocalElector {
        LocalElector {
            lock: self.clone(),
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Revokes the current holder; its [`LeaderElector::lost`] resolves.
    ///
    /// Returns `false` if nobody holds the lease.
    pub fn expire(&self) -> bool {
        let revoked = {
            let mut lease = self.lease();
            match lease.holder {
                Some(_) if !lease.revoked => {
                    lease.revoked = true;
                    true
                }
                _ => false,
            }
        };
        if revoked {
            self.bump();
        }
        revoked
    }

    /// True while some elector holds the lease (revoked or not).
    pub fn is_held(&self) -> bool {
        self.lease().holder.is_some()
    }

    fn lease(&self) -> MutexGuard<'_, Lease> {
        self.inner
            .lease
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.inner.changed.send_modify(|v| *v = v.wrapping_add(1));
    }
}

/// One competitor for a [`LeaseLock`].
pub struct LocalElector {
    lock: LeaseLock,
    id: u64,
}

impl LocalElector {
    fn is_leading(&self) -> bool {
        let lease = self.lock.lease();
        lease.holder == Some(self.id) && !lease.revoked
    }
}

#[async_trait]
impl LeaderElector for LocalElector {
    async fn try_acquire(&self) -> bool {
        let acquired = {
            let mut lease = self.lock.lease();
            match lease.holder {
                None => {
                    lease.holder = Some(self.id);
                    lease.revoked = false;
                    true
                }
                Some(id) => id == self.id && !lease.revoked,
            }
        };
        if acquired {
            self.lock.bump();
        }
        acquired
    }

    async fn lost(&self) {
        let mut rx = self.lock.inner.changed.subscribe();
        while self.is_leading() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    async fn release(&self) {
        let released = {
            let mut lease = self.lock.lease();
            if lease.holder == Some(self.id) {
                lease.holder = None;
                lease.revoked = false;
                true
            } else {
                false
            }
        };
        if released {
            self.lock.bump();
        }
    }
}
