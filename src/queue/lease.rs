//! # Lease: scoped ownership of an in-flight key.
//!
//! Returned by [`WorkQueue::get`](crate::WorkQueue::get). While a `Lease` is alive
//! the key is in flight and no other worker can obtain it. Dropping the lease calls
//! [`WorkQueue::done`](crate::WorkQueue::done), on success, on error and on panic alike.

use std::fmt;

use crate::key::ResourceKey;
use crate::queue::WorkQueue;

/// Exclusive, scoped claim on one key of a [`WorkQueue`].
#[must_use = "dropping a lease immediately marks the key done"]
pub struct Lease {
    queue: WorkQueue,
    key: ResourceKey,
}

impl Lease {
    pub(crate) fn new(queue: WorkQueue, key: ResourceKey) -> Self {
        Self { queue, key }
    }

    /// The leased key.
    #[inline]
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Releases the key explicitly (same as dropping the lease).
    pub fn done(self) {}
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.queue.done(&self.key);
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("key", &self.key).finish()
    }
}
