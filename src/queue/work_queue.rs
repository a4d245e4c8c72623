//! # WorkQueue: deduplicating, rate-limited queue of resource keys.
//!
//! The queue transports "something changed for this key", never payloads. It is a
//! **set** of keys ordered by readiness: adding a key that is already pending is a
//! no-op, and a key is never handed to two workers at once.
//!
//! ## Key states
//! ```text
//!                add()                       get()
//!   (absent) ─────────────► READY ───────────────────► PROCESSING
//!      ▲                      ▲                          │  │
//!      │                      │ backoff elapsed          │  │ add() while processing
//!      │                      │                          │  ▼
//!      │                   WAITING ◄── add_after_failure  │ PROCESSING + DIRTY
//!      │                                                 │  │
//!      └──────────────────────── done() ◄────────────────┘  └── done() ──► READY
//! ```
//!
//! ## Rules
//! - `ready ⊆ dirty`; a dirty key is in `ready` unless it is being processed.
//! - A key is never both dirty and waiting; an external `add` of a waiting key
//!   cancels the wait, resets its retry counter and makes it ready immediately.
//! - `done` is driven by [`Lease`] drop, so every successful `get` is matched by
//!   exactly one `done` on every exit path.
//! - After [`WorkQueue::shut_down`], `add` is refused and `get` returns `None`;
//!   in-flight leases stay valid until dropped ([`WorkQueue::wait_idle`]).
//!
//! All state lives behind one `std::sync::Mutex` that is never held across an
//! `.await`; waiting is done with `tokio::sync::Notify` and `sleep_until`.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::key::ResourceKey;
use crate::policies::BackoffPolicy;
use crate::queue::lease::Lease;

/// Outcome of [`WorkQueue::retry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retry {
    /// The key will become ready again after `delay`; `attempt` is the retry number (1-based).
    Scheduled {
        /// Wait before the key is ready again.
        delay: Duration,
        /// Retry number for this key (1-based).
        attempt: u32,
    },
    /// A newer `add` already marked the key dirty; it is reprocessed after `done`.
    ///
    /// Takes precedence over the budget check.
    Superseded,
    /// Retry budget exhausted; the key was forgotten.
    Exhausted {
        /// Total failed attempts.
        attempts: u32,
    },
    /// The queue is shutting down; nothing was scheduled.
    ShuttingDown,
}

#[derive(Default)]
struct State {
    ready: VecDeque<ResourceKey>,
    dirty: HashSet<ResourceKey>,
    processing: HashSet<ResourceKey>,
    waiting: BTreeMap<(Instant, u64), ResourceKey>,
    waiting_index: HashMap<ResourceKey, (Instant, u64)>,
    retries: HashMap<ResourceKey, u32>,
    next_seq: u64,
    shutting_down: bool,
}

impl State {
    /// Marks `key` dirty; returns `true` if a waiter should be woken.
    fn mark_dirty(&mut self, key: ResourceKey) -> bool {
        if self.dirty.contains(&key) {
            return false;
        }
        self.dirty.insert(key.clone());
        if self.processing.contains(&key) {
            return false;
        }
        self.ready.push_back(key);
        true
    }

    fn cancel_wait(&mut self, key: &ResourceKey) {
        if let Some(slot) = self.waiting_index.remove(key) {
            self.waiting.remove(&slot);
        }
    }

    /// Moves every waiting key whose deadline passed into the ready set.
    fn promote(&mut self, now: Instant) -> bool {
        let mut woke = false;
        while let Some(entry) = self.waiting.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let key = entry.remove();
            self.waiting_index.remove(&key);
            woke |= self.mark_dirty(key);
        }
        woke
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.waiting.keys().next().map(|(at, _)| *at)
    }

    fn schedule(&mut self, key: ResourceKey, at: Instant) {
        if let Some(existing) = self.waiting_index.get(&key) {
            if existing.0 <= at {
                return;
            }
            let existing = *existing;
            self.waiting.remove(&existing);
        }
        let slot = (at, self.next_seq);
        self.next_seq += 1;
        self.waiting.insert(slot, key.clone());
        self.waiting_index.insert(key, slot);
    }
}

struct Inner {
    state: Mutex<State>,
    /// Wakes `get` callers: new ready key, earlier deadline, or shutdown.
    ready: Notify,
    /// Wakes `wait_idle` callers when the processing set empties.
    idle: Notify,
    backoff: BackoffPolicy,
    max_retries: u32,
}

/// Deduplicating work queue with per-key retry backoff. Cheap to clone.
///
/// # Example
/// ```rust
/// use reconvisor::{BackoffPolicy, ResourceKey, WorkQueue};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = WorkQueue::new(BackoffPolicy::default(), 3);
/// let key = ResourceKey::from("default/web-0");
/// queue.add(key.clone());
/// queue.add(key.clone());
/// assert_eq!(queue.len(), 1);
///
/// let lease = queue.get().await.unwrap();
/// assert_eq!(lease.key(), &key);
/// drop(lease); // done()
/// assert!(queue.is_empty());
/// # }
/// ```
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl WorkQueue {
    /// Creates a queue whose failed keys back off per `backoff`, at most `max_retries` times.
    pub fn new(backoff: BackoffPolicy, max_retries: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                ready: Notify::new(),
                idle: Notify::new(),
                backoff,
                max_retries,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Signals that something changed for `key`.
    ///
    /// Idempotent while the key is pending or in flight. A fresh observation
    /// supersedes an earlier failure: the retry counter is reset and a pending
    /// backoff wait is cancelled.
    ///
    /// Returns `false` if the queue is shutting down and the key was not accepted.
    pub fn add(&self, key: ResourceKey) -> bool {
        let woke = {
            let mut st = self.state();
            if st.shutting_down {
                return false;
            }
            st.retries.remove(&key);
            st.cancel_wait(&key);
            st.mark_dirty(key)
        };
        if woke {
            self.inner.ready.notify_one();
        }
        true
    }

    /// Waits for the next ready key and leases it to the caller.
    ///
    /// Returns `None` once the queue is shutting down. The key stays in flight
    /// (and further `add`s of it only mark it dirty) until the [`Lease`] is dropped.
    pub async fn get(&self) -> Option<Lease> {
        loop {
            let notified = self.inner.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let deadline = {
                let mut st = self.state();
                st.promote(Instant::now());
                if st.shutting_down {
                    return None;
                }
                if let Some(key) = st.ready.pop_front() {
                    st.dirty.remove(&key);
                    st.processing.insert(key.clone());
                    let more = !st.ready.is_empty();
                    drop(st);
                    if more {
                        self.inner.ready.notify_one();
                    }
                    return Some(Lease::new(self.clone(), key));
                }
                st.next_deadline()
            };

            match deadline {
                Some(at) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = time::sleep_until(at) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Marks `key` as no longer in flight.
    ///
    /// Called by [`Lease`] on drop. If the key was added again while in flight it
    /// becomes ready immediately.
    pub fn done(&self, key: &ResourceKey) {
        let (woke, idle) = {
            let mut st = self.state();
            if !st.processing.remove(key) {
                return;
            }
            let woke = if st.dirty.contains(key) && !st.shutting_down {
                st.ready.push_back(key.clone());
                true
            } else {
                false
            };
            (woke, st.processing.is_empty())
        };
        if woke {
            self.inner.ready.notify_one();
        }
        if idle {
            self.inner.idle.notify_waiters();
        }
    }

    /// Requeues a failed key with backoff, or drops it once the budget is spent.
    ///
    /// Must be called while the caller still holds the key's lease.
    pub fn retry(&self, key: &ResourceKey) -> Retry {
        let mut st = self.state();
        if st.shutting_down {
            return Retry::ShuttingDown;
        }

        // A re-add while in flight already reset the counter and requeues on `done`.
        if st.dirty.contains(key) {
            return Retry::Superseded;
        }

        let done = st.retries.get(key).copied().unwrap_or(0);
        if done >= self.inner.max_retries {
            st.retries.remove(key);
            return Retry::Exhausted { attempts: done + 1 };
        }
        st.retries.insert(key.clone(), done + 1);

        let delay = self.inner.backoff.next(done);
        st.schedule(key.clone(), Instant::now() + delay);
        drop(st);
        self.inner.ready.notify_one();
        Retry::Scheduled {
            delay,
            attempt: done + 1,
        }
    }

    /// Requeues a failed key with backoff.
    ///
    /// Returns `true` if the key will be retried, `false` if the retry budget is
    /// exhausted and the key was dropped. A shutting-down queue schedules nothing
    /// and returns `true`; the next running period relists anyway.
    pub fn add_after_failure(&self, key: &ResourceKey) -> bool {
        !matches!(self.retry(key), Retry::Exhausted { .. })
    }

    /// Clears the retry counter of `key`.
    pub fn forget(&self, key: &ResourceKey) {
        self.state().retries.remove(key);
    }

    /// Number of retries currently recorded for `key`.
    pub fn num_requeues(&self, key: &ResourceKey) -> u32 {
        self.state().retries.get(key).copied().unwrap_or(0)
    }

    /// Number of pending keys (ready, dirty-in-flight or waiting for backoff).
    pub fn len(&self) -> usize {
        let st = self.state();
        st.dirty.len() + st.waiting_index.len()
    }

    /// True if no key is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of the keys currently leased to workers.
    pub fn in_flight(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self.state().processing.iter().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Stops accepting keys and wakes every blocked `get`.
    pub fn shut_down(&self) {
        self.state().shutting_down = true;
        self.inner.ready.notify_waiters();
    }

    /// True once [`shut_down`](Self::shut_down) was called.
    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }

    /// Waits until no key is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state().processing.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
