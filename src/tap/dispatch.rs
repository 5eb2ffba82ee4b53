//! Render thread → consumer thread hand-off.
//!
//! A [`Dispatcher`] owns one named OS thread that runs submitted units one at
//! a time, in submission order.  The render thread submits through a
//! [`DispatchHandle`], which never blocks and never takes a lock: with the
//! default policy the only work on the render side is queueing the boxed
//! unit.
//!
//! # Backpressure
//!
//! With [`BackpressurePolicy::Unbounded`] (the default) nothing is ever
//! dropped; if the consumer falls behind, units queue up.  A deployment that
//! prefers bounded memory can pick [`BackpressurePolicy::DropNewest`]: when
//! the queue is full the newly submitted unit is discarded and counted in
//! [`Dispatcher::dropped`].
//!
//! ```rust
//! use pitch_tap::tap::{BackpressurePolicy, Dispatcher};
//! use std::sync::{Arc, Mutex};
//!
//! let dispatcher = Dispatcher::spawn(BackpressurePolicy::Unbounded).unwrap();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! for i in 0..3 {
//!     let seen = Arc::clone(&seen);
//!     dispatcher.handle().submit(Box::new(move || seen.lock().unwrap().push(i)));
//! }
//! dispatcher.flush();
//! assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::thread::{self, ThreadId};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// A unit of work executed on the consumer thread.
pub type Unit = Box<dyn FnOnce() + Send>;

const THREAD_NAME: &str = "pitch-tap-dispatch";

// ---------------------------------------------------------------------------
// DispatchError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn the pitch-tap-dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// BackpressurePolicy
// ---------------------------------------------------------------------------

/// What happens when the consumer thread falls behind the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// Queue every unit; never drop.
    #[default]
    Unbounded,
    /// Keep at most `capacity` pending units and drop new ones beyond that.
    DropNewest { capacity: usize },
}

impl BackpressurePolicy {
    /// `None` → unbounded, `Some(n)` → drop beyond `n` pending units.
    pub fn from_max_pending(max_pending: Option<usize>) -> Self {
        match max_pending {
            None => Self::Unbounded,
            Some(capacity) => Self::DropNewest { capacity },
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchHandle
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum QueueTx {
    Unbounded(mpsc::UnboundedSender<Unit>),
    Bounded(mpsc::Sender<Unit>),
}

enum QueueRx {
    Unbounded(mpsc::UnboundedReceiver<Unit>),
    Bounded(mpsc::Receiver<Unit>),
}

impl QueueRx {
    fn blocking_recv(&mut self) -> Option<Unit> {
        match self {
            QueueRx::Unbounded(rx) => rx.blocking_recv(),
            QueueRx::Bounded(rx) => rx.blocking_recv(),
        }
    }
}

/// Cheap, cloneable submit side of a [`Dispatcher`].  Safe to use from the
/// render thread.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: QueueTx,
    dropped: Arc<AtomicU64>,
}

impl DispatchHandle {
    /// Queue `unit` for the consumer thread without blocking.
    ///
    /// Returns `false` when the unit was dropped: the queue is full under
    /// [`BackpressurePolicy::DropNewest`], or the dispatcher thread is gone.
    pub fn submit(&self, unit: Unit) -> bool {
        let queued = match &self.tx {
            QueueTx::Unbounded(tx) => tx.send(unit).is_ok(),
            QueueTx::Bounded(tx) => tx.try_send(unit).is_ok(),
        };
        if !queued {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queued
    }

    /// Queue `unit`, waiting for room under a bounded policy.
    ///
    /// Never call this from the render thread.
    fn submit_blocking(&self, unit: Unit) -> bool {
        match &self.tx {
            QueueTx::Unbounded(tx) => tx.send(unit).is_ok(),
            QueueTx::Bounded(tx) => tx.blocking_send(unit).is_ok(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// The consumer thread and its queue.
///
/// Clones share the same thread.  The thread is never joined; it exits on
/// its own once every clone and [`DispatchHandle`] is gone and the queue is
/// drained.
#[derive(Clone)]
pub struct Dispatcher {
    handle: DispatchHandle,
    policy: BackpressurePolicy,
    thread: ThreadId,
}

impl Dispatcher {
    /// Start the consumer thread.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] if the OS refuses to create the
    /// thread.
    pub fn spawn(policy: BackpressurePolicy) -> Result<Self, DispatchError> {
        let (tx, mut rx) = match policy {
            BackpressurePolicy::Unbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                (QueueTx::Unbounded(tx), QueueRx::Unbounded(rx))
            }
            BackpressurePolicy::DropNewest { capacity } => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (QueueTx::Bounded(tx), QueueRx::Bounded(rx))
            }
        };

        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                while let Some(unit) = rx.blocking_recv() {
                    // Keep serving later units even if a handler panics.
                    if panic::catch_unwind(AssertUnwindSafe(unit)).is_err() {
                        log::error!("{THREAD_NAME}: unit panicked; continuing");
                    }
                }
                log::debug!("{THREAD_NAME}: all handles dropped, exiting");
            })?
            .thread()
            .id();

        log::debug!("{THREAD_NAME}: started ({policy:?})");

        Ok(Self {
            handle: DispatchHandle {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            policy,
            thread,
        })
    }

    /// A submit handle for render-thread callbacks.
    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    /// Number of units dropped so far by [`DispatchHandle::submit`].
    pub fn dropped(&self) -> u64 {
        self.handle.dropped.load(Ordering::Relaxed)
    }

    /// Block until every unit submitted before this call has run.
    ///
    /// Calling it from the consumer thread itself returns immediately
    /// instead of deadlocking.
    pub fn flush(&self) {
        if thread::current().id() == self.thread {
            log::warn!("{THREAD_NAME}: flush() called from the dispatch thread; ignored");
            return;
        }
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let queued = self.handle.submit_blocking(Box::new(move || {
            let _ = done_tx.send(());
        }));
        if queued {
            let _ = done_rx.blocking_recv();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc as std_mpsc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<usize>>>, impl Fn(usize) -> Unit) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let make = move |i: usize| -> Unit {
            let seen = Arc::clone(&seen_clone);
            Box::new(move || seen.lock().unwrap().push(i))
        };
        (seen, make)
    }

    /// Park the consumer thread until the returned sender is used or dropped.
    /// Returns once the consumer is actually parked, so the queue is empty.
    fn block_consumer(handle: &DispatchHandle) -> std_mpsc::Sender<()> {
        let (running_tx, running_rx) = std_mpsc::channel::<()>();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        assert!(handle.submit(Box::new(move || {
            let _ = running_tx.send(());
            let _ = release_rx.recv();
        })));
        running_rx.recv().unwrap();
        release_tx
    }

    #[test]
    fn handle_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DispatchHandle>();
    }

    #[test]
    fn units_run_in_submission_order() {
        let dispatcher = Dispatcher::spawn(BackpressurePolicy::Unbounded).unwrap();
        let (seen, make) = recorder();
        let handle = dispatcher.handle();

        for i in 0..100 {
            assert!(handle.submit(make(i)));
        }
        dispatcher.flush();

        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
        assert_eq!(dispatcher.dropped(), 0);
    }

    #[test]
    fn units_run_on_the_dispatch_thread() {
        let dispatcher = Dispatcher::spawn(BackpressurePolicy::default()).unwrap();
        let name = Arc::new(Mutex::new(None));
        let name_clone = Arc::clone(&name);
        dispatcher.handle().submit(Box::new(move || {
            *name_clone.lock().unwrap() = thread::current().name().map(str::to_owned);
        }));
        dispatcher.flush();

        assert_eq!(name.lock().unwrap().as_deref(), Some(THREAD_NAME));
    }

    #[test]
    fn unbounded_queue_never_drops() {
        let dispatcher = Dispatcher::spawn(BackpressurePolicy::Unbounded).unwrap();
        let handle = dispatcher.handle();
        let (seen, make) = recorder();

        let release = block_consumer(&handle);
        for i in 0..1_000 {
            assert!(handle.submit(make(i)));
        }
        drop(release);
        dispatcher.flush();

        assert_eq!(seen.lock().unwrap().len(), 1_000);
        assert_eq!(dispatcher.dropped(), 0);
    }

    #[test]
    fn drop_newest_counts_dropped_units() {
        let dispatcher =
            Dispatcher::spawn(BackpressurePolicy::DropNewest { capacity: 2 }).unwrap();
        let handle = dispatcher.handle();
        let (seen, make) = recorder();

        let release = block_consumer(&handle);
        assert!(handle.submit(make(0)));
        assert!(handle.submit(make(1)));
        assert!(!handle.submit(make(2)));
        assert!(!handle.submit(make(3)));

        drop(release);
        dispatcher.flush();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
        assert_eq!(dispatcher.dropped(), 2);
    }

    #[test]
    fn panicking_unit_does_not_stop_the_thread() {
        let dispatcher = Dispatcher::spawn(BackpressurePolicy::Unbounded).unwrap();
        let (seen, make) = recorder();
        let handle = dispatcher.handle();

        handle.submit(Box::new(|| panic!("boom")));
        handle.submit(make(7));
        dispatcher.flush();

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn policy_from_max_pending() {
        assert_eq!(
            BackpressurePolicy::from_max_pending(None),
            BackpressurePolicy::Unbounded
        );
        assert_eq!(
            BackpressurePolicy::from_max_pending(Some(8)),
            BackpressurePolicy::DropNewest { capacity: 8 }
        );
    }
}
