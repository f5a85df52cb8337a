//! In-flight bookkeeping behind the idle barrier.
//!
//! Every enqueued action and every registered unit of asynchronous
//! side-effect work holds exactly one count on [`InFlight`]. The barrier
//! ([`Store::wait_until_idle`](crate::Store::wait_until_idle)) opens when
//! the count reaches zero, which means the queue has drained *and* every
//! middleware-originated chain of follow-up work has settled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use tokio::sync::mpsc;

use crate::store::{Envelope, Msg};

/// Counter shared by the store handle, the worker and all [`WorkHandle`]s.
pub(crate) struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self {
            count: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    pub(crate) fn enter(&self) {
        let mut count = self.count.lock().expect("in-flight counter poisoned");
        *count += 1;
    }

    pub(crate) fn exit(&self) {
        let mut count = self.count.lock().expect("in-flight counter poisoned");
        debug_assert!(*count > 0, "in-flight counter underflow");
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    /// Block the calling thread until the count drops to zero.
    pub(crate) fn wait_blocking(&self) {
        let mut count = self.count.lock().expect("in-flight counter poisoned");
        while *count != 0 {
            count = self
                .idle
                .wait(count)
                .expect("in-flight counter poisoned");
        }
    }
}

/// A unit of asynchronous side-effect work registered with the idle barrier.
///
/// A middleware that schedules work on its own executor obtains one of
/// these via [`MiddlewareContext::begin_work`](crate::MiddlewareContext::begin_work)
/// and moves it into the task. The barrier stays closed until the handle is
/// consumed, so `wait_until_idle` covers the whole causal chain:
///
/// ```text
/// dispatch(A) → middleware begins work → task completes → work.dispatch(B)
/// ```
///
/// [`dispatch`](WorkHandle::dispatch) re-enters the ordinary queue; the new
/// action is counted before this handle's count is released, so the barrier
/// never sees a spurious idle window. Dropping the handle (or calling
/// [`complete`](WorkHandle::complete)) settles the barrier without
/// dispatching.
#[must_use = "dropping a WorkHandle settles the idle barrier without dispatching"]
pub struct WorkHandle<A> {
    queue: mpsc::WeakUnboundedSender<Msg<A>>,
    closed: Arc<AtomicBool>,
    inflight: Arc<InFlight>,
}

impl<A> WorkHandle<A> {
    pub(crate) fn new(
        queue: mpsc::WeakUnboundedSender<Msg<A>>,
        closed: Arc<AtomicBool>,
        inflight: Arc<InFlight>,
    ) -> Self {
        Self {
            queue,
            closed,
            inflight,
        }
    }

    /// Dispatch the follow-up action produced by this unit of work.
    ///
    /// If the store has been shut down or dropped in the meantime this is a
    /// silent no-op: side effects that outlive the store must not fail.
    pub fn dispatch(self, action: A) {
        if self.closed.load(Ordering::SeqCst) {
            log::trace!("store already shut down, dropping side-effect dispatch");
            return;
        }
        let Some(queue) = self.queue.upgrade() else {
            log::trace!("store already gone, dropping side-effect dispatch");
            return;
        };
        // Count the follow-up before Drop releases this handle's count.
        self.inflight.enter();
        if queue.send(Msg::Action(Envelope { action, ack: None })).is_err() {
            self.inflight.exit();
        }
    }

    /// Mark this unit of work as finished without dispatching anything.
    pub fn complete(self) {}
}

impl<A> Drop for WorkHandle<A> {
    fn drop(&mut self) {
        self.inflight.exit();
    }
}
