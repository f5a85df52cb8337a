//! Middleware chain for the store.
//!
//! Middleware sits between action dispatch and reducer execution, allowing
//! side effects, async orchestration, logging, and other cross-cutting
//! concerns to be handled in a composable way.
//!
//! ## Design
//!
//! ```text
//! dispatch(action)
//!     │
//!     ▼
//! ┌─────────────┐   next    ┌─────────────┐   next    ┌─────────┐
//! │ middleware 0 │ ────────► │ middleware 1 │ ────────► │ reducer │
//! │              │ ◄──────── │              │ ◄──────── │         │
//! └─────────────┘  unwinds  └─────────────┘  unwinds  └─────────┘
//! ```
//!
//! The chain is an onion: code before `next.call(...)` runs as the action
//! travels inward (the middleware registered first runs first), code after
//! it runs as control unwinds outward, at which point the reducer has
//! already committed the new state. Each middleware can:
//!
//! - inspect the action and the latest committed state
//! - forward the action unchanged, forward a *different* action
//!   (translation), or drop it entirely by not calling `next` (veto)
//! - queue follow-up actions via [`MiddlewareContext::dispatch`]
//! - register asynchronous side-effect work via
//!   [`MiddlewareContext::begin_work`]

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::store::{Envelope, Msg, Snapshot};
use crate::work::{InFlight, WorkHandle};

/// Interceptor around dispatch.
///
/// The middleware list is fixed when the store is built; there is no
/// runtime registration. Implementations run on the store's single
/// processing worker, so the synchronous portion should stay short;
/// anything slow belongs on the middleware's own executor, re-entering the
/// store through a [`WorkHandle`] when done.
pub trait Middleware<S, A>: Send {
    /// Handle an action before it reaches the reducer.
    ///
    /// Call `next.call(action)` to keep the action moving down the chain,
    /// or drop `next` to veto it. `next` is consumed by the call, so it can
    /// not be invoked twice.
    fn process(&mut self, ctx: &MiddlewareContext<S, A>, next: Next<'_, A>, action: A);
}

/// Single-shot continuation handed to a middleware.
///
/// Ownership makes the "at most once" contract a compile-time guarantee:
/// [`call`](Next::call) takes `self` by value.
pub struct Next<'a, A> {
    chain: &'a mut dyn FnMut(A),
}

impl<'a, A> Next<'a, A> {
    pub(crate) fn new(chain: &'a mut dyn FnMut(A)) -> Self {
        Self { chain }
    }

    /// Forward an action to the rest of the chain and, ultimately, the
    /// reducer. Returns once the inner chain pass has completed, so code
    /// after this call observes the committed state.
    pub fn call(self, action: A) {
        (self.chain)(action)
    }
}

/// Store access handed to middleware during a chain pass.
///
/// The context deliberately exposes no mutable state access: middleware
/// reads committed snapshots and feeds changes back exclusively through
/// the action queue.
pub struct MiddlewareContext<S, A> {
    queue: mpsc::WeakUnboundedSender<Msg<A>>,
    state_rx: watch::Receiver<Snapshot<S>>,
    inflight: Arc<InFlight>,
    closed: Arc<AtomicBool>,
}

impl<S, A> MiddlewareContext<S, A> {
    pub(crate) fn new(
        queue: mpsc::WeakUnboundedSender<Msg<A>>,
        state_rx: watch::Receiver<Snapshot<S>>,
        inflight: Arc<InFlight>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            queue,
            state_rx,
            inflight,
            closed,
        }
    }

    /// The most recently committed state.
    ///
    /// Before `next` runs this is the state the current action is about to
    /// be reduced against; after `next` returns it already reflects the
    /// reduction (unless an inner middleware vetoed the action).
    pub fn state(&self) -> S
    where
        S: Clone,
    {
        self.state_rx.borrow().state.clone()
    }

    /// Revision number of the most recently committed state.
    pub fn revision(&self) -> u64 {
        self.state_rx.borrow().revision
    }

    /// Queue a follow-up action.
    ///
    /// The action re-enters the store's queue and is processed through the
    /// full chain *after* the current pass completes, never inline. On a
    /// store that has been shut down this is a no-op.
    pub fn dispatch(&self, action: A) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let Some(queue) = self.queue.upgrade() else {
            return;
        };
        self.inflight.enter();
        if queue.send(Msg::Action(Envelope { action, ack: None })).is_err() {
            self.inflight.exit();
        }
    }

    /// Register a unit of asynchronous side-effect work with the idle
    /// barrier and obtain the handle to move into the scheduled task.
    ///
    /// The store stays "busy" for `wait_until_idle` callers until the
    /// returned handle is consumed.
    pub fn begin_work(&self) -> WorkHandle<A> {
        self.inflight.enter();
        WorkHandle::new(
            self.queue.clone(),
            Arc::clone(&self.closed),
            Arc::clone(&self.inflight),
        )
    }
}

/// Logs every action at debug level on the way in and the committed
/// revision on the way out.
///
/// Doubles as the minimal example of the before/after phases: place it
/// first in the middleware list and it brackets the entire chain pass.
pub struct LoggingMiddleware;

impl<S, A> Middleware<S, A> for LoggingMiddleware
where
    A: fmt::Debug,
{
    fn process(&mut self, ctx: &MiddlewareContext<S, A>, next: Next<'_, A>, action: A) {
        log::debug!("action: {action:?}");
        next.call(action);
        log::trace!("chain pass done, state at revision {}", ctx.revision());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_forwards_the_given_action() {
        let mut seen = None;
        let mut forward = |action: u32| seen = Some(action);
        Next::new(&mut forward).call(7);
        assert_eq!(seen, Some(7));
    }

    #[test]
    fn dropping_next_vetoes_the_action() {
        let mut called = false;
        let mut forward = |_: u32| called = true;
        let next = Next::new(&mut forward);
        drop(next);
        assert!(!called);
    }

    #[test]
    fn next_supports_action_translation() {
        let mut seen: Option<&'static str> = None;
        let mut forward = |action: &'static str| seen = Some(action);
        let next = Next::new(&mut forward);
        // The middleware received "original" but forwards something else.
        next.call("translated");
        assert_eq!(seen, Some("translated"));
    }
}
