//! The store: single source of truth plus the serialized processing worker.
//!
//! Any number of threads dispatch concurrently; exactly one logical writer
//! (the worker task) runs the middleware chain and the reducer. State is
//! never mutated in place: each commit produces a new value and atomically
//! replaces the published snapshot, so readers never observe a torn state.
//!
//! ```text
//! dispatch() ─┐
//! dispatch() ─┼──► unbounded queue ──► worker ──► chain ──► reducer
//! dispatch() ─┘                          │
//!                                        └──► watch channel ──► observers
//! ```

use std::cell::Cell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot, watch};

use crate::error::StoreError;
use crate::middleware::{Middleware, MiddlewareContext, Next};
use crate::subscription::{self, Subscription};
use crate::work::InFlight;

/// A committed state together with its revision number.
///
/// Revisions start at 0 for the initial state and increase by one per
/// reducer application, giving observers a total order to assert against.
#[derive(Debug, Clone)]
pub struct Snapshot<S> {
    pub state: S,
    pub revision: u64,
}

/// A dispatched action together with its completion signal.
pub(crate) struct Envelope<A> {
    pub(crate) action: A,
    /// `None` for middleware-originated actions, which are fire-and-forget
    /// and tracked by the in-flight counter instead.
    pub(crate) ack: Option<oneshot::Sender<Result<(), StoreError>>>,
}

impl<A> Envelope<A> {
    fn fail(self, err: StoreError) {
        if let Some(ack) = self.ack {
            let _ = ack.send(Err(err));
        }
    }
}

pub(crate) enum Msg<A> {
    Action(Envelope<A>),
    Shutdown,
}

/// Handle returned by [`Store::dispatch`].
///
/// Resolves once the action has fully traversed the middleware chain and,
/// unless a middleware vetoed it, been reduced. Await it from async code
/// or use [`join_blocking`](DispatchHandle::join_blocking) from a plain
/// thread. Dropping the handle neither cancels processing nor loses the
/// action; fire-and-forget dispatch is the common case.
pub struct DispatchHandle {
    ack: oneshot::Receiver<Result<(), StoreError>>,
}

impl DispatchHandle {
    /// Block the calling thread until the action has been processed.
    ///
    /// Must not be called from inside an async runtime; use `.await` there.
    pub fn join_blocking(self) -> Result<(), StoreError> {
        self.ack.blocking_recv().unwrap_or(Err(StoreError::Shutdown))
    }
}

impl Future for DispatchHandle {
    type Output = Result<(), StoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.ack)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(StoreError::Shutdown)))
    }
}

/// Cheaply cloneable handle to a state store.
///
/// The store owns the current state, the middleware chain and the
/// serialized processing worker. All handles share the same store; the
/// worker stops once every handle is dropped or [`shutdown`](Store::shutdown)
/// is called.
pub struct Store<S, A> {
    inner: Arc<Inner<S, A>>,
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S, A> {
    queue: mpsc::UnboundedSender<Msg<A>>,
    state_rx: watch::Receiver<Snapshot<S>>,
    inflight: Arc<InFlight>,
    closed: Arc<AtomicBool>,
}

impl<S, A> Store<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    /// Create a store with an initial state, the reducer and the ordered
    /// middleware list, and spawn its processing worker.
    ///
    /// Must be called within a Tokio runtime. The middleware list is fixed
    /// for the lifetime of the store; middleware run in registration order.
    pub fn new(
        initial_state: S,
        reducer: impl Fn(S, &A) -> S + Send + 'static,
        middleware: Vec<Box<dyn Middleware<S, A>>>,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(Snapshot {
            state: initial_state,
            revision: 0,
        });
        let inflight = Arc::new(InFlight::new());
        let closed = Arc::new(AtomicBool::new(false));

        let ctx = MiddlewareContext::new(
            queue.downgrade(),
            state_rx.clone(),
            Arc::clone(&inflight),
            Arc::clone(&closed),
        );
        let worker = Worker {
            rx,
            middleware,
            core: Core {
                reducer: Box::new(reducer),
                state_tx,
                phase: Cell::new(Phase::Chain),
            },
            ctx,
            inflight: Arc::clone(&inflight),
        };
        tokio::spawn(worker.run());

        Self {
            inner: Arc::new(Inner {
                queue,
                state_rx,
                inflight,
                closed,
            }),
        }
    }

    /// Enqueue an action for processing.
    ///
    /// Safe from any thread, from middleware side effects and from observer
    /// callbacks. Never blocks on reducer execution; the returned handle
    /// resolves once the action has drained through the chain.
    pub fn dispatch(&self, action: A) -> DispatchHandle {
        let (ack_tx, ack_rx) = oneshot::channel();
        let handle = DispatchHandle { ack: ack_rx };

        if self.inner.closed.load(Ordering::SeqCst) {
            let _ = ack_tx.send(Err(StoreError::Shutdown));
            return handle;
        }

        self.inner.inflight.enter();
        let envelope = Envelope {
            action,
            ack: Some(ack_tx),
        };
        if let Err(mpsc::error::SendError(msg)) = self.inner.queue.send(Msg::Action(envelope)) {
            self.inner.inflight.exit();
            if let Msg::Action(envelope) = msg {
                envelope.fail(StoreError::Shutdown);
            }
        }
        handle
    }

    /// The most recently committed state.
    ///
    /// Always a state that completed a full chain pass, never a partially
    /// processed one.
    pub fn state(&self) -> S {
        self.inner.state_rx.borrow().state.clone()
    }

    /// Revision number of the most recently committed state.
    pub fn revision(&self) -> u64 {
        self.inner.state_rx.borrow().revision
    }

    /// Raw access to the commit stream for integrators that want to drive
    /// their own delivery instead of using [`observe`](Store::observe).
    pub fn watch(&self) -> watch::Receiver<Snapshot<S>> {
        self.inner.state_rx.clone()
    }

    /// Register an observer.
    ///
    /// The observer receives the state current at subscription time, then
    /// every subsequent commit in order, conflated when it cannot keep up:
    /// it may skip intermediate states but never sees an older revision
    /// than one already delivered, and never the same revision twice. Each
    /// observer runs on its own delivery task, so a slow observer delays
    /// neither the worker nor other observers.
    pub fn observe<F>(&self, on_state: F) -> Subscription
    where
        F: FnMut(&S) + Send + 'static,
    {
        subscription::spawn_observer(self.inner.state_rx.clone(), on_state)
    }

    /// Wait until the queue has drained and every middleware-originated
    /// chain of asynchronous work has settled.
    ///
    /// This is the synchronization primitive that makes async middleware
    /// behavior deterministically testable: after it returns, no follow-up
    /// dispatch from previously scheduled work can still be pending.
    pub async fn wait_until_idle(&self) {
        let inflight = Arc::clone(&self.inner.inflight);
        tokio::task::spawn_blocking(move || inflight.wait_blocking())
            .await
            .expect("idle barrier waiter panicked");
    }

    /// Blocking variant of [`wait_until_idle`](Store::wait_until_idle) for
    /// threads outside the runtime.
    pub fn wait_until_idle_blocking(&self) {
        self.inner.inflight.wait_blocking();
    }

    /// Tear the store down.
    ///
    /// Actions still queued (and any dispatched afterwards) resolve with
    /// [`StoreError::Shutdown`]; dispatches from outstanding side-effect
    /// work become silent no-ops. Idempotent.
    pub fn shutdown(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            let _ = self.inner.queue.send(Msg::Shutdown);
        }
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Chain,
    Reducer,
}

struct Core<S, A> {
    reducer: Box<dyn Fn(S, &A) -> S + Send>,
    state_tx: watch::Sender<Snapshot<S>>,
    /// Tracks whether a panic unwound out of the reducer or a middleware.
    phase: Cell<Phase>,
}

impl<S, A> Core<S, A>
where
    S: Clone,
{
    /// Terminal step of the chain: apply the reducer and publish the new
    /// snapshot.
    fn commit(&mut self, action: A) {
        let current = self.state_tx.borrow().clone();
        self.phase.set(Phase::Reducer);
        let next = (self.reducer)(current.state, &action);
        self.phase.set(Phase::Chain);
        self.state_tx.send_replace(Snapshot {
            state: next,
            revision: current.revision + 1,
        });
    }
}

struct Worker<S, A> {
    rx: mpsc::UnboundedReceiver<Msg<A>>,
    middleware: Vec<Box<dyn Middleware<S, A>>>,
    core: Core<S, A>,
    ctx: MiddlewareContext<S, A>,
    inflight: Arc<InFlight>,
}

impl<S, A> Worker<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Send + 'static,
{
    async fn run(mut self) {
        log::trace!("store worker started");
        loop {
            match self.rx.recv().await {
                Some(Msg::Action(envelope)) => self.process(envelope),
                Some(Msg::Shutdown) => break,
                None => {
                    // Every store handle is gone and the queue has drained.
                    log::trace!("store worker stopping, all handles dropped");
                    return;
                }
            }
        }

        // Explicit shutdown: fail whatever is still queued so no dispatch
        // handle hangs and the idle barrier settles.
        self.rx.close();
        while let Ok(msg) = self.rx.try_recv() {
            if let Msg::Action(envelope) = msg {
                envelope.fail(StoreError::Shutdown);
                self.inflight.exit();
            }
        }
        log::trace!("store worker stopped");
    }

    /// One full chain pass for one action.
    ///
    /// Panics out of collaborator code are contained here: the faulting
    /// dispatch fails, unrelated subsequent actions keep processing.
    fn process(&mut self, envelope: Envelope<A>) {
        let Envelope { action, ack } = envelope;

        let core = &mut self.core;
        let middleware = &mut self.middleware[..];
        let ctx = &self.ctx;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            run_chain(core, middleware, ctx, action);
        }));

        let outcome = match result {
            Ok(()) => Ok(()),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let err = match self.core.phase.get() {
                    Phase::Reducer => {
                        self.core.phase.set(Phase::Chain);
                        log::error!("reducer panicked (reducers must be total): {message}");
                        StoreError::ReducerPanic(message)
                    }
                    Phase::Chain => {
                        log::error!("middleware panicked: {message}");
                        StoreError::MiddlewarePanic(message)
                    }
                };
                Err(err)
            }
        };

        if let Some(ack) = ack {
            // The dispatcher may have dropped its handle; that is fine.
            let _ = ack.send(outcome);
        }
        self.inflight.exit();
    }
}

/// Recursively nest the middleware list around the terminal reducer step.
///
/// `middleware[0]` is outermost: its before-`next` code runs first and its
/// after-`next` code runs last, once the inner chain has committed.
fn run_chain<S, A>(
    core: &mut Core<S, A>,
    middleware: &mut [Box<dyn Middleware<S, A>>],
    ctx: &MiddlewareContext<S, A>,
    action: A,
) where
    S: Clone,
{
    match middleware.split_first_mut() {
        None => core.commit(action),
        Some((current, rest)) => {
            let mut forward = |action: A| run_chain(core, rest, ctx, action);
            current.process(ctx, Next::new(&mut forward), action);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
