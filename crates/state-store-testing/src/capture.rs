//! Action-capturing middleware.

use std::sync::{Arc, Mutex};

use state_store::{Middleware, MiddlewareContext, Next};

/// Middleware that records every action passing through it and forwards
/// the action unchanged.
///
/// Place it first in the middleware list to capture everything that enters
/// the store, or last to capture only what survived the chain in front of
/// it.
pub struct CaptureMiddleware<A> {
    captured: Arc<Mutex<Vec<A>>>,
}

impl<A> CaptureMiddleware<A> {
    /// Build the middleware together with the [`CapturedActions`] view the
    /// test keeps for assertions.
    pub fn new() -> (Self, CapturedActions<A>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                captured: Arc::clone(&captured),
            },
            CapturedActions { captured },
        )
    }
}

impl<S, A> Middleware<S, A> for CaptureMiddleware<A>
where
    A: Clone + Send,
{
    fn process(&mut self, _ctx: &MiddlewareContext<S, A>, next: Next<'_, A>, action: A) {
        self.captured
            .lock()
            .expect("captured actions poisoned")
            .push(action.clone());
        next.call(action);
    }
}

/// Read side of a [`CaptureMiddleware`].
#[derive(Clone)]
pub struct CapturedActions<A> {
    captured: Arc<Mutex<Vec<A>>>,
}

impl<A: Clone> CapturedActions<A> {
    /// All recorded actions, in the order they traversed the middleware.
    pub fn all(&self) -> Vec<A> {
        self.captured
            .lock()
            .expect("captured actions poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.captured
            .lock()
            .expect("captured actions poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First recorded action matching the predicate.
    pub fn find_first(&self, predicate: impl Fn(&A) -> bool) -> Option<A> {
        self.captured
            .lock()
            .expect("captured actions poisoned")
            .iter()
            .find(|action| predicate(action))
            .cloned()
    }

    /// Panic if no recorded action matches the predicate.
    pub fn assert_dispatched(&self, predicate: impl Fn(&A) -> bool) {
        assert!(
            self.find_first(&predicate).is_some(),
            "expected a matching action to have been dispatched"
        );
    }

    /// Panic if any recorded action matches the predicate.
    pub fn assert_not_dispatched(&self, predicate: impl Fn(&A) -> bool) {
        assert!(
            self.find_first(&predicate).is_none(),
            "expected no matching action to have been dispatched"
        );
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.captured
            .lock()
            .expect("captured actions poisoned")
            .clear();
    }
}
