//! State-observation recording.

use std::sync::{Arc, Mutex};

/// Collects the states delivered to an observer callback.
///
/// ```rust,no_run
/// # use state_store::Store;
/// # use state_store_testing::StateRecorder;
/// # async fn example(store: Store<u32, ()>) {
/// let recorder = StateRecorder::new();
/// let subscription = store.observe(recorder.callback());
/// // ... dispatch, wait_until_idle ...
/// assert!(!recorder.states().is_empty());
/// # drop(subscription);
/// # }
/// ```
pub struct StateRecorder<S> {
    states: Arc<Mutex<Vec<S>>>,
}

impl<S> Default for StateRecorder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StateRecorder<S> {
    pub fn new() -> Self {
        Self {
            states: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Observer callback to pass to `Store::observe`.
    pub fn callback(&self) -> impl FnMut(&S) + Send + 'static
    where
        S: Clone + Send + 'static,
    {
        let states = Arc::clone(&self.states);
        move |state: &S| {
            states
                .lock()
                .expect("recorded states poisoned")
                .push(state.clone());
        }
    }

    /// Every state delivered so far, in delivery order.
    pub fn states(&self) -> Vec<S>
    where
        S: Clone,
    {
        self.states.lock().expect("recorded states poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.states.lock().expect("recorded states poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
