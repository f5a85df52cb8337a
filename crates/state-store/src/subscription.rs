//! Observer delivery.
//!
//! Every observer gets its own delivery task reading a clone of the state
//! watch channel. The worker publishes a commit and moves on; it never
//! waits for observers. The watch channel conflates for slow consumers:
//! an observer that falls behind skips straight to the newest snapshot and
//! never sees an older revision than one already delivered, nor the same
//! revision twice.
//!
//! Cleanup is explicit: dropping the [`Subscription`] (or calling
//! [`unsubscribe`](Subscription::unsubscribe)) stops delivery. Nothing
//! here relies on the observer being garbage-collected away.

use tokio::sync::{oneshot, watch};

use crate::store::Snapshot;

/// Registration handle for an observer.
///
/// Tie its lifetime to the subscribing component: when the component goes
/// away, dropping the subscription stops delivery without affecting the
/// store.
#[must_use = "dropping a Subscription immediately unsubscribes the observer"]
pub struct Subscription {
    stop: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// Stop delivery. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Dropping the sender wakes the delivery task, which then exits.
        self.stop.take();
    }
}

pub(crate) fn spawn_observer<S, F>(
    mut state_rx: watch::Receiver<Snapshot<S>>,
    mut on_state: F,
) -> Subscription
where
    S: Clone + Send + Sync + 'static,
    F: FnMut(&S) + Send + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        // Force an immediate first delivery with the snapshot that is
        // current at subscription time.
        state_rx.mark_changed();
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        // Store torn down; no further commits can arrive.
                        break;
                    }
                    let snapshot = state_rx.borrow_and_update().clone();
                    on_state(&snapshot.state);
                }
            }
        }
    });

    Subscription { stop: Some(stop_tx) }
}
