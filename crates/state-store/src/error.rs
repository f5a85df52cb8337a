use thiserror::Error;

/// Errors reported through a [`DispatchHandle`](crate::DispatchHandle).
///
/// Expected business-level outcomes ("nothing to restore", "unknown id")
/// are never engine errors; reducers encode them as no-op transitions and
/// middleware encodes them by dropping the action. The variants here are
/// reserved for teardown races and collaborator contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store was shut down before the action was processed.
    ///
    /// This is a recoverable race, not a bug: asynchronous side effects
    /// cannot always be cancelled before the store goes away.
    #[error("store was shut down before the action was processed")]
    Shutdown,

    /// A middleware panicked while the action traversed the chain.
    ///
    /// Only the dispatch that hit the panic fails; the worker keeps
    /// processing subsequent actions.
    #[error("middleware panicked while processing an action: {0}")]
    MiddlewarePanic(String),

    /// The reducer panicked. Reducers are contractually total and pure,
    /// so this always indicates a programming error in a collaborator.
    #[error("reducer panicked: {0}")]
    ReducerPanic(String),
}
