//! Reducer combinators.
//!
//! A reducer is any `Fn(S, &A) -> S` that is total, pure and non-blocking.
//! An unrecognized action must come back as the unchanged state, never as a
//! panic. Exactly one reducer is registered per store; larger state shapes
//! are covered by combining per-concern reducers with [`combine_reducers`].

/// Fold several reducers into one.
///
/// Each action runs through every reducer in registration order; the state
/// produced by one reducer is the input to the next. Reducers that do not
/// care about an action pass the state through unchanged.
pub fn combine_reducers<S, A>(
    reducers: Vec<Box<dyn Fn(S, &A) -> S + Send>>,
) -> impl Fn(S, &A) -> S + Send {
    move |state, action| {
        reducers
            .iter()
            .fold(state, |state, reduce| reduce(state, action))
    }
}
