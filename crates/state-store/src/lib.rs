//! Single-writer state store with an ordered middleware pipeline.
//!
//! This crate is the generic engine that feature components are built on
//! top of: a single source of truth for application state, an ordered
//! interceptor chain that can observe, transform, veto or delay every
//! state transition, asynchronous side-effect execution that re-enters
//! through the ordinary dispatch queue, and a deterministic idle barrier
//! for test synchronization.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  dispatch   ┌───────────────────────────────────────┐
//! │ any       │ ──────────► │ queue → worker → middleware → reducer │
//! │ thread    │             └───────────────┬───────────────────────┘
//! └──────────┘                             │ commit
//!                                          ▼
//!                              ┌──────────────────────┐
//!                              │ watch channel        │──► observer task
//!                              │ (Snapshot, revision) │──► observer task
//!                              └──────────────────────┘
//! ```
//!
//! State and actions are opaque to the engine: any `Clone + Send + Sync`
//! state and any `Send` action type works. The engine only ever replaces
//! the published snapshot atomically, so concurrent readers never observe
//! a torn state, and exactly one reducer application is in flight at any
//! instant.
//!
//! # Example
//!
//! ```rust,no_run
//! use state_store::{Middleware, MiddlewareContext, Next, Store};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Counter {
//!     value: i64,
//! }
//!
//! #[derive(Debug)]
//! enum CounterAction {
//!     Add(i64),
//! }
//!
//! fn reduce(mut state: Counter, action: &CounterAction) -> Counter {
//!     match action {
//!         CounterAction::Add(delta) => state.value += delta,
//!     }
//!     state
//! }
//!
//! # async fn example() {
//! let store = Store::new(Counter::default(), reduce, Vec::new());
//! store.dispatch(CounterAction::Add(2)).await.unwrap();
//! assert_eq!(store.state().value, 2);
//! # }
//! ```
//!
//! Middleware that needs to do real work schedules it on its own executor
//! and re-enters through [`MiddlewareContext::begin_work`]; test code then
//! uses [`Store::wait_until_idle`] to wait for the whole causally-connected
//! chain of actions to drain before asserting.

pub mod error;
pub mod middleware;
pub mod reducer;
pub mod store;
pub mod subscription;
pub mod work;

pub use error::StoreError;
pub use middleware::{LoggingMiddleware, Middleware, MiddlewareContext, Next};
pub use reducer::combine_reducers;
pub use store::{DispatchHandle, Snapshot, Store};
pub use subscription::Subscription;
pub use work::WorkHandle;
