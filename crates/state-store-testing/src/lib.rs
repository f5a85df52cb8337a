//! Test helpers for components built on `state-store`.
//!
//! Feature test suites rarely want to assert on the engine itself; they
//! want to know *which actions flowed through the store* and *which states
//! an observer saw*. This crate provides both:
//!
//! - [`CaptureMiddleware`] records every action that traverses the chain
//!   and hands out a [`CapturedActions`] view with assertion helpers.
//! - [`StateRecorder`] collects the states delivered to an observer so
//!   ordering and monotonicity can be asserted after the fact.
//!
//! ```rust,no_run
//! use state_store::Store;
//! use state_store_testing::CaptureMiddleware;
//!
//! # #[derive(Debug, Clone)] enum Action { Ping }
//! # async fn example() {
//! let (capture, captured) = CaptureMiddleware::new();
//! let store = Store::new(0u32, |state, _: &Action| state, vec![Box::new(capture)]);
//!
//! store.dispatch(Action::Ping).await.unwrap();
//! captured.assert_dispatched(|action| matches!(action, Action::Ping));
//! # }
//! ```

pub mod capture;
pub mod recorder;

pub use capture::{CaptureMiddleware, CapturedActions};
pub use recorder::StateRecorder;
