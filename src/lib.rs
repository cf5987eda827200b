//! # rxlife: subscription lifetimes for reactive streams
//!
//! A small push-based stream engine together with the primitives that decide
//! when a subscription ends.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxlife::prelude::*;
//!
//! let scheduler = TestScheduler::new();
//! let mut lifetime = CompositeSubscription::new();
//!
//! observable::start(|| 42, scheduler.clone())
//!   .subscribe(|v| println!("answer: {v}"))
//!   .dispose_with(&lifetime)
//!   .unwrap();
//!
//! // Ending the lifetime cancels the call before the scheduler runs it.
//! lifetime.unsubscribe();
//! assert_eq!(scheduler.pending(), 0);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SubscriptionLike`] | Anything that can be released, at most once |
//! | [`Disposer`] | Container a subscription can be attached to with `dispose_with` |
//! | [`RefCountSubscription`] | Releases its subscription once every token is gone |
//! | [`ScheduledSubscription`] | Releases on a scheduler instead of the caller's thread |
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): `futures` executors as execution contexts
//! - **`tokio-scheduler`**: `TokioScheduler`, a tokio runtime as scheduler that
//!   refuses work once the runtime shut down
//!
//! [`SubscriptionLike`]: subscription::SubscriptionLike
//! [`Disposer`]: subscription::Disposer
//! [`RefCountSubscription`]: subscription::RefCountSubscription
//! [`ScheduledSubscription`]: subscription::ScheduledSubscription
pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod rc;
pub mod scheduler;
pub mod subject;
pub mod subscription;
pub mod type_hint;

pub use prelude::*;
