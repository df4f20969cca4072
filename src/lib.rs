//! Vow: a Promise/A+ style deferred value for single-threaded hosts
//!
//! Vow is a small deferred-value primitive: a container for a value or
//! failure that is not yet known, observed by attaching continuations that
//! fire exactly once, in registration order, and always asynchronously.
//! Chaining composes into new deferred values, nested promises are adopted,
//! and foreign thenables are assimilated through an explicit trait probe
//! rather than duck typing.
//!
//! # Features
//!
//! - **Exactly-once settlement**: monotonic pending → fulfilled/rejected
//!   state machine with idempotent settlement capabilities
//! - **Injected scheduling**: the only environmental dependency is a
//!   [`Schedule`] implementation, so tests drive everything deterministically
//! - **Full chaining surface**: `then`/`and_then`/`catch`/`finally`, plus
//!   `resolve`/`reject`/`all`/`race` combinators
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use vow::{Promise, SchedulerHandle, Step, TaskQueue};
//!
//! let queue = Rc::new(TaskQueue::new());
//! let sched: SchedulerHandle = queue.clone();
//!
//! let greeting = Promise::<String, vow::Error>::resolve(&sched, Step::Value("hello".into()))
//!     .and_then(|s| Ok(Step::Value(s.to_uppercase())));
//!
//! queue.run_to_completion();
//! assert_eq!(greeting.value().as_deref(), Some("HELLO"));
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Core** | [`promise`], [`error`](Error) |
//! | **Scheduling** | [`scheduler`] |
//! | **Convenience** | [`prelude`] |
// Clippy configuration for the vow promise core.
//
// - type_complexity: reaction queues and capability plumbing pass nested
//   boxed closure types
#![allow(clippy::type_complexity)]

pub mod prelude;
pub mod promise;
pub mod scheduler;

mod error;

pub use error::{Error, Result};
pub use promise::{Promise, Resolvers, State, Step, StepResult, Thenable};
pub use scheduler::{Schedule, SchedulerHandle, Task, TaskQueue, TaskQueueStats};

/// Vow version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
