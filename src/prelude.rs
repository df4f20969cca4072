//! Prelude module for convenient imports
//!
//! Re-exports the types needed for everyday use of the crate:
//!
//! ```
//! use vow::prelude::*;
//! use std::rc::Rc;
//!
//! let queue = Rc::new(TaskQueue::new());
//! let sched: SchedulerHandle = queue.clone();
//! let p = Promise::<i32, Error>::resolve(&sched, Step::Value(1));
//! assert_eq!(p.state(), State::Fulfilled);
//! ```

// Promise core
pub use crate::promise::{Promise, Resolvers, State, Step, StepResult, Thenable};

// Scheduling
pub use crate::scheduler::{Schedule, SchedulerHandle, Task, TaskQueue, TaskQueueStats};

// Error handling
pub use crate::error::{Error, Result};

// Version constant
pub use crate::VERSION;
