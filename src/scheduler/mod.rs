//! Task scheduling
//!
//! The promise core never runs a continuation inside the call that settles a
//! promise; it hands the continuation to an externally supplied scheduler and
//! lets the host decide when the next turn happens. [`Schedule`] is that
//! single environmental dependency, and [`TaskQueue`] is the crate's own
//! FIFO implementation of it, suitable both for production embedding and as
//! a deterministic driver in tests.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::trace;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

/// Shared handle to a scheduler. Promises clone this handle into every
/// derived promise they create.
pub type SchedulerHandle = Rc<dyn Schedule>;

/// The host's asynchronous callback facility.
///
/// Implementations must preserve FIFO order: tasks run in the order they
/// were scheduled, relative to every other task on the same scheduler.
pub trait Schedule {
    /// Defer `task` to a later turn.
    fn schedule(&self, task: Task);
}

/// Default number of tasks drained per pass before stats are cut over.
const DEFAULT_BUDGET: usize = 10_000;

/// Runtime statistics for a [`TaskQueue`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskQueueStats {
    /// Total tasks dequeued and run.
    pub total_tasks: u64,
    /// Maximum tasks run in a single drain pass.
    pub max_tasks_per_pass: u64,
    /// Number of drain passes completed by `run_to_completion`.
    pub total_passes: u64,
}

/// A single-threaded FIFO task queue.
///
/// Tasks scheduled while the queue is draining land at the back and run in
/// the same drain, after everything scheduled before them.
pub struct TaskQueue {
    queue: RefCell<VecDeque<Task>>,
    /// Maximum tasks per drain pass (starvation accounting).
    budget: Cell<usize>,
    stats: RefCell<TaskQueueStats>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            budget: Cell::new(DEFAULT_BUDGET),
            stats: RefCell::new(TaskQueueStats::default()),
        }
    }

    /// Number of tasks currently waiting.
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Whether any task is waiting to run.
    pub fn has_pending(&self) -> bool {
        !self.is_empty()
    }

    /// Pop and run the next task. Returns `false` if the queue was empty.
    pub fn run_next(&self) -> bool {
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                self.stats.borrow_mut().total_tasks += 1;
                true
            }
            None => false,
        }
    }

    /// Drain the queue in FIFO order until no task remains, including tasks
    /// scheduled while draining. Returns the number of tasks run.
    ///
    /// Each pass runs at most the configured budget of tasks; a queue that
    /// keeps rescheduling itself rolls over into further passes rather than
    /// distorting the per-pass statistics.
    pub fn run_to_completion(&self) -> usize {
        let mut processed = 0usize;

        loop {
            let mut pass = 0usize;
            while pass < self.budget.get() {
                if !self.run_next() {
                    break;
                }
                pass += 1;
            }

            {
                let mut stats = self.stats.borrow_mut();
                stats.total_passes += 1;
                if pass as u64 > stats.max_tasks_per_pass {
                    stats.max_tasks_per_pass = pass as u64;
                }
            }

            processed += pass;
            if !self.has_pending() {
                break;
            }
        }

        trace!(processed, "task queue drained");
        processed
    }

    /// Set the maximum number of tasks per drain pass.
    pub fn set_budget(&self, limit: usize) {
        self.budget.set(limit.max(1));
    }

    /// The current per-pass budget.
    pub fn budget(&self) -> usize {
        self.budget.get()
    }

    /// Snapshot of the queue's statistics.
    pub fn stats(&self) -> TaskQueueStats {
        self.stats.borrow().clone()
    }

    /// Reset all statistics to zero.
    pub fn reset_stats(&self) {
        *self.stats.borrow_mut() = TaskQueueStats::default();
    }
}

impl Schedule for TaskQueue {
    fn schedule(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
        trace!(pending = self.len(), "task scheduled");
    }
}
