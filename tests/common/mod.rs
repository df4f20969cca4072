//! Shared test helpers for integration tests

use std::rc::Rc;
use vow::{SchedulerHandle, TaskQueue};

/// Rejection reason used across the integration suites.
///
/// `From<vow::Error>` lets the resolution procedure surface circular
/// resolution through the same type user code rejects with.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Reason {
    Internal(vow::Error),
    Msg(&'static str),
}

impl From<vow::Error> for Reason {
    fn from(error: vow::Error) -> Self {
        Reason::Internal(error)
    }
}

/// A deterministic task queue plus the handle promises hold onto.
pub fn queue() -> (Rc<TaskQueue>, SchedulerHandle) {
    let queue = Rc::new(TaskQueue::new());
    let handle: SchedulerHandle = queue.clone();
    (queue, handle)
}
