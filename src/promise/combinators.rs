//! Static constructors and aggregate combinators.

use super::{Promise, Step};
use crate::error::Error;
use crate::scheduler::SchedulerHandle;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::trace;

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Normalize a step into a promise.
    ///
    /// A [`Step::Chain`] is returned as-is, without wrapping; anything else
    /// settles a fresh promise through the resolution procedure.
    pub fn resolve(sched: &SchedulerHandle, step: Step<T, E>) -> Self {
        if let Step::Chain(promise) = step {
            return promise;
        }
        let promise = Self::pending(sched);
        promise.resolve_step(step);
        promise
    }

    /// An immediately rejected promise. The reason is stored verbatim,
    /// never assimilated.
    pub fn reject(sched: &SchedulerHandle, reason: E) -> Self {
        let promise = Self::pending(sched);
        promise.settle_rejected(reason);
        promise
    }

    /// Wait for every input.
    ///
    /// Fulfills with one result per input, in input order regardless of
    /// completion order, once every normalized input has fulfilled. Rejects
    /// with the first failure observed; later outcomes no longer affect the
    /// result. An empty input fulfills immediately with an empty `Vec`.
    pub fn all(sched: &SchedulerHandle, steps: Vec<Step<T, E>>) -> Promise<Vec<T>, E> {
        let result = Promise::<Vec<T>, E>::pending(sched);
        if steps.is_empty() {
            result.settle_fulfilled(Vec::new());
            return result;
        }

        let total = steps.len();
        trace!(total, "waiting on all inputs");
        let slots: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; total]));
        let remaining = Rc::new(Cell::new(total));

        for (index, step) in steps.into_iter().enumerate() {
            let input = Promise::resolve(sched, step);

            let fulfill = {
                let result = result.clone();
                let slots = slots.clone();
                let remaining = remaining.clone();
                Box::new(move |value: T| {
                    slots.borrow_mut()[index] = Some(value);
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let values: Vec<T> = slots.borrow_mut().drain(..).flatten().collect();
                        result.settle_fulfilled(values);
                    }
                })
            };
            let reject = {
                let result = result.clone();
                Box::new(move |reason: E| result.settle_rejected(reason))
            };
            input.subscribe(fulfill, reject);
        }

        result
    }

    /// Settle with the first input to settle, success or failure alike.
    ///
    /// An empty input produces a promise that never settles.
    pub fn race(sched: &SchedulerHandle, steps: Vec<Step<T, E>>) -> Self {
        let result = Self::pending(sched);

        for step in steps {
            let input = Promise::resolve(sched, step);
            let fulfill = {
                let result = result.clone();
                Box::new(move |value: T| result.settle_fulfilled(value))
            };
            let reject = {
                let result = result.clone();
                Box::new(move |reason: E| result.settle_rejected(reason))
            };
            input.subscribe(fulfill, reject);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::State;
    use crate::scheduler::TaskQueue;
    use pretty_assertions::assert_eq;

    fn queue() -> (Rc<TaskQueue>, SchedulerHandle) {
        let queue = Rc::new(TaskQueue::new());
        let handle: SchedulerHandle = queue.clone();
        (queue, handle)
    }

    #[test]
    fn test_resolve_short_circuits_existing_promise() {
        let (_, sched) = queue();
        let original = Promise::<i32, Error>::resolve(&sched, Step::Value(1));
        let wrapped = Promise::resolve(&sched, Step::Chain(original.clone()));
        assert!(Rc::ptr_eq(&original.inner, &wrapped.inner));
    }

    #[test]
    fn test_reject_is_immediate() {
        let (_, sched) = queue();
        let promise = Promise::<i32, Error>::reject(&sched, Error::SelfResolution);
        assert_eq!(promise.state(), State::Rejected);
        assert_eq!(promise.reason(), Some(Error::SelfResolution));
    }

    #[test]
    fn test_all_empty_fulfills_immediately() {
        let (_, sched) = queue();
        let result = Promise::<i32, Error>::all(&sched, Vec::new());
        assert_eq!(result.value(), Some(Vec::new()));
    }

    #[test]
    fn test_all_rejects_with_first_failure() {
        let (queue, sched) = queue();
        let result = Promise::all(
            &sched,
            vec![
                Step::Value(1),
                Step::Chain(Promise::reject(&sched, Error::SelfResolution)),
                Step::Value(3),
            ],
        );
        queue.run_to_completion();
        assert_eq!(result.state(), State::Rejected);
        assert_eq!(result.reason(), Some(Error::SelfResolution));
    }

    #[test]
    fn test_race_empty_never_settles() {
        let (queue, sched) = queue();
        let result = Promise::<i32, Error>::race(&sched, Vec::new());
        queue.run_to_completion();
        assert!(result.is_pending());
    }

    #[test]
    fn test_race_first_settlement_wins() {
        let (_, sched) = queue();
        let (slow, _slow_resolvers) = Promise::<i32, Error>::with_resolvers(&sched);
        let result = Promise::race(&sched, vec![Step::Chain(slow), Step::Value(5)]);
        assert_eq!(result.value(), Some(5));
    }
}
