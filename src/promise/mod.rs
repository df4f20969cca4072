//! Promise core
//!
//! This module provides a Promise/A+ style deferred value: a
//! single-assignment container settled through a resolution procedure that
//! adopts nested promises and assimilates foreign thenables, observed
//! through `then`/`catch`/`finally` continuations that always run on a
//! scheduler turn, never inside the call that settles the promise.
//!
//! The model is single-threaded by design: promises are `Rc`-shared cells
//! and the only suspension points are hand-offs to the injected
//! [`Schedule`](crate::scheduler::Schedule) implementation.

mod combinators;

use crate::error::Error;
use crate::scheduler::SchedulerHandle;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// Settlement state of a promise.
///
/// `Pending` is the only state with an outgoing transition; `Fulfilled` and
/// `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not yet settled.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a reason.
    Rejected,
}

/// A value produced for a promise: the "x" handed to the resolution
/// procedure by a resolver or a continuation.
pub enum Step<T, E> {
    /// A plain value; fulfills the target directly.
    Value(T),
    /// A nested promise; the target adopts its eventual outcome.
    Chain(Promise<T, E>),
    /// A foreign object speaking the two-capability protocol; assimilated
    /// as if it were a promise.
    Thenable(Box<dyn Thenable<T, E>>),
}

/// What a continuation returns: a produced value, or a raised reason.
pub type StepResult<T, E> = std::result::Result<Step<T, E>, E>;

/// The protocol a foreign deferred value speaks.
///
/// The resolution procedure probes for this capability explicitly: a value
/// wrapped in [`Step::Thenable`] is assimilated, anything else is a plain
/// value. `then` receives a fresh one-shot capability pair; the first of
/// resolve/reject to fire wins and later calls are ignored. Returning `Err`
/// models the thenable itself raising: it rejects the target unless a
/// capability already fired, in which case it is discarded.
pub trait Thenable<T, E> {
    /// Hand the eventual outcome to the capability pair.
    fn then(self: Box<Self>, resolvers: Resolvers<T, E>) -> std::result::Result<(), E>;
}

struct Inner<T, E> {
    state: State,
    value: Option<T>,
    reason: Option<E>,
    on_fulfilled: Vec<Box<dyn FnOnce(T)>>,
    on_rejected: Vec<Box<dyn FnOnce(E)>>,
}

impl<T, E> Inner<T, E> {
    fn new() -> Self {
        Self {
            state: State::Pending,
            value: None,
            reason: None,
            on_fulfilled: Vec::new(),
            on_rejected: Vec::new(),
        }
    }
}

/// A deferred value: fulfilled with a `T` or rejected with an `E`, exactly
/// once.
///
/// Cloning a `Promise` clones the handle, not the cell; all clones observe
/// the same settlement. `E: From<Error>` lets the resolution procedure
/// report its own failures (self-resolution) through the caller's reason
/// type.
pub struct Promise<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
    sched: SchedulerHandle,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            sched: self.sched.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T, E> Promise<T, E> {
    pub(crate) fn pending(sched: &SchedulerHandle) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::new())),
            sched: sched.clone(),
        }
    }

    /// Current settlement state.
    pub fn state(&self) -> State {
        self.inner.borrow().state
    }

    /// Whether the promise has not settled yet.
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Construct a promise and run `setup` with its settlement capabilities.
    ///
    /// `setup` runs synchronously. If it returns `Err` before either
    /// capability fired, the promise is rejected with that reason; an error
    /// after settlement is ignored.
    pub fn new<F>(sched: &SchedulerHandle, setup: F) -> Self
    where
        F: FnOnce(Resolvers<T, E>) -> std::result::Result<(), E>,
    {
        let (promise, resolvers) = Self::with_resolvers(sched);
        let fallback = resolvers.clone();
        if let Err(reason) = setup(resolvers) {
            fallback.reject(reason);
        }
        promise
    }

    /// Construct a pending promise together with its externally driven
    /// settlement capabilities.
    pub fn with_resolvers(sched: &SchedulerHandle) -> (Self, Resolvers<T, E>) {
        let promise = Self::pending(sched);
        let resolvers = Resolvers {
            promise: promise.clone(),
            called: Rc::new(Cell::new(false)),
        };
        (promise, resolvers)
    }

    /// Snapshot of the fulfillment value, if fulfilled.
    pub fn value(&self) -> Option<T> {
        self.inner.borrow().value.clone()
    }

    /// Snapshot of the rejection reason, if rejected.
    pub fn reason(&self) -> Option<E> {
        self.inner.borrow().reason.clone()
    }

    /// Chain a pair of continuations onto this promise.
    ///
    /// Returns a derived promise settled by whichever continuation runs:
    /// its `Ok` step goes through the resolution procedure, its `Err`
    /// rejects. Continuations always run on a scheduler turn, even when the
    /// receiver is already settled at call time.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> StepResult<U, E> + 'static,
        R: FnOnce(E) -> StepResult<U, E> + 'static,
    {
        let derived = Promise::<U, E>::pending(&self.sched);

        let fulfill_reaction: Box<dyn FnOnce(T)> = {
            let derived = derived.clone();
            let sched = self.sched.clone();
            Box::new(move |value: T| {
                sched.schedule(Box::new(move || match on_fulfilled(value) {
                    Ok(step) => derived.resolve_step(step),
                    Err(reason) => derived.settle_rejected(reason),
                }));
            })
        };

        let reject_reaction: Box<dyn FnOnce(E)> = {
            let derived = derived.clone();
            let sched = self.sched.clone();
            Box::new(move |reason: E| {
                sched.schedule(Box::new(move || match on_rejected(reason) {
                    Ok(step) => derived.resolve_step(step),
                    Err(reason) => derived.settle_rejected(reason),
                }));
            })
        };

        self.subscribe(fulfill_reaction, reject_reaction);
        derived
    }

    /// Chain a fulfillment continuation; a rejection passes through
    /// unchanged.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> StepResult<U, E> + 'static,
    {
        self.then(on_fulfilled, |reason| Err(reason))
    }

    /// Chain a rejection continuation; a fulfillment passes through
    /// unchanged.
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T, E>
    where
        R: FnOnce(E) -> StepResult<T, E> + 'static,
    {
        self.then(|value| Ok(Step::Value(value)), on_rejected)
    }

    /// Run `on_finally` once the promise settles, on either path, then pass
    /// the original outcome through.
    ///
    /// The outcome is only overridden when `on_finally` fails, or returns a
    /// step that fails; its success value is discarded.
    pub fn finally<F>(&self, on_finally: F) -> Promise<T, E>
    where
        F: FnOnce() -> StepResult<(), E> + 'static,
    {
        let derived = Promise::<T, E>::pending(&self.sched);
        // Only one of the two reactions ever runs; the hook is shared so
        // whichever fires can take ownership of the callback.
        let hook = Rc::new(RefCell::new(Some(on_finally)));

        let fulfill_reaction: Box<dyn FnOnce(T)> = {
            let derived = derived.clone();
            let hook = hook.clone();
            let sched = self.sched.clone();
            Box::new(move |value: T| {
                let inner_sched = sched.clone();
                sched.schedule(Box::new(move || {
                    let Some(on_finally) = hook.borrow_mut().take() else {
                        return;
                    };
                    match on_finally() {
                        Ok(step) => {
                            let gate = Promise::<(), E>::resolve(&inner_sched, step);
                            let pass = derived.clone();
                            let fail = derived.clone();
                            gate.subscribe(
                                Box::new(move |_| pass.settle_fulfilled(value)),
                                Box::new(move |reason| fail.settle_rejected(reason)),
                            );
                        }
                        Err(reason) => derived.settle_rejected(reason),
                    }
                }));
            })
        };

        let reject_reaction: Box<dyn FnOnce(E)> = {
            let derived = derived.clone();
            let hook = hook.clone();
            let sched = self.sched.clone();
            Box::new(move |original: E| {
                let inner_sched = sched.clone();
                sched.schedule(Box::new(move || {
                    let Some(on_finally) = hook.borrow_mut().take() else {
                        return;
                    };
                    match on_finally() {
                        Ok(step) => {
                            let gate = Promise::<(), E>::resolve(&inner_sched, step);
                            let pass = derived.clone();
                            let fail = derived.clone();
                            gate.subscribe(
                                Box::new(move |_| pass.settle_rejected(original)),
                                Box::new(move |reason| fail.settle_rejected(reason)),
                            );
                        }
                        Err(reason) => derived.settle_rejected(reason),
                    }
                }));
            })
        };

        self.subscribe(fulfill_reaction, reject_reaction);
        derived
    }

    /// The resolution procedure: settle this promise from a produced step.
    ///
    /// Self-resolution terminates here unconditionally; adoption and
    /// assimilation recurse through the same procedure until a plain value
    /// or a rejection comes out.
    pub(crate) fn resolve_step(&self, step: Step<T, E>) {
        match step {
            Step::Chain(chained) => {
                if Rc::ptr_eq(&chained.inner, &self.inner) {
                    debug!("rejecting self-resolution");
                    self.settle_rejected(E::from(Error::SelfResolution));
                    return;
                }
                trace!("adopting chained promise");
                let adopt_value = self.clone();
                let adopt_reason = self.clone();
                chained.subscribe(
                    Box::new(move |value| adopt_value.settle_fulfilled(value)),
                    Box::new(move |reason| adopt_reason.settle_rejected(reason)),
                );
            }
            Step::Thenable(thenable) => {
                trace!("assimilating thenable");
                let resolvers = Resolvers {
                    promise: self.clone(),
                    called: Rc::new(Cell::new(false)),
                };
                let called = resolvers.called.clone();
                if let Err(reason) = thenable.then(resolvers) {
                    if called.replace(true) {
                        // The outcome already committed; a late raise from
                        // the thenable is discarded.
                        debug!("discarding thenable error after commitment");
                    } else {
                        self.settle_rejected(reason);
                    }
                }
            }
            Step::Value(value) => self.settle_fulfilled(value),
        }
    }

    /// Register internal settlement callbacks, invoking immediately if the
    /// promise is already settled. Continuation scheduling is the caller's
    /// responsibility.
    pub(crate) fn subscribe(
        &self,
        on_fulfilled: Box<dyn FnOnce(T)>,
        on_rejected: Box<dyn FnOnce(E)>,
    ) {
        let mut inner = self.inner.borrow_mut();
        match inner.state {
            State::Pending => {
                inner.on_fulfilled.push(on_fulfilled);
                inner.on_rejected.push(on_rejected);
            }
            State::Fulfilled => {
                let value = inner.value.clone();
                drop(inner);
                if let Some(value) = value {
                    on_fulfilled(value);
                }
            }
            State::Rejected => {
                let reason = inner.reason.clone();
                drop(inner);
                if let Some(reason) = reason {
                    on_rejected(reason);
                }
            }
        }
    }

    /// Transition to `Fulfilled` and drain the fulfillment queue in
    /// registration order. No-op on a settled promise.
    pub(crate) fn settle_fulfilled(&self, value: T) {
        let mut inner = self.inner.borrow_mut();
        if inner.state != State::Pending {
            debug!("ignoring fulfillment of an already-settled promise");
            return;
        }
        inner.state = State::Fulfilled;
        inner.value = Some(value.clone());
        let reactions = std::mem::take(&mut inner.on_fulfilled);
        inner.on_rejected.clear();
        drop(inner);

        trace!(reactions = reactions.len(), "promise fulfilled");
        for reaction in reactions {
            reaction(value.clone());
        }
    }

    /// Transition to `Rejected` and drain the rejection queue in
    /// registration order. No-op on a settled promise.
    pub(crate) fn settle_rejected(&self, reason: E) {
        let mut inner = self.inner.borrow_mut();
        if inner.state != State::Pending {
            debug!("ignoring rejection of an already-settled promise");
            return;
        }
        inner.state = State::Rejected;
        inner.reason = Some(reason.clone());
        let reactions = std::mem::take(&mut inner.on_rejected);
        inner.on_fulfilled.clear();
        drop(inner);

        trace!(reactions = reactions.len(), "promise rejected");
        for reaction in reactions {
            reaction(reason.clone());
        }
    }
}

/// One-shot settlement capabilities for a promise.
///
/// The pair shares a single `called` flag: the first `resolve`/`reject` to
/// fire wins and every later call of either is ignored. The same type backs
/// the constructor capabilities and the pair handed to a
/// [`Thenable`] during assimilation.
pub struct Resolvers<T, E> {
    promise: Promise<T, E>,
    called: Rc<Cell<bool>>,
}

impl<T, E> Clone for Resolvers<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            called: self.called.clone(),
        }
    }
}

impl<T, E> Resolvers<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Run the resolution procedure on the produced step.
    pub fn resolve(&self, step: Step<T, E>) {
        if self.called.replace(true) {
            debug!("ignoring resolve on a spent capability");
            return;
        }
        self.promise.resolve_step(step);
    }

    /// Fulfill with a plain value. Shorthand for resolving a
    /// [`Step::Value`].
    pub fn fulfill(&self, value: T) {
        self.resolve(Step::Value(value));
    }

    /// Reject with a reason. Rejections are never unwrapped or assimilated.
    pub fn reject(&self, reason: E) {
        if self.called.replace(true) {
            debug!("ignoring reject on a spent capability");
            return;
        }
        self.promise.settle_rejected(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TaskQueue;
    use pretty_assertions::assert_eq;

    fn queue() -> (Rc<TaskQueue>, SchedulerHandle) {
        let queue = Rc::new(TaskQueue::new());
        let handle: SchedulerHandle = queue.clone();
        (queue, handle)
    }

    #[test]
    fn test_promise_lifecycle() {
        let (_, sched) = queue();
        let (promise, resolvers) = Promise::<i32, Error>::with_resolvers(&sched);
        assert_eq!(promise.state(), State::Pending);

        resolvers.fulfill(42);
        assert_eq!(promise.state(), State::Fulfilled);
        assert_eq!(promise.value(), Some(42));
        assert_eq!(promise.reason(), None);
    }

    #[test]
    fn test_settlement_is_exactly_once() {
        let (_, sched) = queue();
        let (promise, resolvers) = Promise::<i32, Error>::with_resolvers(&sched);

        resolvers.fulfill(1);
        resolvers.fulfill(2);
        resolvers.reject(Error::SelfResolution);

        assert_eq!(promise.state(), State::Fulfilled);
        assert_eq!(promise.value(), Some(1));
    }

    #[test]
    fn test_setup_error_rejects() {
        let (_, sched) = queue();
        let promise = Promise::<i32, Error>::new(&sched, |_| Err(Error::SelfResolution));
        assert_eq!(promise.state(), State::Rejected);
        assert_eq!(promise.reason(), Some(Error::SelfResolution));
    }

    #[test]
    fn test_setup_error_after_settlement_is_ignored() {
        let (_, sched) = queue();
        let promise = Promise::<i32, Error>::new(&sched, |resolvers| {
            resolvers.fulfill(7);
            Err(Error::SelfResolution)
        });
        assert_eq!(promise.state(), State::Fulfilled);
        assert_eq!(promise.value(), Some(7));
    }

    #[test]
    fn test_self_resolution_rejects() {
        let (_, sched) = queue();
        let (promise, resolvers) = Promise::<i32, Error>::with_resolvers(&sched);

        resolvers.resolve(Step::Chain(promise.clone()));

        assert_eq!(promise.state(), State::Rejected);
        assert_eq!(promise.reason(), Some(Error::SelfResolution));
    }

    #[test]
    fn test_then_is_never_synchronous() {
        let (queue, sched) = queue();
        let (promise, resolvers) = Promise::<i32, Error>::with_resolvers(&sched);
        resolvers.fulfill(1);

        let observed = Rc::new(Cell::new(false));
        let flag = observed.clone();
        let derived = promise.and_then(move |v| {
            flag.set(true);
            Ok(Step::Value(v + 1))
        });

        // Receiver was already settled, yet nothing may run before a turn.
        assert!(!observed.get());
        assert!(derived.is_pending());

        queue.run_to_completion();
        assert!(observed.get());
        assert_eq!(derived.value(), Some(2));
    }

    #[test]
    fn test_reactions_fire_in_registration_order() {
        let (queue, sched) = queue();
        let (promise, resolvers) = Promise::<i32, Error>::with_resolvers(&sched);

        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let log = log.clone();
            promise.and_then(move |_| {
                log.borrow_mut().push(tag);
                Ok(Step::Value(()))
            });
        }

        resolvers.fulfill(0);
        queue.run_to_completion();
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_continuation_error_rejects_derived() {
        let (queue, sched) = queue();
        let (promise, resolvers) = Promise::<i32, Error>::with_resolvers(&sched);
        resolvers.fulfill(1);

        let derived = promise.and_then(|_| -> StepResult<i32, Error> {
            Err(Error::SelfResolution)
        });

        queue.run_to_completion();
        assert_eq!(derived.state(), State::Rejected);
        assert_eq!(derived.reason(), Some(Error::SelfResolution));
    }

    #[test]
    fn test_adoption_of_chained_promise() {
        let (queue, sched) = queue();
        let (outer, outer_resolvers) = Promise::<i32, Error>::with_resolvers(&sched);
        let (inner, inner_resolvers) = Promise::<i32, Error>::with_resolvers(&sched);

        outer_resolvers.resolve(Step::Chain(inner));
        assert!(outer.is_pending());

        inner_resolvers.fulfill(9);
        queue.run_to_completion();
        assert_eq!(outer.value(), Some(9));
    }

    #[test]
    fn test_debug_format_exposes_state() {
        let (_, sched) = queue();
        let (promise, _resolvers) = Promise::<i32, Error>::with_resolvers(&sched);
        assert!(format!("{promise:?}").contains("Pending"));
    }
}
