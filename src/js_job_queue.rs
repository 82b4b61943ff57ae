//! # Job Queue
//!
//! FIFO queue of deferred work owned by a realm. The host drains it between
//! synchronous executions; every promise reaction, thenable adoption and
//! host-queued callback runs from here, one job at a time and never
//! interleaved with another.
//!
//! The queue also owns the end-of-drain checkpoint that reports rejected
//! promises nobody attached a handler to.

use crate::core::{
    Collect, Gc, JSPromisePtr, MutationContext, PromiseReaction, RealmPtr, Value, value_to_string,
};
use crate::error::JSError;
use crate::js_function::call_function;

#[derive(Clone, Collect)]
#[collect(no_drop)]
pub enum Job<'gc> {
    /// Run one reaction against the settlement value of its promise.
    Reaction {
        reaction: PromiseReaction<'gc>,
        argument: Value<'gc>,
    },
    /// Call `then_fn` on a thenable with fresh resolving functions for `promise`.
    ResolveThenable {
        promise: JSPromisePtr<'gc>,
        thenable: Value<'gc>,
        then_fn: Value<'gc>,
    },
    /// Host-queued callback, `queueMicrotask` style.
    Callback { callback: Value<'gc>, args: Vec<Value<'gc>> },
}

impl<'gc> Job<'gc> {
    fn summary(&self) -> String {
        match self {
            Job::Reaction { reaction, argument } => format!(
                "Reaction(kind={:?}, handler={}, capability={}, argument={})",
                reaction.kind,
                reaction.handler.is_some(),
                reaction.capability.map(|p| p.borrow().id).unwrap_or(0),
                value_to_string(argument)
            ),
            Job::ResolveThenable { promise, .. } => format!("ResolveThenable(promise id={})", promise.borrow().id),
            Job::Callback { callback, args } => format!("Callback({}, args_len={})", value_to_string(callback), args.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    Executed,
    Empty,
}

pub fn enqueue_job<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, job: Job<'gc>) {
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("enqueue_job: {} ; queue_len={}", job.summary(), pending_job_count(realm) + 1);
    }
    realm.borrow_mut(mc).jobs.push_back(job);
}

/// Append a call of `callback(...args)` to the queue.
pub fn queue_microtask<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, callback: Value<'gc>, args: Vec<Value<'gc>>) {
    enqueue_job(mc, realm, Job::Callback { callback, args });
}

pub fn pending_job_count(realm: &RealmPtr<'_>) -> usize {
    realm.borrow().jobs.len()
}

fn process_job<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, job: Job<'gc>) {
    if log::log_enabled!(log::Level::Trace) {
        log::trace!("process_job: executing {}", job.summary());
    }
    match job {
        Job::Reaction { reaction, argument } => crate::js_promise::promise_reaction_job(mc, realm, reaction, argument),
        Job::ResolveThenable {
            promise,
            thenable,
            then_fn,
        } => crate::js_promise::promise_resolve_thenable_job(mc, realm, &promise, thenable, then_fn),
        Job::Callback { callback, args } => {
            if let Err(e) = call_function(mc, realm, &callback, &Value::Undefined, &args) {
                log::warn!("Uncaught exception in queued callback: {}", e.message());
            }
        }
    }
}

/// Run the oldest queued job, if any.
pub fn poll_jobs<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>) -> PollResult {
    let job = realm.borrow_mut(mc).jobs.pop_front();
    match job {
        Some(job) => {
            process_job(mc, realm, job);
            PollResult::Executed
        }
        None => PollResult::Empty,
    }
}

/// Drain the queue, including jobs enqueued while draining, then run the
/// unhandled-rejection checkpoint. A call made while a drain is already in
/// progress returns `Ok(0)` without running anything.
pub fn run_jobs<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>) -> Result<usize, JSError> {
    if realm.borrow().draining {
        log::trace!("run_jobs: drain already in progress, ignoring nested call");
        return Ok(0);
    }
    realm.borrow_mut(mc).draining = true;
    let limit = realm.borrow().config.max_jobs_per_drain;

    let mut executed = 0usize;
    let outcome = loop {
        if let Some(limit) = limit
            && executed >= limit
            && pending_job_count(realm) > 0
        {
            log::warn!("run_jobs: stopping after {} jobs with {} still queued", executed, pending_job_count(realm));
            break Err(JSError::InfiniteLoopError { iterations: executed });
        }
        match poll_jobs(mc, realm) {
            PollResult::Executed => executed += 1,
            PollResult::Empty => break Ok(executed),
        }
    };

    realm.borrow_mut(mc).draining = false;
    log::debug!("run_jobs: executed {} jobs", executed);
    if outcome.is_ok() {
        process_rejection_checkpoint(mc, realm);
    }
    outcome
}

/// A promise was rejected while no handler was attached.
pub(crate) fn track_rejection<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, promise: &JSPromisePtr<'gc>) {
    let mut r = realm.borrow_mut(mc);
    if !r.config.track_unhandled_rejections {
        return;
    }
    log::debug!("track_rejection: promise id={} rejected without handler", promise.borrow().id);
    r.rejections.candidates.push(*promise);
}

/// The first handler was attached to an already rejected promise.
pub(crate) fn track_handled<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, promise: &JSPromisePtr<'gc>) {
    let was_reported = {
        let mut r = realm.borrow_mut(mc);
        r.rejections.candidates.retain(|p| !Gc::ptr_eq(*p, *promise));
        let before = r.rejections.reported.len();
        r.rejections
            .reported
            .retain(|w| !w.upgrade(mc).is_some_and(|p| Gc::ptr_eq(p, *promise)));
        before != r.rejections.reported.len()
    };
    if was_reported {
        let hooks = realm.borrow().hooks.clone();
        hooks.rejection_handled(mc, *promise);
    }
}

/// Report every candidate that is still unhandled, exactly once.
fn process_rejection_checkpoint<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>) {
    let candidates = {
        let mut r = realm.borrow_mut(mc);
        r.rejections.reported.retain(|w| w.upgrade(mc).is_some());
        std::mem::take(&mut r.rejections.candidates)
    };
    if candidates.is_empty() {
        return;
    }
    let hooks = realm.borrow().hooks.clone();
    for promise in candidates {
        let (handled, reason) = {
            let p = promise.borrow();
            (p.handled, p.result())
        };
        if handled {
            continue;
        }
        log::debug!("process_rejection_checkpoint: reporting promise id={}", promise.borrow().id);
        {
            let mut r = realm.borrow_mut(mc);
            r.rejections.reported.push(Gc::downgrade(promise));
            r.rejections.unhandled.push(value_to_string(&reason));
        }
        hooks.unhandled_rejection(mc, promise, &reason);
    }
}
