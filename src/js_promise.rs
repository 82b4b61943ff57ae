//! # JavaScript Promise Implementation
//!
//! This module implements the Promise state machine and everything that
//! drives it:
//! - construction with an executor and the one-shot resolve/reject pair
//! - settlement (`fulfill_promise` / `reject_promise`) and reaction scheduling
//! - the resolution procedure, including thenable adoption and the
//!   self-resolution guard
//! - instance methods `then()`, `catch()`, `finally()`
//! - static `resolve()`, `reject()`, `withResolvers()`, `try()`
//!
//! The combinators (`all`, `allSettled`, `any`, `race`) live in
//! [`crate::js_promise_combinators`]; the queue the reactions run on lives in
//! [`crate::js_job_queue`].
//!
//! Handlers never run synchronously. Settling a promise moves its reactions
//! into the realm's job queue, and the host decides when to drain it.

use crate::core::{
    Collect, EvalError, GcPtr, Intrinsics, JSObjectDataPtr, JSPromise, JSPromisePtr, MutationContext, PromiseReaction,
    PromiseState, ReactionKind, RealmPtr, Value, create_error, eval_error_to_value, new_gc_cell_ptr, new_js_object_data,
    same_value, set_global, value_to_string,
};
use crate::js_function::{NativeFunction, call_function, new_native_function};
use crate::js_job_queue::{Job, enqueue_job, track_handled, track_rejection};
use crate::js_object::{create_object, get_property, object_set_key_value};
use crate::js_promise_combinators::{promise_all, promise_all_settled, promise_any, promise_race};
use crate::raise_type_error;

/// Builtin functions reachable from the `Promise` global and from
/// `Promise.prototype`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Collect)]
#[collect(require_static)]
pub enum PromiseBuiltin {
    Then,
    Catch,
    Finally,
    Resolve,
    Reject,
    All,
    AllSettled,
    Any,
    Race,
    WithResolvers,
    Try,
}

const STATIC_METHODS: &[(&str, PromiseBuiltin)] = &[
    ("resolve", PromiseBuiltin::Resolve),
    ("reject", PromiseBuiltin::Reject),
    ("all", PromiseBuiltin::All),
    ("allSettled", PromiseBuiltin::AllSettled),
    ("any", PromiseBuiltin::Any),
    ("race", PromiseBuiltin::Race),
    ("withResolvers", PromiseBuiltin::WithResolvers),
    ("try", PromiseBuiltin::Try),
];

const PROTOTYPE_METHODS: &[(&str, PromiseBuiltin)] = &[
    ("then", PromiseBuiltin::Then),
    ("catch", PromiseBuiltin::Catch),
    ("finally", PromiseBuiltin::Finally),
];

pub fn new_promise<'gc>(mc: &MutationContext<'gc>) -> JSPromisePtr<'gc> {
    new_gc_cell_ptr(mc, JSPromise::new())
}

/// A promise's resolve/reject pair. Both functions share one flag; after
/// either is called, every later call of either is ignored.
#[derive(Clone)]
pub struct ResolvingFunctions<'gc> {
    pub promise: JSPromisePtr<'gc>,
    pub resolve: Value<'gc>,
    pub reject: Value<'gc>,
    already_resolved: GcPtr<'gc, bool>,
}

impl<'gc> ResolvingFunctions<'gc> {
    pub fn resolve(&self, mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, resolution: Value<'gc>) {
        resolving_function_call(mc, realm, &self.promise, &self.already_resolved, ReactionKind::Fulfill, resolution);
    }

    pub fn reject(&self, mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, reason: Value<'gc>) {
        resolving_function_call(mc, realm, &self.promise, &self.already_resolved, ReactionKind::Reject, reason);
    }
}

pub fn create_resolving_functions<'gc>(mc: &MutationContext<'gc>, promise: JSPromisePtr<'gc>) -> ResolvingFunctions<'gc> {
    let already_resolved = new_gc_cell_ptr(mc, false);
    let resolve = new_native_function(
        mc,
        "resolve",
        NativeFunction::Resolving {
            promise,
            already_resolved,
            kind: ReactionKind::Fulfill,
        },
    );
    let reject = new_native_function(
        mc,
        "reject",
        NativeFunction::Resolving {
            promise,
            already_resolved,
            kind: ReactionKind::Reject,
        },
    );
    ResolvingFunctions {
        promise,
        resolve,
        reject,
        already_resolved,
    }
}

pub(crate) fn resolving_function_call<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    promise: &JSPromisePtr<'gc>,
    already_resolved: &GcPtr<'gc, bool>,
    kind: ReactionKind,
    value: Value<'gc>,
) {
    if *already_resolved.borrow() {
        log::trace!("resolving function ({:?}) for promise id={} ignored, already resolved", kind, promise.borrow().id);
        return;
    }
    *already_resolved.borrow_mut(mc) = true;
    match kind {
        ReactionKind::Fulfill => resolve_promise(mc, realm, promise, value),
        ReactionKind::Reject => reject_promise(mc, realm, promise, value),
    }
}

/// `new Promise(executor)`: the executor runs synchronously with the
/// promise's resolving functions. If it throws, the promise is rejected
/// with the thrown value unless the executor already resolved it.
pub fn construct_promise<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    executor: &Value<'gc>,
) -> Result<JSPromisePtr<'gc>, EvalError<'gc>> {
    if !executor.is_callable() {
        return Err(raise_type_error!("Promise resolver {} is not a function", value_to_string(executor)).into());
    }
    let promise = new_promise(mc);
    let resolving = create_resolving_functions(mc, promise);
    let args = [resolving.resolve.clone(), resolving.reject.clone()];
    if let Err(err) = call_function(mc, realm, executor, &Value::Undefined, &args) {
        log::trace!("construct_promise: executor threw: {}", err.message());
        let reason = eval_error_to_value(mc, err);
        resolving.reject(mc, realm, reason);
    }
    Ok(promise)
}

fn trigger_promise_reactions<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    reactions: Vec<PromiseReaction<'gc>>,
    argument: &Value<'gc>,
) {
    for reaction in reactions {
        enqueue_job(
            mc,
            realm,
            Job::Reaction {
                reaction,
                argument: argument.clone(),
            },
        );
    }
}

/// Transition a pending promise to fulfilled and schedule its fulfill
/// reactions. Settled promises are left untouched.
pub fn fulfill_promise<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, promise: &JSPromisePtr<'gc>, value: Value<'gc>) {
    let reactions = {
        let mut state = promise.borrow_mut(mc);
        if !state.is_pending() {
            log::trace!("fulfill_promise: promise id={} already settled, ignoring", state.id);
            return;
        }
        log::trace!("fulfill_promise: promise id={} value={:?}", state.id, value);
        state.state = PromiseState::Fulfilled(value.clone());
        state.reject_reactions.clear();
        std::mem::take(&mut state.fulfill_reactions)
    };
    trigger_promise_reactions(mc, realm, reactions, &value);
}

/// Transition a pending promise to rejected and schedule its reject
/// reactions. A rejection with no handler attached is handed to the
/// rejection tracker.
pub fn reject_promise<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, promise: &JSPromisePtr<'gc>, reason: Value<'gc>) {
    let (reactions, handled) = {
        let mut state = promise.borrow_mut(mc);
        if !state.is_pending() {
            log::trace!("reject_promise: promise id={} already settled, ignoring", state.id);
            return;
        }
        log::debug!("reject_promise: promise id={} reason={}", state.id, value_to_string(&reason));
        state.state = PromiseState::Rejected(reason.clone());
        state.fulfill_reactions.clear();
        (std::mem::take(&mut state.reject_reactions), state.handled)
    };
    if !handled {
        track_rejection(mc, realm, promise);
    }
    trigger_promise_reactions(mc, realm, reactions, &reason);
}

/// The resolution procedure: settle `promise` with the eventual result of
/// `resolution`, adopting it first if it is a thenable.
pub fn resolve_promise<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, promise: &JSPromisePtr<'gc>, resolution: Value<'gc>) {
    if !promise.borrow().is_pending() {
        log::trace!("resolve_promise: promise id={} already settled, ignoring", promise.borrow().id);
        return;
    }

    if same_value(&resolution, &Value::Promise(*promise)) {
        let error = create_error(mc, "TypeError", "Chaining cycle detected for promise #<Promise>");
        reject_promise(mc, realm, promise, error);
        return;
    }

    if !resolution.is_object_like() {
        fulfill_promise(mc, realm, promise, resolution);
        return;
    }

    let then_fn = match get_property(mc, realm, &resolution, "then") {
        Ok(v) => v,
        Err(err) => {
            log::trace!("resolve_promise: reading then threw: {}", err.message());
            let reason = eval_error_to_value(mc, err);
            reject_promise(mc, realm, promise, reason);
            return;
        }
    };

    if !then_fn.is_callable() {
        fulfill_promise(mc, realm, promise, resolution);
        return;
    }

    enqueue_job(
        mc,
        realm,
        Job::ResolveThenable {
            promise: *promise,
            thenable: resolution,
            then_fn,
        },
    );
}

/// Register a fulfill/reject reaction pair on `promise`. On a settled
/// promise the matching reaction is scheduled right away.
pub fn perform_promise_then<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    promise: &JSPromisePtr<'gc>,
    on_fulfilled: Option<Value<'gc>>,
    on_rejected: Option<Value<'gc>>,
    capability: Option<JSPromisePtr<'gc>>,
) {
    let fulfill_reaction = PromiseReaction {
        kind: ReactionKind::Fulfill,
        handler: on_fulfilled.filter(Value::is_callable),
        capability,
    };
    let reject_reaction = PromiseReaction {
        kind: ReactionKind::Reject,
        handler: on_rejected.filter(Value::is_callable),
        capability,
    };

    let mut state = promise.borrow_mut(mc);
    let was_handled = state.handled;
    state.handled = true;
    let current = state.state.clone();
    match current {
        PromiseState::Pending => {
            state.fulfill_reactions.push(fulfill_reaction);
            state.reject_reactions.push(reject_reaction);
        }
        PromiseState::Fulfilled(value) => {
            drop(state);
            enqueue_job(
                mc,
                realm,
                Job::Reaction {
                    reaction: fulfill_reaction,
                    argument: value,
                },
            );
        }
        PromiseState::Rejected(reason) => {
            drop(state);
            if !was_handled {
                track_handled(mc, realm, promise);
            }
            enqueue_job(
                mc,
                realm,
                Job::Reaction {
                    reaction: reject_reaction,
                    argument: reason,
                },
            );
        }
    }
}

/// `promise.then(onFulfilled, onRejected)`. Non-callable handlers pass the
/// settlement through to the returned promise.
pub fn promise_then<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    promise: &JSPromisePtr<'gc>,
    on_fulfilled: &Value<'gc>,
    on_rejected: &Value<'gc>,
) -> JSPromisePtr<'gc> {
    let derived = new_promise(mc);
    perform_promise_then(
        mc,
        realm,
        promise,
        Some(on_fulfilled.clone()),
        Some(on_rejected.clone()),
        Some(derived),
    );
    derived
}

pub fn promise_catch<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    promise: &JSPromisePtr<'gc>,
    on_rejected: &Value<'gc>,
) -> JSPromisePtr<'gc> {
    promise_then(mc, realm, promise, &Value::Undefined, on_rejected)
}

/// `promise.finally(onFinally)`. The callback runs with no arguments on
/// either outcome; the original value or reason passes through unless the
/// callback throws or returns a promise that rejects.
pub fn promise_finally<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    promise: &JSPromisePtr<'gc>,
    on_finally: &Value<'gc>,
) -> JSPromisePtr<'gc> {
    if !on_finally.is_callable() {
        return promise_then(mc, realm, promise, on_finally, on_finally);
    }
    let then_finally = new_native_function(
        mc,
        "thenFinally",
        NativeFunction::ThenFinally {
            on_finally: on_finally.clone(),
        },
    );
    let catch_finally = new_native_function(
        mc,
        "catchFinally",
        NativeFunction::CatchFinally {
            on_finally: on_finally.clone(),
        },
    );
    promise_then(mc, realm, promise, &then_finally, &catch_finally)
}

pub(crate) fn then_finally<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    on_finally: &Value<'gc>,
    value: Value<'gc>,
) -> Result<Value<'gc>, EvalError<'gc>> {
    let result = call_function(mc, realm, on_finally, &Value::Undefined, &[])?;
    let settled = promise_resolve(mc, realm, result);
    let value_thunk = new_native_function(mc, "valueThunk", NativeFunction::ReturnValue(value));
    Ok(Value::Promise(promise_then(mc, realm, &settled, &value_thunk, &Value::Undefined)))
}

pub(crate) fn catch_finally<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    on_finally: &Value<'gc>,
    reason: Value<'gc>,
) -> Result<Value<'gc>, EvalError<'gc>> {
    let result = call_function(mc, realm, on_finally, &Value::Undefined, &[])?;
    let settled = promise_resolve(mc, realm, result);
    // Rejects with the original reason, not with anything onFinally produced.
    let thrower = new_native_function(mc, "thrower", NativeFunction::ThrowReason(reason));
    Ok(Value::Promise(promise_then(mc, realm, &settled, &thrower, &Value::Undefined)))
}

/// Body of a reaction job: run the handler (or pass the argument through)
/// and settle the derived promise with the outcome.
pub(crate) fn promise_reaction_job<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    reaction: PromiseReaction<'gc>,
    argument: Value<'gc>,
) {
    let outcome = match &reaction.handler {
        None => match reaction.kind {
            ReactionKind::Fulfill => Ok(argument),
            ReactionKind::Reject => Err(EvalError::Throw(argument)),
        },
        Some(handler) => call_function(mc, realm, handler, &Value::Undefined, &[argument]),
    };

    let Some(capability) = reaction.capability else {
        if let Err(err) = outcome {
            log::trace!("promise_reaction_job: handler without capability threw: {}", err.message());
        }
        return;
    };
    match outcome {
        Ok(value) => resolve_promise(mc, realm, &capability, value),
        Err(err) => {
            let reason = eval_error_to_value(mc, err);
            reject_promise(mc, realm, &capability, reason);
        }
    }
}

/// Body of a thenable-adoption job: call `then_fn` on the thenable with a
/// fresh resolving pair. A throw rejects `promise` unless the thenable
/// already called one of the pair.
pub(crate) fn promise_resolve_thenable_job<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    promise: &JSPromisePtr<'gc>,
    thenable: Value<'gc>,
    then_fn: Value<'gc>,
) {
    let resolving = create_resolving_functions(mc, *promise);
    let args = [resolving.resolve.clone(), resolving.reject.clone()];
    if let Err(err) = call_function(mc, realm, &then_fn, &thenable, &args) {
        log::trace!("promise_resolve_thenable_job: then threw: {}", err.message());
        let reason = eval_error_to_value(mc, err);
        resolving.reject(mc, realm, reason);
    }
}

/// `Promise.resolve(value)`: native promises are returned as-is, anything
/// else is wrapped in a new promise resolved with it.
pub fn promise_resolve<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, value: Value<'gc>) -> JSPromisePtr<'gc> {
    if let Value::Promise(p) = &value {
        return *p;
    }
    let promise = new_promise(mc);
    resolve_promise(mc, realm, &promise, value);
    promise
}

/// `Promise.reject(reason)`.
pub fn promise_reject<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, reason: Value<'gc>) -> JSPromisePtr<'gc> {
    let promise = new_promise(mc);
    reject_promise(mc, realm, &promise, reason);
    promise
}

pub struct PromiseWithResolvers<'gc> {
    pub promise: JSPromisePtr<'gc>,
    pub resolve: Value<'gc>,
    pub reject: Value<'gc>,
}

impl<'gc> PromiseWithResolvers<'gc> {
    /// `{ promise, resolve, reject }` as a plain object.
    pub fn to_object(&self, mc: &MutationContext<'gc>) -> JSObjectDataPtr<'gc> {
        create_object(
            mc,
            vec![
                ("promise", Value::Promise(self.promise)),
                ("resolve", self.resolve.clone()),
                ("reject", self.reject.clone()),
            ],
        )
    }
}

/// `Promise.withResolvers()`.
pub fn promise_with_resolvers<'gc>(mc: &MutationContext<'gc>) -> PromiseWithResolvers<'gc> {
    let promise = new_promise(mc);
    let resolving = create_resolving_functions(mc, promise);
    PromiseWithResolvers {
        promise,
        resolve: resolving.resolve,
        reject: resolving.reject,
    }
}

/// `Promise.try(func, ...args)`: call `func` now and capture its outcome,
/// returned value or thrown exception, in a promise.
pub fn promise_try<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    func: &Value<'gc>,
    args: &[Value<'gc>],
) -> JSPromisePtr<'gc> {
    let promise = new_promise(mc);
    let resolving = create_resolving_functions(mc, promise);
    match call_function(mc, realm, func, &Value::Undefined, args) {
        Ok(value) => resolving.resolve(mc, realm, value),
        Err(err) => {
            let reason = eval_error_to_value(mc, err);
            resolving.reject(mc, realm, reason);
        }
    }
    promise
}

fn this_promise<'gc>(this: &Value<'gc>, method: &str) -> Result<JSPromisePtr<'gc>, EvalError<'gc>> {
    this.as_promise().ok_or_else(|| {
        raise_type_error!(
            "Method Promise.prototype.{} called on incompatible receiver {}",
            method,
            value_to_string(this)
        )
        .into()
    })
}

/// Entry point for builtin calls dispatched through `call_function`.
pub(crate) fn call_promise_builtin<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    builtin: PromiseBuiltin,
    this: &Value<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>, EvalError<'gc>> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    log::trace!("call_promise_builtin: {:?} args_len={}", builtin, args.len());
    let promise = match builtin {
        PromiseBuiltin::Then => {
            let p = this_promise(this, "then")?;
            promise_then(mc, realm, &p, &arg(0), &arg(1))
        }
        PromiseBuiltin::Catch => {
            let p = this_promise(this, "catch")?;
            promise_catch(mc, realm, &p, &arg(0))
        }
        PromiseBuiltin::Finally => {
            let p = this_promise(this, "finally")?;
            promise_finally(mc, realm, &p, &arg(0))
        }
        PromiseBuiltin::Resolve => promise_resolve(mc, realm, arg(0)),
        PromiseBuiltin::Reject => promise_reject(mc, realm, arg(0)),
        PromiseBuiltin::All => promise_all(mc, realm, &arg(0)),
        PromiseBuiltin::AllSettled => promise_all_settled(mc, realm, &arg(0)),
        PromiseBuiltin::Any => promise_any(mc, realm, &arg(0)),
        PromiseBuiltin::Race => promise_race(mc, realm, &arg(0)),
        PromiseBuiltin::WithResolvers => {
            return Ok(Value::Object(promise_with_resolvers(mc).to_object(mc)));
        }
        PromiseBuiltin::Try => promise_try(mc, realm, &arg(0), args.get(1..).unwrap_or(&[])),
    };
    Ok(Value::Promise(promise))
}

/// Build the `Promise` object and `Promise.prototype` for a new realm.
pub(crate) fn create_promise_intrinsics<'gc>(mc: &MutationContext<'gc>) -> Intrinsics<'gc> {
    let promise_constructor = new_js_object_data(mc);
    let promise_prototype = new_js_object_data(mc);

    for (name, builtin) in STATIC_METHODS {
        let func = new_native_function(mc, &format!("Promise.{}", name), NativeFunction::Builtin(*builtin));
        object_set_key_value(mc, &promise_constructor, *name, func);
    }
    for (name, builtin) in PROTOTYPE_METHODS {
        let func = new_native_function(mc, &format!("Promise.prototype.{}", name), NativeFunction::Builtin(*builtin));
        object_set_key_value(mc, &promise_prototype, *name, func);
    }
    object_set_key_value(mc, &promise_constructor, "prototype", Value::Object(promise_prototype));
    object_set_key_value(mc, &promise_prototype, "constructor", Value::Object(promise_constructor));

    Intrinsics {
        promise_constructor,
        promise_prototype,
    }
}

/// Register the realm's `Promise` object as the global `Promise`.
pub fn initialize_promise<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>) {
    let ctor = realm.borrow().intrinsics.promise_constructor;
    set_global(mc, realm, "Promise", Value::Object(ctor));
}
