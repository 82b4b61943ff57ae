//! `Promise.all`, `Promise.allSettled`, `Promise.any` and `Promise.race`.
//!
//! All four share one driver: walk the iterable, pass each item through
//! `Promise.resolve`, and attach reactions. For the three aggregating
//! combinators every element gets its own one-shot element function that
//! writes into a shared [`AggregateState`]; the result promise is settled
//! through its own resolving functions, so whichever path settles it first
//! wins and later attempts are ignored.

use crate::core::{
    Collect, EvalError, GcPtr, JSPromisePtr, MutationContext, ReactionKind, RealmPtr, Value, create_aggregate_error,
    eval_error_to_value, new_gc_cell_ptr,
};
use crate::js_array::create_array;
use crate::js_function::{ElementFunction, NativeFunction, call_function, new_native_function};
use crate::js_iterator::get_iterator;
use crate::js_object::create_object;
use crate::js_promise::{ResolvingFunctions, create_resolving_functions, new_promise, perform_promise_then, promise_resolve};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Collect)]
#[collect(require_static)]
pub enum Combinator {
    All,
    AllSettled,
    Any,
    Race,
}

/// Bookkeeping shared by the element functions of one combinator call.
#[derive(Collect)]
#[collect(no_drop)]
pub struct AggregateState<'gc> {
    pub kind: Combinator,
    /// Starts at 1 for the iteration itself; each element adds one and
    /// removes it again once it settles.
    pub remaining: usize,
    /// Fulfillment values, settlement descriptors or rejection reasons,
    /// in input order.
    pub values: Vec<Value<'gc>>,
    pub resolve: Value<'gc>,
    pub reject: Value<'gc>,
}

pub fn promise_all<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, iterable: &Value<'gc>) -> JSPromisePtr<'gc> {
    perform_combinator(mc, realm, Combinator::All, iterable)
}

pub fn promise_all_settled<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, iterable: &Value<'gc>) -> JSPromisePtr<'gc> {
    perform_combinator(mc, realm, Combinator::AllSettled, iterable)
}

pub fn promise_any<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, iterable: &Value<'gc>) -> JSPromisePtr<'gc> {
    perform_combinator(mc, realm, Combinator::Any, iterable)
}

/// An empty iterable leaves the returned promise pending forever.
pub fn promise_race<'gc>(mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>, iterable: &Value<'gc>) -> JSPromisePtr<'gc> {
    perform_combinator(mc, realm, Combinator::Race, iterable)
}

fn perform_combinator<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    kind: Combinator,
    iterable: &Value<'gc>,
) -> JSPromisePtr<'gc> {
    let promise = new_promise(mc);
    let resolving = create_resolving_functions(mc, promise);
    log::trace!("perform_combinator: {:?} result promise id={}", kind, promise.borrow().id);
    if let Err(err) = drive_combinator(mc, realm, kind, iterable, &resolving) {
        log::debug!("perform_combinator: {:?} aborted: {}", kind, err.message());
        let reason = eval_error_to_value(mc, err);
        resolving.reject(mc, realm, reason);
    }
    promise
}

fn drive_combinator<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    kind: Combinator,
    iterable: &Value<'gc>,
    resolving: &ResolvingFunctions<'gc>,
) -> Result<(), EvalError<'gc>> {
    let mut iter = get_iterator(mc, realm, iterable)?;
    let aggregate = new_gc_cell_ptr(
        mc,
        AggregateState {
            kind,
            remaining: 1,
            values: Vec::new(),
            resolve: resolving.resolve.clone(),
            reject: resolving.reject.clone(),
        },
    );

    let mut index = 0usize;
    while let Some(item) = iter.step(mc, realm)? {
        let next = promise_resolve(mc, realm, item);
        let (on_fulfilled, on_rejected) = match kind {
            Combinator::Race => (resolving.resolve.clone(), resolving.reject.clone()),
            _ => {
                {
                    let mut agg = aggregate.borrow_mut(mc);
                    agg.values.push(Value::Undefined);
                    agg.remaining += 1;
                }
                let element = ElementFunction {
                    index,
                    aggregate,
                    already_called: new_gc_cell_ptr(mc, false),
                };
                element_handlers(mc, kind, element, resolving)
            }
        };
        perform_promise_then(mc, realm, &next, Some(on_fulfilled), Some(on_rejected), None);
        index += 1;
    }
    log::trace!("drive_combinator: {:?} attached to {} inputs", kind, index);

    if kind == Combinator::Race {
        return Ok(());
    }
    finish_element(mc, realm, &aggregate)
}

fn element_handlers<'gc>(
    mc: &MutationContext<'gc>,
    kind: Combinator,
    element: ElementFunction<'gc>,
    resolving: &ResolvingFunctions<'gc>,
) -> (Value<'gc>, Value<'gc>) {
    match kind {
        Combinator::All => (
            new_native_function(mc, "resolveElement", NativeFunction::AllResolveElement(element)),
            resolving.reject.clone(),
        ),
        Combinator::AllSettled => (
            new_native_function(mc, "resolveElement", NativeFunction::AllSettledElement(element, ReactionKind::Fulfill)),
            new_native_function(mc, "rejectElement", NativeFunction::AllSettledElement(element, ReactionKind::Reject)),
        ),
        Combinator::Any => (
            resolving.resolve.clone(),
            new_native_function(mc, "rejectElement", NativeFunction::AnyRejectElement(element)),
        ),
        Combinator::Race => (resolving.resolve.clone(), resolving.reject.clone()),
    }
}

/// Mark the element as settled; false if it already was.
fn claim_element<'gc>(mc: &MutationContext<'gc>, element: &ElementFunction<'gc>) -> bool {
    if *element.already_called.borrow() {
        return false;
    }
    *element.already_called.borrow_mut(mc) = true;
    true
}

fn store_element<'gc>(mc: &MutationContext<'gc>, aggregate: &GcPtr<'gc, AggregateState<'gc>>, index: usize, value: Value<'gc>) {
    if let Some(slot) = aggregate.borrow_mut(mc).values.get_mut(index) {
        *slot = value;
    }
}

/// Count one element (or the end of iteration) as done. The last one
/// settles the result promise.
fn finish_element<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    aggregate: &GcPtr<'gc, AggregateState<'gc>>,
) -> Result<(), EvalError<'gc>> {
    let (kind, values, resolve, reject) = {
        let mut agg = aggregate.borrow_mut(mc);
        agg.remaining = agg.remaining.saturating_sub(1);
        if agg.remaining > 0 {
            return Ok(());
        }
        (agg.kind, std::mem::take(&mut agg.values), agg.resolve.clone(), agg.reject.clone())
    };
    log::trace!("finish_element: {:?} complete with {} values", kind, values.len());
    match kind {
        Combinator::Any => {
            let error = create_aggregate_error(mc, values, "All promises were rejected");
            call_function(mc, realm, &reject, &Value::Undefined, &[error])?;
        }
        _ => {
            let array = Value::Object(create_array(mc, values));
            call_function(mc, realm, &resolve, &Value::Undefined, &[array])?;
        }
    }
    Ok(())
}

pub(crate) fn all_resolve_element<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    element: &ElementFunction<'gc>,
    value: Value<'gc>,
) -> Result<Value<'gc>, EvalError<'gc>> {
    if claim_element(mc, element) {
        store_element(mc, &element.aggregate, element.index, value);
        finish_element(mc, realm, &element.aggregate)?;
    }
    Ok(Value::Undefined)
}

pub(crate) fn all_settled_element<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    element: &ElementFunction<'gc>,
    kind: ReactionKind,
    value: Value<'gc>,
) -> Result<Value<'gc>, EvalError<'gc>> {
    if claim_element(mc, element) {
        let descriptor = match kind {
            ReactionKind::Fulfill => create_object(mc, vec![("status", Value::string("fulfilled")), ("value", value)]),
            ReactionKind::Reject => create_object(mc, vec![("status", Value::string("rejected")), ("reason", value)]),
        };
        store_element(mc, &element.aggregate, element.index, Value::Object(descriptor));
        finish_element(mc, realm, &element.aggregate)?;
    }
    Ok(Value::Undefined)
}

pub(crate) fn any_reject_element<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    element: &ElementFunction<'gc>,
    reason: Value<'gc>,
) -> Result<Value<'gc>, EvalError<'gc>> {
    if claim_element(mc, element) {
        store_element(mc, &element.aggregate, element.index, reason);
        finish_element(mc, realm, &element.aggregate)?;
    }
    Ok(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Runtime, value_to_string};

    #[test]
    fn race_over_empty_array_stays_pending() {
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let empty = Value::Object(create_array(mc, vec![]));
            let p = promise_race(mc, realm, &empty);
            crate::core::set_global(mc, realm, "raced", Value::Promise(p));
        });
        rt.run_jobs().ok();
        let pending = rt.mutate(|_mc, realm| crate::core::get_global(realm, "raced").as_promise().map(|p| p.borrow().is_pending()));
        assert_eq!(pending, Some(true));
    }

    #[test]
    fn all_over_empty_array_fulfills_with_empty_array() {
        let mut rt = Runtime::new();
        rt.mutate(|mc, realm| {
            let empty = Value::Object(create_array(mc, vec![]));
            let p = promise_all(mc, realm, &empty);
            crate::core::set_global(mc, realm, "all", Value::Promise(p));
        });
        rt.run_jobs().ok();
        let out = rt.mutate(|_mc, realm| {
            let p = crate::core::get_global(realm, "all").as_promise();
            p.map(|p| (p.borrow().is_fulfilled(), value_to_string(&p.borrow().result())))
        });
        assert_eq!(out, Some((true, String::new())));
    }
}
