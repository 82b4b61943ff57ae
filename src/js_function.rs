use crate::core::{
    Collect, EvalError, Gc, GcPtr, GcTrace, JSPromisePtr, MutationContext, ReactionKind, RealmPtr, Value, value_to_string,
};
use crate::js_promise::PromiseBuiltin;
use crate::js_promise_combinators::AggregateState;
use crate::raise_type_error;
use std::rc::Rc;

/// Signature of a host-provided callable. The last argument is the traced
/// `data` value the function was created with; closures themselves must not
/// capture arena values.
pub type HostFn = dyn for<'gc> Fn(
    &MutationContext<'gc>,
    &RealmPtr<'gc>,
    &Value<'gc>,
    &[Value<'gc>],
    &Value<'gc>,
) -> Result<Value<'gc>, EvalError<'gc>>;

/// State captured by one per-element function of a combinator.
#[derive(Clone, Copy, Collect)]
#[collect(no_drop)]
pub struct ElementFunction<'gc> {
    pub index: usize,
    pub aggregate: GcPtr<'gc, AggregateState<'gc>>,
    /// Shared by the fulfill/reject pair of one element where both exist.
    pub already_called: GcPtr<'gc, bool>,
}

pub enum NativeFunction<'gc> {
    Host {
        func: Rc<HostFn>,
        data: Value<'gc>,
    },
    Builtin(PromiseBuiltin),
    /// One half of a promise's resolve/reject pair. The pair shares
    /// `already_resolved`, so only the first call of either has effect.
    Resolving {
        promise: JSPromisePtr<'gc>,
        already_resolved: GcPtr<'gc, bool>,
        kind: ReactionKind,
    },
    ThenFinally {
        on_finally: Value<'gc>,
    },
    CatchFinally {
        on_finally: Value<'gc>,
    },
    ReturnValue(Value<'gc>),
    ThrowReason(Value<'gc>),
    AllResolveElement(ElementFunction<'gc>),
    AllSettledElement(ElementFunction<'gc>, ReactionKind),
    AnyRejectElement(ElementFunction<'gc>),
}

unsafe impl<'gc> Collect<'gc> for NativeFunction<'gc> {
    fn trace<T: GcTrace<'gc>>(&self, cc: &mut T) {
        match self {
            NativeFunction::Host { data, .. } => data.trace(cc),
            NativeFunction::Builtin(_) => {}
            NativeFunction::Resolving {
                promise, already_resolved, ..
            } => {
                promise.trace(cc);
                already_resolved.trace(cc);
            }
            NativeFunction::ThenFinally { on_finally } | NativeFunction::CatchFinally { on_finally } => on_finally.trace(cc),
            NativeFunction::ReturnValue(v) | NativeFunction::ThrowReason(v) => v.trace(cc),
            NativeFunction::AllResolveElement(e) | NativeFunction::AnyRejectElement(e) | NativeFunction::AllSettledElement(e, _) => {
                e.trace(cc)
            }
        }
    }
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct JSFunction<'gc> {
    pub name: String,
    pub native: NativeFunction<'gc>,
}

pub fn new_native_function<'gc>(mc: &MutationContext<'gc>, name: &str, native: NativeFunction<'gc>) -> Value<'gc> {
    Value::Function(Gc::new(
        mc,
        JSFunction {
            name: name.to_string(),
            native,
        },
    ))
}

/// Wrap a Rust closure as a callable value. Anything the closure needs from
/// the arena travels in `data`, which is traced alongside the function.
pub fn new_host_function<'gc, F>(mc: &MutationContext<'gc>, name: &str, data: Value<'gc>, func: F) -> Value<'gc>
where
    F: for<'a> Fn(&MutationContext<'a>, &RealmPtr<'a>, &Value<'a>, &[Value<'a>], &Value<'a>) -> Result<Value<'a>, EvalError<'a>>
        + 'static,
{
    let func: Rc<HostFn> = Rc::new(func);
    new_native_function(mc, name, NativeFunction::Host { func, data })
}

/// Invoke `func` with `this` and `args`. Calling a non-callable value is a
/// `TypeError`.
pub fn call_function<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    func: &Value<'gc>,
    this: &Value<'gc>,
    args: &[Value<'gc>],
) -> Result<Value<'gc>, EvalError<'gc>> {
    let Value::Function(function) = func else {
        return Err(raise_type_error!("{} is not a function", value_to_string(func)).into());
    };
    log::trace!("call_function name={} args_len={}", function.name, args.len());
    let arg0 = args.first().cloned().unwrap_or(Value::Undefined);
    match &function.native {
        NativeFunction::Host { func, data } => func(mc, realm, this, args, data),
        NativeFunction::Builtin(builtin) => crate::js_promise::call_promise_builtin(mc, realm, *builtin, this, args),
        NativeFunction::Resolving {
            promise,
            already_resolved,
            kind,
        } => {
            crate::js_promise::resolving_function_call(mc, realm, promise, already_resolved, *kind, arg0);
            Ok(Value::Undefined)
        }
        NativeFunction::ThenFinally { on_finally } => crate::js_promise::then_finally(mc, realm, on_finally, arg0),
        NativeFunction::CatchFinally { on_finally } => crate::js_promise::catch_finally(mc, realm, on_finally, arg0),
        NativeFunction::ReturnValue(v) => Ok(v.clone()),
        NativeFunction::ThrowReason(reason) => Err(EvalError::Throw(reason.clone())),
        NativeFunction::AllResolveElement(element) => crate::js_promise_combinators::all_resolve_element(mc, realm, element, arg0),
        NativeFunction::AllSettledElement(element, kind) => {
            crate::js_promise_combinators::all_settled_element(mc, realm, element, *kind, arg0)
        }
        NativeFunction::AnyRejectElement(element) => crate::js_promise_combinators::any_reject_element(mc, realm, element, arg0),
    }
}
