use crate::{
    JSError,
    core::{JSObjectData, MutationContext, ObjectClass, Value, new_gc_cell_ptr, value_to_string},
    js_array::create_array,
};

/// Abrupt completion of a call: either an engine-side error that still has
/// to be materialized, or a value thrown by script/host code.
#[derive(Debug)]
pub enum EvalError<'gc> {
    Js(JSError),
    Throw(Value<'gc>),
}

impl<'gc> From<JSError> for EvalError<'gc> {
    fn from(e: JSError) -> Self {
        EvalError::Js(e)
    }
}

impl<'gc> From<EvalError<'gc>> for JSError {
    fn from(e: EvalError<'gc>) -> Self {
        match e {
            EvalError::Js(j) => j,
            EvalError::Throw(v) => JSError::Throw { value: value_to_string(&v) },
        }
    }
}

impl<'gc> EvalError<'gc> {
    pub fn message(&self) -> String {
        match self {
            EvalError::Js(e) => e.message(),
            EvalError::Throw(v) => value_to_string(v),
        }
    }
}

/// Build an `Error`-class object carrying `name` and `message`.
pub fn create_error<'gc>(mc: &MutationContext<'gc>, name: &str, message: &str) -> Value<'gc> {
    let mut data = JSObjectData::new(ObjectClass::Error);
    data.set_own_data("name", Value::string(name));
    data.set_own_data("message", Value::string(message));
    Value::Object(new_gc_cell_ptr(mc, data))
}

/// `AggregateError` with its `errors` list, in the order given.
pub fn create_aggregate_error<'gc>(mc: &MutationContext<'gc>, errors: Vec<Value<'gc>>, message: &str) -> Value<'gc> {
    let error = create_error(mc, "AggregateError", message);
    if let Value::Object(obj) = &error {
        let errors = create_array(mc, errors);
        obj.borrow_mut(mc).set_own_data("errors", Value::Object(errors));
    }
    error
}

pub fn js_error_to_value<'gc>(mc: &MutationContext<'gc>, err: &JSError) -> Value<'gc> {
    create_error(mc, err.name(), &err.message())
}

/// The rejection reason an abrupt completion turns into.
pub fn eval_error_to_value<'gc>(mc: &MutationContext<'gc>, err: EvalError<'gc>) -> Value<'gc> {
    match err {
        EvalError::Throw(v) => v,
        EvalError::Js(j) => js_error_to_value(mc, &j),
    }
}

pub fn is_error(value: &Value<'_>) -> bool {
    matches!(value, Value::Object(obj) if obj.borrow().class == ObjectClass::Error)
}

/// `name` of an error object, e.g. `"TypeError"`.
pub fn error_name(value: &Value<'_>) -> Option<String> {
    match value {
        Value::Object(obj) if obj.borrow().class == ObjectClass::Error => {
            obj.borrow().get_own_data("name").map(|v| value_to_string(&v))
        }
        _ => None,
    }
}
