//! Iteration over the inputs of the Promise combinators.
//!
//! Arrays without an own `@@iterator` override are walked by index over
//! their live elements. Any other object must expose a callable
//! `@@iterator` method returning an iterator with `next()`.

use crate::core::{
    EvalError, JSObjectDataPtr, MutationContext, PropertyKey, RealmPtr, Value, WellKnownSymbol, to_boolean, value_to_string,
};
use crate::js_function::call_function;
use crate::js_object::{create_object, get_property};
use crate::raise_type_error;

pub enum IteratorRecord<'gc> {
    Array { array: JSObjectDataPtr<'gc>, index: usize },
    Protocol { iterator: Value<'gc>, next: Value<'gc> },
}

pub fn get_iterator<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    iterable: &Value<'gc>,
) -> Result<IteratorRecord<'gc>, EvalError<'gc>> {
    let iterator_key = PropertyKey::Symbol(WellKnownSymbol::Iterator);
    if let Value::Object(obj) = iterable
        && obj.borrow().is_array()
        && !obj.borrow().properties.contains_key(&iterator_key)
    {
        return Ok(IteratorRecord::Array { array: *obj, index: 0 });
    }

    let method = match iterable {
        Value::Object(_) => get_property(mc, realm, iterable, iterator_key)?,
        _ => Value::Undefined,
    };
    if !method.is_callable() {
        return Err(raise_type_error!("{} is not iterable", value_to_string(iterable)).into());
    }
    let iterator = call_function(mc, realm, &method, iterable, &[])?;
    if !iterator.is_object_like() {
        return Err(raise_type_error!("Result of the Symbol.iterator method is not an object").into());
    }
    let next = get_property(mc, realm, &iterator, "next")?;
    Ok(IteratorRecord::Protocol { iterator, next })
}

impl<'gc> IteratorRecord<'gc> {
    /// Advance one step: `Ok(None)` once the iterator reports `done`.
    pub fn step(&mut self, mc: &MutationContext<'gc>, realm: &RealmPtr<'gc>) -> Result<Option<Value<'gc>>, EvalError<'gc>> {
        match self {
            IteratorRecord::Array { array, index } => {
                let item = array.borrow().elements.get(*index).cloned();
                if item.is_some() {
                    *index += 1;
                }
                Ok(item)
            }
            IteratorRecord::Protocol { iterator, next } => {
                let result = call_function(mc, realm, next, iterator, &[])?;
                if !result.is_object_like() {
                    return Err(raise_type_error!("Iterator result {} is not an object", value_to_string(&result)).into());
                }
                if to_boolean(&get_property(mc, realm, &result, "done")?) {
                    return Ok(None);
                }
                Ok(Some(get_property(mc, realm, &result, "value")?))
            }
        }
    }
}

/// `{ value, done }` as returned by an iterator's `next()`.
pub fn create_iter_result_object<'gc>(mc: &MutationContext<'gc>, value: Value<'gc>, done: bool) -> Value<'gc> {
    Value::Object(create_object(mc, vec![("value", value), ("done", Value::Boolean(done))]))
}
