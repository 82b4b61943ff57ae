use crate::core::{
    EvalError, JSObjectDataPtr, MutationContext, PropertyKey, PropertySlot, RealmPtr, Value, new_js_object_data, value_to_string,
};
use crate::js_function::call_function;
use crate::raise_type_error;

/// Create an ordinary object from `(key, value)` data properties.
pub fn create_object<'gc>(mc: &MutationContext<'gc>, props: Vec<(&str, Value<'gc>)>) -> JSObjectDataPtr<'gc> {
    let obj = new_js_object_data(mc);
    {
        let mut data = obj.borrow_mut(mc);
        for (key, value) in props {
            data.set_own_data(key, value);
        }
    }
    obj
}

pub fn object_set_key_value<'gc>(mc: &MutationContext<'gc>, obj: &JSObjectDataPtr<'gc>, key: impl Into<PropertyKey>, value: Value<'gc>) {
    obj.borrow_mut(mc).set_own_data(key, value);
}

pub fn define_accessor<'gc>(
    mc: &MutationContext<'gc>,
    obj: &JSObjectDataPtr<'gc>,
    key: impl Into<PropertyKey>,
    getter: Option<Value<'gc>>,
    setter: Option<Value<'gc>>,
) {
    obj.borrow_mut(mc)
        .properties
        .insert(key.into(), PropertySlot::Accessor { getter, setter });
}

/// Find `key` on `obj` or its prototype chain.
fn lookup_slot<'gc>(obj: &JSObjectDataPtr<'gc>, key: &PropertyKey) -> Option<PropertySlot<'gc>> {
    let mut current = Some(*obj);
    while let Some(o) = current {
        let borrowed = o.borrow();
        if let Some(slot) = borrowed.get_own(key) {
            return Some(slot);
        }
        current = borrowed.prototype;
    }
    None
}

/// `target[key]`, running getters with `target` as receiver. Native promises
/// resolve properties through the realm's `Promise.prototype`.
pub fn get_property<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    target: &Value<'gc>,
    key: impl Into<PropertyKey>,
) -> Result<Value<'gc>, EvalError<'gc>> {
    let key = key.into();
    let slot = match target {
        Value::Undefined | Value::Null => {
            return Err(raise_type_error!("Cannot read properties of {} (reading '{}')", value_to_string(target), key).into());
        }
        Value::Object(obj) => lookup_slot(obj, &key),
        Value::Promise(_) => {
            let proto = realm.borrow().intrinsics.promise_prototype;
            lookup_slot(&proto, &key)
        }
        Value::Function(func) => match &key {
            PropertyKey::String(s) if s == "name" => Some(PropertySlot::Data(Value::string(&func.name))),
            _ => None,
        },
        Value::Boolean(_) | Value::Number(_) | Value::String(_) => None,
    };
    match slot {
        None => Ok(Value::Undefined),
        Some(PropertySlot::Data(v)) => Ok(v),
        Some(PropertySlot::Accessor { getter: Some(getter), .. }) => {
            log::trace!("get_property: running getter for '{}'", key);
            call_function(mc, realm, &getter, target, &[])
        }
        Some(PropertySlot::Accessor { getter: None, .. }) => Ok(Value::Undefined),
    }
}

/// `target[key] = value`. Setters run with `target` as receiver; an accessor
/// without a setter ignores the write. Writes to non-objects are ignored.
pub fn set_property<'gc>(
    mc: &MutationContext<'gc>,
    realm: &RealmPtr<'gc>,
    target: &Value<'gc>,
    key: impl Into<PropertyKey>,
    value: Value<'gc>,
) -> Result<(), EvalError<'gc>> {
    let key = key.into();
    let Value::Object(obj) = target else {
        if matches!(target, Value::Undefined | Value::Null) {
            return Err(raise_type_error!("Cannot set properties of {} (setting '{}')", value_to_string(target), key).into());
        }
        return Ok(());
    };
    match lookup_slot(obj, &key) {
        Some(PropertySlot::Accessor { setter: Some(setter), .. }) => {
            call_function(mc, realm, &setter, target, &[value])?;
        }
        Some(PropertySlot::Accessor { setter: None, .. }) => {
            log::trace!("set_property: '{}' has no setter, ignoring write", key);
        }
        _ => obj.borrow_mut(mc).set_own_data(key, value),
    }
    Ok(())
}

pub fn has_property<'gc>(realm: &RealmPtr<'gc>, target: &Value<'gc>, key: impl Into<PropertyKey>) -> bool {
    let key = key.into();
    match target {
        Value::Object(obj) => lookup_slot(obj, &key).is_some(),
        Value::Promise(_) => {
            let proto = realm.borrow().intrinsics.promise_prototype;
            lookup_slot(&proto, &key).is_some()
        }
        Value::Function(_) => matches!(&key, PropertyKey::String(s) if s == "name"),
        _ => false,
    }
}
