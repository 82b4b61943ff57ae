use crate::core::{JSObjectData, JSObjectDataPtr, MutationContext, ObjectClass, Value, new_gc_cell_ptr};

pub fn create_array<'gc>(mc: &MutationContext<'gc>, elements: Vec<Value<'gc>>) -> JSObjectDataPtr<'gc> {
    let mut data = JSObjectData::new(ObjectClass::Array);
    data.elements = elements;
    new_gc_cell_ptr(mc, data)
}

/// Snapshot of an array's elements, or `None` for anything that is not an array.
pub fn array_elements<'gc>(value: &Value<'gc>) -> Option<Vec<Value<'gc>>> {
    match value {
        Value::Object(obj) if obj.borrow().is_array() => Some(obj.borrow().elements.clone()),
        _ => None,
    }
}
