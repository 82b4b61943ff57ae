use crate::core::{Collect, Gc, GcPtr, GcTrace, MutationContext, PropertyKey, new_gc_cell_ptr};
use crate::js_function::JSFunction;
use std::rc::Rc;

pub type JSObjectDataPtr<'gc> = GcPtr<'gc, JSObjectData<'gc>>;
pub type JSFunctionPtr<'gc> = Gc<'gc, JSFunction<'gc>>;
pub type JSPromisePtr<'gc> = GcPtr<'gc, JSPromise<'gc>>;

#[inline]
pub fn new_js_object_data<'gc>(mc: &MutationContext<'gc>) -> JSObjectDataPtr<'gc> {
    new_gc_cell_ptr(mc, JSObjectData::new(ObjectClass::Ordinary))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Collect)]
#[collect(require_static)]
pub enum ObjectClass {
    Ordinary,
    Array,
    Error,
}

#[derive(Clone, Collect)]
#[collect(no_drop)]
pub enum PropertySlot<'gc> {
    Data(Value<'gc>),
    Accessor {
        getter: Option<Value<'gc>>,
        setter: Option<Value<'gc>>,
    },
}

#[derive(Clone)]
pub struct JSObjectData<'gc> {
    pub class: ObjectClass,
    pub properties: indexmap::IndexMap<PropertyKey, PropertySlot<'gc>>,
    /// Dense element storage, only used by `ObjectClass::Array`.
    pub elements: Vec<Value<'gc>>,
    pub prototype: Option<JSObjectDataPtr<'gc>>,
}

unsafe impl<'gc> Collect<'gc> for JSObjectData<'gc> {
    fn trace<T: GcTrace<'gc>>(&self, cc: &mut T) {
        for slot in self.properties.values() {
            slot.trace(cc);
        }
        for v in &self.elements {
            v.trace(cc);
        }
        if let Some(p) = &self.prototype {
            p.trace(cc);
        }
    }
}

impl<'gc> JSObjectData<'gc> {
    pub fn new(class: ObjectClass) -> Self {
        JSObjectData {
            class,
            properties: indexmap::IndexMap::new(),
            elements: Vec::new(),
            prototype: None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.class == ObjectClass::Array
    }

    pub fn get_own(&self, key: &PropertyKey) -> Option<PropertySlot<'gc>> {
        if self.is_array() {
            if let Some(index) = key.as_array_index() {
                return self.elements.get(index).cloned().map(PropertySlot::Data);
            }
            if matches!(key, PropertyKey::String(s) if s == "length") {
                return Some(PropertySlot::Data(Value::Number(self.elements.len() as f64)));
            }
        }
        self.properties.get(key).cloned()
    }

    /// Own data value, ignoring accessors. Used by diagnostics that must not run code.
    pub fn get_own_data(&self, key: impl Into<PropertyKey>) -> Option<Value<'gc>> {
        match self.get_own(&key.into()) {
            Some(PropertySlot::Data(v)) => Some(v),
            _ => None,
        }
    }

    pub fn set_own_data(&mut self, key: impl Into<PropertyKey>, value: Value<'gc>) {
        let key = key.into();
        if self.is_array()
            && let Some(index) = key.as_array_index()
        {
            if index >= self.elements.len() {
                self.elements.resize(index + 1, Value::Undefined);
            }
            self.elements[index] = value;
            return;
        }
        self.properties.insert(key, PropertySlot::Data(value));
    }
}

#[derive(Clone)]
pub enum Value<'gc> {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Object(JSObjectDataPtr<'gc>),
    Function(JSFunctionPtr<'gc>),
    Promise(JSPromisePtr<'gc>),
}

unsafe impl<'gc> Collect<'gc> for Value<'gc> {
    fn trace<T: GcTrace<'gc>>(&self, cc: &mut T) {
        match self {
            Value::Object(obj) => obj.trace(cc),
            Value::Function(func) => func.trace(cc),
            Value::Promise(p) => p.trace(cc),
            _ => {}
        }
    }
}

impl<'gc> Value<'gc> {
    pub fn string(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Objects, functions and promises: the values a `then` lookup applies to.
    pub fn is_object_like(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Function(_) | Value::Promise(_))
    }

    pub fn as_promise(&self) -> Option<JSPromisePtr<'gc>> {
        match self {
            Value::Promise(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<JSObjectDataPtr<'gc>> {
        match self {
            Value::Object(o) => Some(*o),
            _ => None,
        }
    }
}

impl<'gc> From<f64> for Value<'gc> {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl<'gc> From<bool> for Value<'gc> {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<'gc> From<&str> for Value<'gc> {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl<'gc> From<String> for Value<'gc> {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl<'gc> std::fmt::Debug for Value<'gc> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Number(n) => write!(f, "Number({})", n),
            other => write!(f, "{}", value_to_string(other)),
        }
    }
}

pub fn to_boolean(value: &Value<'_>) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Boolean(b) => *b,
        Value::Number(n) => !(n.is_nan() || *n == 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Object(_) | Value::Function(_) | Value::Promise(_) => true,
    }
}

/// SameValue: identity for handles, NaN equals NaN, +0 and -0 differ.
pub fn same_value<'gc>(a: &Value<'gc>, b: &Value<'gc>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            if x.is_nan() && y.is_nan() {
                true
            } else {
                x == y && x.is_sign_negative() == y.is_sign_negative()
            }
        }
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => Gc::ptr_eq(*x, *y),
        (Value::Function(x), Value::Function(y)) => Gc::ptr_eq(*x, *y),
        (Value::Promise(x), Value::Promise(y)) => Gc::ptr_eq(*x, *y),
        _ => false,
    }
}

/// Number::toString(10): shortest round-trip digits, exponent form outside
/// `[1e-6, 1e21)`.
fn format_js_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    // ToString(-0) is "0"
    if n == 0.0 {
        return "0".to_string();
    }
    if !(1e-6..1e21).contains(&n.abs()) {
        let s = format!("{:e}", n);
        if let Some((mant, exp)) = s.split_once('e')
            && let Ok(exp) = exp.parse::<i32>()
        {
            return format!("{}e{:+}", mant, exp);
        }
        return s;
    }
    format!("{}", n)
}

pub fn value_to_string(value: &Value<'_>) -> String {
    let mut path = Vec::new();
    value_to_string_inner(value, &mut path)
}

fn value_to_string_inner(value: &Value<'_>, path: &mut Vec<usize>) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Number(n) => format_js_number(*n),
        Value::String(s) => s.to_string(),
        Value::Function(func) => format!("[Function: {}]", func.name),
        Value::Promise(_) => "[object Promise]".to_string(),
        Value::Object(obj) => {
            let ptr = Gc::as_ptr(*obj) as usize;
            // join() renders a cycle back to an array being joined as empty
            if path.contains(&ptr) {
                return String::new();
            }
            let obj = obj.borrow();
            match obj.class {
                ObjectClass::Array => {
                    path.push(ptr);
                    let joined = obj
                        .elements
                        .iter()
                        .map(|v| match v {
                            Value::Undefined | Value::Null => String::new(),
                            other => value_to_string_inner(other, path),
                        })
                        .collect::<Vec<_>>()
                        .join(",");
                    path.pop();
                    joined
                }
                ObjectClass::Error => {
                    let name = obj.get_own_data("name").map(|v| value_to_string(&v)).unwrap_or_else(|| "Error".to_string());
                    match obj.get_own_data("message").map(|v| value_to_string(&v)) {
                        Some(msg) if !msg.is_empty() => format!("{}: {}", name, msg),
                        _ => name,
                    }
                }
                ObjectClass::Ordinary => "[object Object]".to_string(),
            }
        }
    }
}

/// Convert a value into JSON for host inspection. Accessors are not run,
/// `undefined` becomes `null`, errors render as `"Name: message"` and
/// repeated objects on the current path render as `"[Circular]"`.
pub fn value_to_json(value: &Value<'_>) -> serde_json::Value {
    let mut path = Vec::new();
    value_to_json_inner(value, &mut path)
}

fn value_to_json_inner(value: &Value<'_>, path: &mut Vec<usize>) -> serde_json::Value {
    match value {
        Value::Undefined | Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            if n.is_finite() && *n == n.trunc() && n.abs() < 9.0e15 {
                serde_json::Value::from(*n as i64)
            } else {
                serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Function(_) | Value::Promise(_) => serde_json::Value::String(value_to_string(value)),
        Value::Object(obj) => {
            let ptr = Gc::as_ptr(*obj) as usize;
            if path.contains(&ptr) {
                return serde_json::Value::String("[Circular]".to_string());
            }
            if obj.borrow().class == ObjectClass::Error {
                return serde_json::Value::String(value_to_string(value));
            }
            path.push(ptr);
            let borrowed = obj.borrow();
            let out = if borrowed.is_array() {
                serde_json::Value::Array(borrowed.elements.iter().map(|v| value_to_json_inner(v, path)).collect())
            } else {
                let mut map = serde_json::Map::new();
                for (key, slot) in &borrowed.properties {
                    if let (PropertyKey::String(k), PropertySlot::Data(v)) = (key, slot) {
                        map.insert(k.clone(), value_to_json_inner(v, path));
                    }
                }
                serde_json::Value::Object(map)
            };
            path.pop();
            out
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Collect)]
#[collect(require_static)]
pub enum ReactionKind {
    Fulfill,
    Reject,
}

/// A handler waiting on one kind of settlement, plus the derived promise
/// that receives the handler's outcome. `handler: None` passes the
/// settlement through unchanged.
#[derive(Clone, Collect)]
#[collect(no_drop)]
pub struct PromiseReaction<'gc> {
    pub kind: ReactionKind,
    pub handler: Option<Value<'gc>>,
    pub capability: Option<JSPromisePtr<'gc>>,
}

#[derive(Clone, Collect)]
#[collect(no_drop)]
pub enum PromiseState<'gc> {
    Pending,
    Fulfilled(Value<'gc>),
    Rejected(Value<'gc>),
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct JSPromise<'gc> {
    pub id: usize,
    pub state: PromiseState<'gc>,
    pub fulfill_reactions: Vec<PromiseReaction<'gc>>,
    pub reject_reactions: Vec<PromiseReaction<'gc>>,
    /// Set once any reaction is attached. Rejections of handled promises
    /// are never reported to the host.
    pub handled: bool,
}

static UNIQUE_ID_SEED: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(1);

pub fn generate_unique_id() -> usize {
    UNIQUE_ID_SEED.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
}

impl<'gc> Default for JSPromise<'gc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'gc> JSPromise<'gc> {
    pub fn new() -> Self {
        Self {
            id: generate_unique_id(),
            state: PromiseState::Pending,
            fulfill_reactions: Vec::new(),
            reject_reactions: Vec::new(),
            handled: false,
        }
    }

    pub fn state(&self) -> &PromiseState<'gc> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, PromiseState::Pending)
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self.state, PromiseState::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.state, PromiseState::Rejected(_))
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Fulfillment value or rejection reason; `undefined` while pending.
    pub fn result(&self) -> Value<'gc> {
        match &self.state {
            PromiseState::Pending => Value::Undefined,
            PromiseState::Fulfilled(v) | PromiseState::Rejected(v) => v.clone(),
        }
    }
}

impl std::fmt::Debug for JSPromise<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            PromiseState::Pending => write!(
                f,
                "JSPromise {{ id: {}, <pending>, fulfill_reactions: {}, reject_reactions: {} }}",
                self.id,
                self.fulfill_reactions.len(),
                self.reject_reactions.len()
            ),
            PromiseState::Fulfilled(v) => write!(f, "JSPromise {{ id: {}, <fulfilled>: {:?} }}", self.id, v),
            PromiseState::Rejected(v) => write!(f, "JSPromise {{ id: {}, <rejected>: {:?} }}", self.id, v),
        }
    }
}
