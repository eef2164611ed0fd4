//! Dynamic value model.
//!
//! Primitive values compare by content. Arrays, objects, functions and host
//! handles are reference-counted and compare by identity under
//! [`Value::same_value`]; [`Value::deep_equals`] compares them structurally.
//!
//! Objects carry an optional prototype link. Reads walk the link chain until
//! a key is found; writes always land on the object itself. Scope models use
//! this to shadow ancestor attributes without copying them.

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{Error, Result};

/// Native callable: `(this, args) -> value`.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value>;

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
    Host(HostRef),
}

// Object

/// Property storage of an object.
#[derive(Default)]
pub struct Object {
    props: IndexMap<Rc<str>, Value>,
    proto: Option<ObjectRef>,
}

/// Shared handle to an [`Object`].
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    /// Empty object without prototype.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty object reading through to `proto` on misses.
    pub fn with_proto(proto: Option<ObjectRef>) -> Self {
        ObjectRef(Rc::new(RefCell::new(Object {
            props: IndexMap::new(),
            proto,
        })))
    }

    /// Object with the given own properties, in order.
    pub fn from_pairs<K: Into<Rc<str>>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let obj = Self::new();
        {
            let mut inner = obj.0.borrow_mut();
            for (key, value) in pairs {
                inner.props.insert(key.into(), value);
            }
        }
        obj
    }

    /// Look `key` up along the prototype chain.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let next = {
                let obj = current.0.borrow();
                if let Some(value) = obj.props.get(key) {
                    return Some(value.clone());
                }
                obj.proto.clone()
            };
            current = next?;
        }
    }

    /// Read `key` along the prototype chain; `undefined` when absent.
    #[inline]
    pub fn get(&self, key: &str) -> Value {
        self.lookup(key).unwrap_or_default()
    }

    /// True if `key` is found on this object or any prototype.
    #[inline]
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn get_own(&self, key: &str) -> Option<Value> {
        self.0.borrow().props.get(key).cloned()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.borrow().props.contains_key(key)
    }

    /// Write an own property (never touches prototypes).
    pub fn set(&self, key: impl Into<Rc<str>>, value: Value) {
        self.0.borrow_mut().props.insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().props.shift_remove(key)
    }

    /// Own keys in insertion order.
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.0.borrow().props.keys().cloned().collect()
    }

    /// Own entries in insertion order.
    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        self.0
            .borrow()
            .props
            .iter()
            .map(|(k, v)| (Rc::clone(k), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().props.is_empty()
    }

    pub fn proto(&self) -> Option<ObjectRef> {
        self.0.borrow().proto.clone()
    }

    pub fn set_proto(&self, proto: Option<ObjectRef>) {
        self.0.borrow_mut().proto = proto;
    }

    /// Remove every own property.
    pub fn clear(&self) {
        self.0.borrow_mut().props.clear();
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

// Array

/// Shared handle to a list of values.
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(values: Vec<Value>) -> Self {
        ArrayRef(Rc::new(RefCell::new(values)))
    }

    /// Element at `index`; `undefined` when out of range.
    pub fn get(&self, index: usize) -> Value {
        self.0.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Write element `index`, padding with `undefined` as needed.
    pub fn set(&self, index: usize, value: Value) {
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    pub fn truncate(&self, len: usize) {
        self.0.borrow_mut().truncate(len);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    /// Borrow the elements.
    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

// Function

/// Classification the expression sandbox inspects before calling.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum FunctionKind {
    /// Regular native function.
    Ordinary,
    /// A constructor of functions (its own constructor is itself).
    FunctionConstructor,
    /// `call`, `apply` or `bind` taken from a function value.
    CallApplyBind,
}

/// A native function with a property bag.
pub struct Function {
    name: Rc<str>,
    kind: FunctionKind,
    body: Box<NativeFn>,
    props: ObjectRef,
}

/// Shared handle to a [`Function`].
#[derive(Clone)]
pub struct FunctionRef(Rc<Function>);

impl FunctionRef {
    /// Ordinary function.
    pub fn new(
        name: impl Into<Rc<str>>,
        body: impl Fn(&Value, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self::with_kind(name, FunctionKind::Ordinary, body)
    }

    pub fn with_kind(
        name: impl Into<Rc<str>>,
        kind: FunctionKind,
        body: impl Fn(&Value, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        FunctionRef(Rc::new(Function {
            name: name.into(),
            kind,
            body: Box::new(body),
            props: ObjectRef::new(),
        }))
    }

    /// Invoke with an explicit `this`.
    #[inline]
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        (self.0.body)(this, args)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> FunctionKind {
        self.0.kind
    }

    /// Properties attached to the function value.
    pub fn props(&self) -> &ObjectRef {
        &self.0.props
    }

    #[inline]
    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// `call`, `apply` and `bind` as seen through member access on a function.
    fn prototype_method(name: &str) -> Option<FunctionRef> {
        let method = match name {
            "call" => FunctionRef::with_kind("call", FunctionKind::CallApplyBind, |this, args| {
                let target = expect_function(this, "call")?;
                match args.split_first() {
                    Some((receiver, rest)) => target.call(receiver, rest),
                    None => target.call(&Value::Undefined, &[]),
                }
            }),
            "apply" => {
                FunctionRef::with_kind("apply", FunctionKind::CallApplyBind, |this, args| {
                    let target = expect_function(this, "apply")?;
                    let receiver = args.first().cloned().unwrap_or_default();
                    let spread = match args.get(1) {
                        Some(Value::Array(items)) => items.to_vec(),
                        _ => Vec::new(),
                    };
                    target.call(&receiver, &spread)
                })
            }
            "bind" => FunctionRef::with_kind("bind", FunctionKind::CallApplyBind, |this, args| {
                let target = expect_function(this, "bind")?;
                let receiver = args.first().cloned().unwrap_or_default();
                let bound = args.get(1..).map(<[Value]>::to_vec).unwrap_or_default();
                let name = format!("bound {}", target.name());
                Ok(Value::Function(FunctionRef::new(name, move |_, rest| {
                    let mut all = bound.clone();
                    all.extend_from_slice(rest);
                    target.call(&receiver, &all)
                })))
            }),
            _ => return None,
        };
        Some(method)
    }
}

fn expect_function(value: &Value, method: &str) -> Result<FunctionRef> {
    match value {
        Value::Function(f) => Ok(f.clone()),
        other => Err(Error::type_error(format!(
            "Function.prototype.{method} called on {}",
            other.type_of()
        ))),
    }
}

// Host

/// Opaque host object (a scope, a parser, any Rust service).
#[derive(Clone)]
pub struct HostRef {
    type_name: &'static str,
    inner: Rc<dyn Any>,
}

impl HostRef {
    pub fn new<T: Any>(value: T) -> Self {
        Self::from_rc(Rc::new(value))
    }

    pub fn from_rc<T: Any>(value: Rc<T>) -> Self {
        HostRef {
            type_name: std::any::type_name::<T>(),
            inner: value,
        }
    }

    /// Recover the concrete host type.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.inner).downcast::<T>().ok()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner).cast::<()>() as usize
    }
}

// Value

impl Value {
    /// Object value from key/value pairs.
    pub fn object<K: Into<Rc<str>>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(ObjectRef::from_pairs(pairs))
    }

    /// Array value.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::from_vec(items))
    }

    /// Ordinary function value.
    pub fn function(
        name: impl Into<Rc<str>>,
        body: impl Fn(&Value, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Value::Function(FunctionRef::new(name, body))
    }

    /// Host value wrapping a Rust object.
    pub fn host<T: Any>(value: T) -> Self {
        Value::Host(HostRef::new(value))
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        !self.is_undefined()
    }

    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    /// True for arrays, objects, functions and host values.
    pub fn is_compound(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Host(_)
        )
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Downcast a host value.
    pub fn as_host<T: Any>(&self) -> Option<Rc<T>> {
        match self {
            Value::Host(h) => h.downcast::<T>(),
            _ => None,
        }
    }

    /// `typeof` classification.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Host(_) => "object",
        }
    }

    /// Truthiness used by `!`, `&&`, `||` and `?:`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Host(_) => true,
        }
    }

    /// Numeric conversion used by arithmetic and relational operators.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_display_string()),
            Value::Object(_) | Value::Function(_) | Value::Host(_) => f64::NAN,
        }
    }

    /// String conversion used by `+` concatenation and filters.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(f) => format!("function {}()", f.name()),
            Value::Host(h) => format!("[host {}]", h.type_name()),
        }
    }

    /// Read a property the way member expressions do.
    ///
    /// Strings and arrays expose `length` and numeric indices; functions
    /// expose their property bag plus `call`, `apply`, `bind` and `name`.
    /// Anything else reads as `undefined`.
    pub fn get_member(&self, key: &str) -> Value {
        match self {
            Value::Object(obj) => obj.get(key),
            Value::Array(items) => {
                if key == "length" {
                    return Value::from(items.len());
                }
                parse_index(key).map_or(Value::Undefined, |i| items.get(i))
            }
            Value::String(s) => {
                if key == "length" {
                    return Value::from(s.chars().count());
                }
                parse_index(key)
                    .and_then(|i| s.chars().nth(i))
                    .map_or(Value::Undefined, |c| Value::from(c.to_string()))
            }
            Value::Function(f) => {
                if let Some(value) = f.props().lookup(key) {
                    return value;
                }
                if key == "name" {
                    return Value::from(f.name());
                }
                FunctionRef::prototype_method(key).map_or(Value::Undefined, Value::Function)
            }
            _ => Value::Undefined,
        }
    }

    /// True if `key` is readable on this value.
    pub fn has_member(&self, key: &str) -> bool {
        match self {
            Value::Object(obj) => obj.has(key),
            Value::Function(f) => f.props().has(key),
            Value::Array(_) | Value::String(_) => !self.get_member(key).is_undefined(),
            _ => false,
        }
    }

    /// Write a property the way assignment expressions do.
    pub fn set_member(&self, key: &str, value: Value) -> Result<()> {
        match self {
            Value::Object(obj) => {
                obj.set(key, value);
                Ok(())
            }
            Value::Array(items) => {
                if key == "length" {
                    let len = value.to_number();
                    if len.is_finite() && len >= 0.0 {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        items.truncate(len as usize);
                        return Ok(());
                    }
                }
                match parse_index(key) {
                    Some(index) => {
                        items.set(index, value);
                        Ok(())
                    }
                    None => Err(Error::type_error(format!(
                        "Cannot set property '{key}' of array"
                    ))),
                }
            }
            Value::Function(f) => {
                f.props().set(key, value);
                Ok(())
            }
            other => Err(Error::type_error(format!(
                "Cannot set property '{key}' of {}",
                other.type_of()
            ))),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => self.same_identity(other),
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(a), Value::String(_)) => *a == other.to_number(),
            (Value::String(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (a, b) if a.is_compound() && !b.is_compound() => {
                Value::from(a.to_display_string()).loose_equals(b)
            }
            (a, b) if !a.is_compound() && b.is_compound() => {
                a.loose_equals(&Value::from(b.to_display_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Identity comparison used by dirty checking: `===` except `NaN`
    /// equals `NaN`.
    pub fn same_value(&self, other: &Value) -> bool {
        self.strict_equals(other) || (self.is_nan() && other.is_nan())
    }

    fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Host(a), Value::Host(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Structural equality.
    ///
    /// Arrays compare element-wise, objects by own keys. Keys starting with
    /// `$` and function-valued properties are ignored. `NaN` equals `NaN`.
    /// A pair of containers met again while it is still being compared
    /// counts as equal, so cyclic values terminate.
    pub fn deep_equals(&self, other: &Value) -> bool {
        let mut visiting = FxHashSet::default();
        self.equals_in(other, &mut visiting)
    }

    fn equals_in(&self, other: &Value, visiting: &mut FxHashSet<(usize, usize)>) -> bool {
        if self.same_value(other) {
            return true;
        }
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                if !visiting.insert((a.addr(), b.addr())) {
                    return true;
                }
                let (left, right) = (a.to_vec(), b.to_vec());
                let equal = left.len() == right.len()
                    && left.iter().zip(&right).all(|(x, y)| x.equals_in(y, visiting));
                visiting.remove(&(a.addr(), b.addr()));
                equal
            }
            (Value::Object(a), Value::Object(b)) => {
                if !visiting.insert((a.addr(), b.addr())) {
                    return true;
                }
                let relevant = |obj: &ObjectRef| {
                    obj.entries()
                        .into_iter()
                        .filter(|(k, v)| !k.starts_with('$') && !matches!(v, Value::Function(_)))
                        .collect::<Vec<_>>()
                };
                let left = relevant(a);
                let right = relevant(b);
                let equal = left.len() == right.len()
                    && left
                        .iter()
                        .all(|(k, v)| b.get_own(k).is_some_and(|w| v.equals_in(&w, visiting)));
                visiting.remove(&(a.addr(), b.addr()));
                equal
            }
            _ => false,
        }
    }

    /// Deep copy of arrays and objects; other values are shared.
    ///
    /// Cycles are preserved: an object reachable twice is copied once.
    /// Copied objects keep the original prototype link.
    pub fn deep_copy(&self) -> Value {
        let mut seen = FxHashMap::default();
        self.copy_into(&mut seen)
    }

    fn copy_into(&self, seen: &mut FxHashMap<usize, Value>) -> Value {
        match self {
            Value::Array(items) => {
                if let Some(copy) = seen.get(&items.addr()) {
                    return copy.clone();
                }
                let copy = ArrayRef::new();
                seen.insert(items.addr(), Value::Array(copy.clone()));
                for item in items.to_vec() {
                    copy.push(item.copy_into(seen));
                }
                Value::Array(copy)
            }
            Value::Object(obj) => {
                if let Some(copy) = seen.get(&obj.addr()) {
                    return copy.clone();
                }
                let copy = ObjectRef::with_proto(obj.proto());
                seen.insert(obj.addr(), Value::Object(copy.clone()));
                for (key, value) in obj.entries() {
                    copy.set(key, value.copy_into(seen));
                }
                Value::Object(copy)
            }
            other => other.clone(),
        }
    }

    /// JSON serialization.
    ///
    /// `undefined` and function properties are omitted, keys starting with
    /// `$$` are skipped, non-finite numbers render as `null`. `indent` of
    /// zero renders compactly.
    pub fn to_json(&self, indent: usize) -> Result<String> {
        let mut out = String::new();
        let mut stack = Vec::new();
        self.write_json(&mut out, indent, 0, &mut stack)?;
        Ok(out)
    }

    fn write_json(
        &self,
        out: &mut String,
        indent: usize,
        depth: usize,
        stack: &mut Vec<usize>,
    ) -> Result<()> {
        let newline = |out: &mut String, level: usize| {
            if indent > 0 {
                out.push('\n');
                out.push_str(&" ".repeat(indent * level));
            }
        };
        match self {
            Value::Undefined | Value::Function(_) | Value::Host(_) | Value::Null => {
                out.push_str("null");
            }
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) if n.is_finite() => out.push_str(&format_number(*n)),
            Value::Number(_) => out.push_str("null"),
            Value::String(s) => write_json_string(out, s),
            Value::Array(items) => {
                if stack.contains(&items.addr()) {
                    return Err(Error::type_error("Converting circular structure to JSON"));
                }
                stack.push(items.addr());
                let items = items.to_vec();
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    newline(out, depth + 1);
                    item.write_json(out, indent, depth + 1, stack)?;
                }
                if !items.is_empty() {
                    newline(out, depth);
                }
                out.push(']');
                stack.pop();
            }
            Value::Object(obj) => {
                if stack.contains(&obj.addr()) {
                    return Err(Error::type_error("Converting circular structure to JSON"));
                }
                stack.push(obj.addr());
                let entries: Vec<_> = obj
                    .entries()
                    .into_iter()
                    .filter(|(k, v)| {
                        !k.starts_with("$$")
                            && !matches!(v, Value::Undefined | Value::Function(_))
                    })
                    .collect();
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    newline(out, depth + 1);
                    write_json_string(out, key);
                    out.push(':');
                    if indent > 0 {
                        out.push(' ');
                    }
                    value.write_json(out, indent, depth + 1, stack)?;
                }
                if !entries.is_empty() {
                    newline(out, depth);
                }
                out.push('}');
                stack.pop();
            }
        }
        Ok(())
    }
}

/// Structural equality (see [`Value::deep_equals`]).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_equals(other)
    }
}

fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse().ok()
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, 'e' | 'E' | '.' | '+' | '-')) =>
        {
            trimmed.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

/// Render a number the way string concatenation does.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let int = n as i64;
        int.to_string()
    } else {
        n.to_string()
    }
}

fn write_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

// Conversions

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<ArrayRef> for Value {
    fn from(items: ArrayRef) -> Self {
        Value::Array(items)
    }
}

impl From<FunctionRef> for Value {
    fn from(f: FunctionRef) -> Self {
        Value::Function(f)
    }
}

impl From<HostRef> for Value {
    fn from(h: HostRef) -> Self {
        Value::Host(h)
    }
}

// Debug

const DEBUG_DEPTH: usize = 4;

struct DebugAt<'a>(&'a Value, usize);

impl fmt::Debug for DebugAt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let DebugAt(value, depth) = *self;
        match value {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Array(_) | Value::Object(_) if depth >= DEBUG_DEPTH => f.write_str("…"),
            Value::Array(items) => f
                .debug_list()
                .entries(items.to_vec().iter().map(|v| DebugAt(v, depth + 1)))
                .finish(),
            Value::Object(obj) => {
                let entries = obj.entries();
                f.debug_map()
                    .entries(entries.iter().map(|(k, v)| (k, DebugAt(v, depth + 1))))
                    .finish()
            }
            Value::Function(func) => write!(f, "function {}()", func.name()),
            Value::Host(h) => write!(f, "Host({})", h.type_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        DebugAt(self, 0).fmt(f)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        DebugAt(&Value::Object(self.clone()), 0).fmt(f)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        DebugAt(&Value::Array(self.clone()), 0).fmt(f)
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}()", self.name())
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Host({})", self.type_name)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}
