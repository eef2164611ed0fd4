//! Sandbox guards applied by compiled expressions.
//!
//! Expressions run against application data that may hold references to
//! host capabilities. These checks reject the shapes that would let an
//! expression escape: the global window, DOM nodes, the function
//! constructor, the `Object` constructor and the `call`/`apply`/`bind`
//! trampolines.

use tessel_ir::{Error, FunctionKind, FunctionRef, ObjectRef, Result, Value};

const FORBIDDEN_MEMBERS: &[&str] = &[
    "constructor",
    "__proto__",
    "__defineGetter__",
    "__defineSetter__",
    "__lookupGetter__",
    "__lookupSetter__",
];

/// Reject member names that reach into object internals.
pub fn ensure_safe_member_name(name: &str, expression: &str) -> Result<()> {
    if FORBIDDEN_MEMBERS.contains(&name) {
        return Err(Error::security(format!(
            "Attempting to access a disallowed field in expressions! Field: {name}, Expression: {expression}"
        )));
    }
    Ok(())
}

/// Reject values that expose host capabilities.
pub fn ensure_safe_object(value: &Value, expression: &str) -> Result<()> {
    match value {
        Value::Object(obj) => {
            if is_window(obj) {
                return Err(disallowed("the Window", expression));
            }
            if is_dom_node(obj) {
                return Err(disallowed("DOM nodes", expression));
            }
            if is_object_constructor(obj) {
                return Err(disallowed("Object", expression));
            }
            Ok(())
        }
        Value::Function(func) => {
            if is_function_constructor(func) {
                return Err(disallowed("Function", expression));
            }
            if is_object_constructor(func.props()) {
                return Err(disallowed("Object", expression));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Reject functions that must never be invoked from an expression.
pub fn ensure_safe_function(func: &FunctionRef, expression: &str) -> Result<()> {
    if is_function_constructor(func) {
        return Err(disallowed("Function", expression));
    }
    if func.kind() == FunctionKind::CallApplyBind {
        return Err(disallowed("call, apply or bind", expression));
    }
    Ok(())
}

#[cold]
fn disallowed(what: &str, expression: &str) -> Error {
    Error::security(format!(
        "Referencing {what} in expressions is disallowed! Expression: {expression}"
    ))
}

fn is_window(obj: &ObjectRef) -> bool {
    ["document", "location", "alert", "setInterval"]
        .iter()
        .all(|key| obj.has(key))
}

fn is_dom_node(obj: &ObjectRef) -> bool {
    obj.has("children")
        && (obj.has("nodeName") || (obj.has("prop") && obj.has("attr") && obj.has("find")))
}

fn is_object_constructor(obj: &ObjectRef) -> bool {
    obj.has("getOwnPropertyNames") || obj.has("getOwnPropertyDescriptor")
}

/// The function constructor is its own `constructor`.
fn is_function_constructor(func: &FunctionRef) -> bool {
    if func.kind() == FunctionKind::FunctionConstructor {
        return true;
    }
    matches!(func.props().get_own("constructor"), Some(Value::Function(ctor)) if ctor.ptr_eq(func))
}
