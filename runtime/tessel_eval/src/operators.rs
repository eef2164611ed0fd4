//! Operator semantics for compiled expressions.
//!
//! `+`, `-` and the unary operators read an `undefined` operand as `0`: a
//! missing scope property behaves as absent rather than turning the result
//! into `NaN`.

use std::cmp::Ordering;

use tessel_ir::{BinaryOp, UnaryOp, Value};

pub(crate) fn unary(op: UnaryOp, argument: &Value) -> Value {
    match op {
        UnaryOp::Plus => Value::Number(if_defined(argument)),
        UnaryOp::Neg => Value::Number(-if_defined(argument)),
        UnaryOp::Not => Value::Bool(!argument.is_truthy()),
    }
}

pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => plus(left, right),
        BinaryOp::Sub => Value::Number(if_defined(left) - if_defined(right)),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
    }
}

#[inline]
fn if_defined(value: &Value) -> f64 {
    if value.is_undefined() {
        0.0
    } else {
        value.to_number()
    }
}

/// `+` concatenates when either side is a string and adds otherwise. An
/// undefined operand counts as `0`.
fn plus(left: &Value, right: &Value) -> Value {
    let left = defined_or_zero(left);
    let right = defined_or_zero(right);
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        let mut joined = left.to_display_string();
        joined.push_str(&right.to_display_string());
        Value::from(joined)
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

fn defined_or_zero(value: &Value) -> Value {
    if value.is_undefined() {
        Value::Number(0.0)
    } else {
        to_primitive(value)
    }
}

/// Compound values compare and concatenate through their string form.
fn to_primitive(value: &Value) -> Value {
    if value.is_compound() {
        Value::from(value.to_display_string())
    } else {
        value.clone()
    }
}

/// Relational ordering; `None` when either side is `NaN`.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    let left = to_primitive(left);
    let right = to_primitive(right);
    if let (Value::String(a), Value::String(b)) = (&left, &right) {
        return Some(a.cmp(b));
    }
    left.to_number().partial_cmp(&right.to_number())
}
