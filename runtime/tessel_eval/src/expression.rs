//! Compiled expressions.

use std::fmt;
use std::rc::Rc;

use tessel_ir::{Error, Result, Value};

/// Evaluator closure: `(scope, locals) -> value`. Absent locals are `undefined`.
pub type EvalFn = Rc<dyn Fn(&Value, &Value) -> Result<Value>>;

/// Assignment closure: `(scope, value, locals) -> value`.
pub type AssignFn = Rc<dyn Fn(&Value, Value, &Value) -> Result<Value>>;

/// Strategy a scope uses to watch an expression.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum WatchDelegate {
    /// Ordinary dirty check every digest pass.
    None,
    /// Value can never change: notify once, then stop watching.
    Constant,
    /// `::expr`: stop watching once a defined value survives a digest.
    OneTime,
    /// `::[...]` or `::{...}`: stop once every element is defined.
    OneTimeLiteral,
    /// Re-evaluate only when one of the input sub-expressions changes.
    Inputs,
}

/// Evaluator for one watch input of a compound expression.
#[derive(Clone)]
pub struct InputFn(pub(crate) EvalFn);

impl InputFn {
    pub fn evaluate(&self, scope: &Value, locals: Option<&Value>) -> Result<Value> {
        (self.0)(scope, locals.unwrap_or(&Value::Undefined))
    }
}

pub(crate) struct ExpressionData {
    pub(crate) source: Rc<str>,
    pub(crate) eval: EvalFn,
    pub(crate) assign: Option<AssignFn>,
    pub(crate) inputs: Vec<InputFn>,
    pub(crate) constant: bool,
    pub(crate) literal: bool,
    pub(crate) one_time: bool,
    pub(crate) delegate: WatchDelegate,
}

/// A parsed, analyzed and compiled expression. Clones share the evaluator.
#[derive(Clone)]
pub struct Expression(pub(crate) Rc<ExpressionData>);

impl Expression {
    /// Wrap a native closure so it can be watched like a parsed expression.
    pub fn from_fn(func: impl Fn(&Value, &Value) -> Result<Value> + 'static) -> Self {
        Expression(Rc::new(ExpressionData {
            source: Rc::from("<native>"),
            eval: Rc::new(func),
            assign: None,
            inputs: Vec::new(),
            constant: false,
            literal: false,
            one_time: false,
            delegate: WatchDelegate::None,
        }))
    }

    /// Evaluate against `scope`, resolving names in `locals` first.
    pub fn evaluate(&self, scope: &Value, locals: Option<&Value>) -> Result<Value> {
        (self.0.eval)(scope, locals.unwrap_or(&Value::Undefined))
    }

    /// Store `value` at the location the expression names.
    pub fn assign(&self, scope: &Value, value: Value, locals: Option<&Value>) -> Result<Value> {
        match &self.0.assign {
            Some(assign) => assign(scope, value, locals.unwrap_or(&Value::Undefined)),
            None => Err(Error::type_error(format!(
                "Expression '{}' is not assignable",
                self.0.source
            ))),
        }
    }

    pub fn is_assignable(&self) -> bool {
        self.0.assign.is_some()
    }

    pub fn is_constant(&self) -> bool {
        self.0.constant
    }

    pub fn is_literal(&self) -> bool {
        self.0.literal
    }

    pub fn is_one_time(&self) -> bool {
        self.0.one_time
    }

    pub fn inputs(&self) -> &[InputFn] {
        &self.0.inputs
    }

    pub fn watch_delegate(&self) -> WatchDelegate {
        self.0.delegate
    }

    /// Source text (without the `::` prefix).
    pub fn source(&self) -> &str {
        &self.0.source
    }

    pub fn ptr_eq(&self, other: &Expression) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.0.source)
            .field("constant", &self.0.constant)
            .field("literal", &self.0.literal)
            .field("one_time", &self.0.one_time)
            .field("inputs", &self.0.inputs.len())
            .field("delegate", &self.0.delegate)
            .finish()
    }
}
