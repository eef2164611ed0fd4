//! Injectable functions: a callable plus its explicit dependency tokens.

use std::fmt;
use std::rc::Rc;

use tessel_ir::{Error, FunctionRef, ObjectRef, Result, Value};

/// A function the injector can call, with the keys of its dependencies.
///
/// Dependencies are always declared; nothing is inferred from parameter
/// names. Tokens are kept as values so a non-string token is reported when
/// the function is annotated rather than when it is declared.
#[derive(Clone)]
pub struct Injectable {
    deps: Option<Vec<Value>>,
    func: FunctionRef,
}

impl Injectable {
    /// Injectable ignoring `this`.
    pub fn new(deps: &[&str], body: impl Fn(&[Value]) -> Result<Value> + 'static) -> Self {
        Self::method(deps, move |_, args| body(args))
    }

    /// Injectable receiving `this` (the provider for `$get`, the fresh
    /// instance for constructors).
    pub fn method(
        deps: &[&str],
        body: impl Fn(&Value, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Injectable {
            deps: Some(deps.iter().map(|dep| Value::from(*dep)).collect()),
            func: FunctionRef::new("injectable", body),
        }
    }

    /// Injectable without an annotation. Rejected by strict injectors,
    /// called with no arguments otherwise.
    pub fn unannotated(body: impl Fn(&Value, &[Value]) -> Result<Value> + 'static) -> Self {
        Injectable {
            deps: None,
            func: FunctionRef::new("injectable", body),
        }
    }

    /// Injectable from raw token values; `None` leaves it unannotated.
    pub fn from_parts(deps: Option<Vec<Value>>, func: FunctionRef) -> Self {
        Injectable { deps, func }
    }

    /// Prototype given to objects created by `instantiate`.
    #[must_use]
    pub fn with_prototype(self, prototype: ObjectRef) -> Self {
        self.func.props().set("prototype", Value::Object(prototype));
        self
    }

    /// Read an injectable from its value form.
    ///
    /// Accepts an array `["a", "b", fn]`, a function carrying an `$inject`
    /// array property, or a bare (unannotated) function.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => {
                let mut items = items.to_vec();
                let Some(Value::Function(func)) = items.pop() else {
                    return Err(not_a_function(value));
                };
                Ok(Injectable {
                    deps: Some(items),
                    func,
                })
            }
            Value::Function(func) => {
                let deps = match func.props().get_own("$inject") {
                    Some(Value::Array(tokens)) => Some(tokens.to_vec()),
                    _ => None,
                };
                Ok(Injectable {
                    deps,
                    func: func.clone(),
                })
            }
            other => Err(not_a_function(other)),
        }
    }

    /// Value form: array-style when annotated, the bare function otherwise.
    pub fn to_value(&self) -> Value {
        match &self.deps {
            Some(deps) => {
                let mut items = deps.clone();
                items.push(Value::Function(self.func.clone()));
                Value::array(items)
            }
            None => Value::Function(self.func.clone()),
        }
    }

    /// Declared tokens, `None` when unannotated.
    pub fn tokens(&self) -> Option<&[Value]> {
        self.deps.as_deref()
    }

    pub fn function(&self) -> &FunctionRef {
        &self.func
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        match self.func.props().get_own("prototype") {
            Some(Value::Object(proto)) => Some(proto),
            _ => None,
        }
    }

    /// Validated dependency keys.
    pub(crate) fn keys(&self, strict: bool) -> Result<Vec<Rc<str>>> {
        let Some(deps) = &self.deps else {
            if strict {
                return Err(Error::Injection(format!(
                    "function '{}' is not using explicit annotation and cannot be invoked in strict mode",
                    self.func.name()
                )));
            }
            return Ok(Vec::new());
        };
        deps.iter()
            .map(|token| match token {
                Value::String(key) => Ok(Rc::clone(key)),
                other => Err(Error::Injection(format!(
                    "Incorrect injection token! Expected service name as string, got {}",
                    other.to_display_string()
                ))),
            })
            .collect()
    }

    pub(crate) fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        self.func.call(this, args)
    }
}

#[cold]
fn not_a_function(value: &Value) -> Error {
    Error::Injection(format!(
        "Argument 'fn' is not a function, got {}",
        value.type_of()
    ))
}

impl fmt::Debug for Injectable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injectable")
            .field("deps", &self.deps)
            .field("func", &self.func.name())
            .finish()
    }
}
