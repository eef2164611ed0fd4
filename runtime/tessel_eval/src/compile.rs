//! Tree-walking expression compiler.
//!
//! Each AST node becomes a closure once, at compile time; evaluation is a
//! call through the closure tree with no further dispatch on node kinds.
//! Member names, filters and constant computed keys are resolved while
//! compiling, so their errors surface from `compile`.
//!
//! Every closure that calls into its children runs under
//! `ensure_sufficient_stack`, so evaluation depth is bounded by memory
//! rather than by the thread stack.

use std::rc::Rc;

use tessel_ir::{Ast, Error, ExprId, ExprKind, PropertyKey, Result, Value};
use tessel_stack::ensure_sufficient_stack;

use crate::expression::{AssignFn, EvalFn, InputFn};
use crate::{operators, sandbox, FilterRegistry};

/// Resolved location of an identifier or member access.
struct Reference {
    base: Value,
    name: Rc<str>,
    value: Value,
}

type RefFn = Rc<dyn Fn(&Value, &Value) -> Result<Reference>>;

/// Auto-vivification mode for assignment targets.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Create {
    No,
    /// Final step of an assignment target: resolve but do not create.
    Target,
    /// Intermediate step: create an empty object if the slot is nullish.
    Path,
}

/// Output of [`compile`].
pub struct Compiled {
    pub eval: EvalFn,
    pub assign: Option<AssignFn>,
    pub inputs: Vec<InputFn>,
    pub constant: bool,
    pub literal: bool,
}

/// Compile an analyzed AST.
pub fn compile(ast: &Ast, text: &str, filters: &FilterRegistry) -> Result<Compiled> {
    let compiler = Compiler {
        ast,
        text: Rc::from(text),
        filters,
    };

    let statements = ast
        .body
        .iter()
        .map(|&id| compiler.value(id))
        .collect::<Result<Vec<_>>>()?;
    let eval: EvalFn = match statements.len() {
        0 => Rc::new(|_, _| Ok(Value::Undefined)),
        1 => Rc::clone(&statements[0]),
        _ => Rc::new(move |scope, locals| {
            let mut last = Value::Undefined;
            for statement in &statements {
                last = statement(scope, locals)?;
            }
            Ok(last)
        }),
    };

    let assign = if ast.is_assignable() {
        Some(compiler.assign_fn(ast.body[0])?)
    } else {
        None
    };

    let inputs = compiler
        .input_ids()
        .into_iter()
        .map(|id| compiler.value(id).map(InputFn))
        .collect::<Result<Vec<_>>>()?;

    Ok(Compiled {
        eval,
        assign,
        inputs,
        constant: ast.is_constant(),
        literal: ast.is_literal(),
    })
}

struct Compiler<'a> {
    ast: &'a Ast,
    text: Rc<str>,
    filters: &'a FilterRegistry,
}

impl Compiler<'_> {
    /// Sub-expressions worth watching separately; empty when the sole
    /// statement can only be watched as a whole.
    fn input_ids(&self) -> Vec<ExprId> {
        let [only] = self.ast.body.as_slice() else {
            return Vec::new();
        };
        let to_watch = &self.ast.arena.get_expr(*only).to_watch;
        if to_watch.len() == 1 && to_watch[0] == *only {
            return Vec::new();
        }
        to_watch.to_vec()
    }

    fn value(&self, id: ExprId) -> Result<EvalFn> {
        ensure_sufficient_stack(|| self.value_in(id, Create::No)).map(guarded)
    }

    fn value_in(&self, id: ExprId, create: Create) -> Result<EvalFn> {
        let text = Rc::clone(&self.text);
        Ok(match self.ast.arena.kind(id) {
            ExprKind::Literal(value) => {
                let value = value.clone();
                Rc::new(move |_, _| Ok(value.clone()))
            }
            ExprKind::Identifier(_) | ExprKind::Member { .. } => {
                let reference = self.reference(id, create)?;
                Rc::new(move |scope, locals| Ok(reference(scope, locals)?.value))
            }
            ExprKind::This => Rc::new(|scope, _| Ok(scope.clone())),
            ExprKind::Locals => Rc::new(|_, locals| Ok(locals.clone())),
            ExprKind::Array(elements) => {
                let elements = self.values(elements)?;
                Rc::new(move |scope, locals| {
                    ensure_sufficient_stack(|| {
                        let items = elements
                            .iter()
                            .map(|element| element(scope, locals))
                            .collect::<Result<Vec<_>>>()?;
                        Ok(Value::array(items))
                    })
                })
            }
            ExprKind::Object(properties) => self.object(properties)?,
            ExprKind::Call {
                callee,
                args,
                filter: true,
            } => self.filter_call(*callee, args)?,
            ExprKind::Call {
                callee,
                args,
                filter: false,
            } => self.call(*callee, args)?,
            ExprKind::Assign { target, value } => {
                let target = self.reference(*target, Create::Target)?;
                let value = self.value(*value)?;
                Rc::new(move |scope, locals| {
                    ensure_sufficient_stack(|| {
                        let reference = target(scope, locals)?;
                        let value = value(scope, locals)?;
                        store(&reference.base, &reference.name, value, &text)
                    })
                })
            }
            ExprKind::Unary { op, argument } => {
                let op = *op;
                let argument = self.value(*argument)?;
                Rc::new(move |scope, locals| {
                    ensure_sufficient_stack(|| Ok(operators::unary(op, &argument(scope, locals)?)))
                })
            }
            ExprKind::Binary { op, left, right } => {
                let op = *op;
                let left = self.value(*left)?;
                let right = self.value(*right)?;
                Rc::new(move |scope, locals| {
                    ensure_sufficient_stack(|| {
                        let left = left(scope, locals)?;
                        let right = right(scope, locals)?;
                        Ok(operators::binary(op, &left, &right))
                    })
                })
            }
            ExprKind::Logical { op, left, right } => {
                let and = matches!(op, tessel_ir::LogicalOp::And);
                let left = self.value(*left)?;
                let right = self.value(*right)?;
                Rc::new(move |scope, locals| {
                    ensure_sufficient_stack(|| {
                        let left = left(scope, locals)?;
                        if left.is_truthy() == and {
                            right(scope, locals)
                        } else {
                            Ok(left)
                        }
                    })
                })
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let test = self.value(*test)?;
                let consequent = self.value(*consequent)?;
                let alternate = self.value(*alternate)?;
                Rc::new(move |scope, locals| {
                    ensure_sufficient_stack(|| {
                        if test(scope, locals)?.is_truthy() {
                            consequent(scope, locals)
                        } else {
                            alternate(scope, locals)
                        }
                    })
                })
            }
        })
    }

    fn values(&self, ids: &[ExprId]) -> Result<Vec<EvalFn>> {
        ids.iter().map(|&id| self.value(id)).collect()
    }

    fn object(&self, properties: &[tessel_ir::Property]) -> Result<EvalFn> {
        enum Key {
            Named(Rc<str>),
            Computed(EvalFn),
        }
        let mut compiled = Vec::with_capacity(properties.len());
        for property in properties {
            let key = match &property.key {
                PropertyKey::Named(name) => Key::Named(Rc::clone(name)),
                PropertyKey::Computed(key) => Key::Computed(self.value(*key)?),
            };
            compiled.push((key, self.value(property.value)?));
        }
        Ok(Rc::new(move |scope, locals| {
            ensure_sufficient_stack(|| {
                let object = tessel_ir::ObjectRef::new();
                for (key, value) in &compiled {
                    let key: Rc<str> = match key {
                        Key::Named(name) => Rc::clone(name),
                        Key::Computed(key) => Rc::from(key(scope, locals)?.to_display_string()),
                    };
                    object.set(key, value(scope, locals)?);
                }
                Ok(Value::Object(object))
            })
        }))
    }

    /// Filters resolve once and are called without sandbox checks.
    fn filter_call(&self, callee: ExprId, args: &[ExprId]) -> Result<EvalFn> {
        let ExprKind::Identifier(name) = self.ast.arena.kind(callee) else {
            return Err(Error::Compile(format!(
                "filter name must be an identifier in [{}]",
                self.text
            )));
        };
        let filter = self.filters.resolve(name)?;
        let args = self.values(args)?;
        Ok(Rc::new(move |scope, locals| {
            ensure_sufficient_stack(|| {
                let values = args
                    .iter()
                    .map(|arg| arg(scope, locals))
                    .collect::<Result<Vec<_>>>()?;
                filter.func.call(&Value::Undefined, &values)
            })
        }))
    }

    /// Ordinary call. Member and identifier callees bind `this` to the
    /// object they were read from.
    fn call(&self, callee: ExprId, args: &[ExprId]) -> Result<EvalFn> {
        let callee: RefFn = match self.ast.arena.kind(callee) {
            ExprKind::Identifier(_) | ExprKind::Member { .. } => {
                self.reference(callee, Create::No)?
            }
            _ => {
                let value = self.value(callee)?;
                Rc::new(move |scope, locals| {
                    Ok(Reference {
                        base: Value::Undefined,
                        name: Rc::from(""),
                        value: value(scope, locals)?,
                    })
                })
            }
        };
        let args = self.values(args)?;
        let text = Rc::clone(&self.text);
        Ok(Rc::new(move |scope, locals| {
            ensure_sufficient_stack(|| {
                let target = callee(scope, locals)?;
                if target.value.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let Value::Function(func) = &target.value else {
                    return Err(Error::type_error(format!(
                        "{} is not a function in expression [{text}]",
                        target.value.type_of()
                    )));
                };
                sandbox::ensure_safe_function(func, &text)?;
                sandbox::ensure_safe_object(&target.base, &text)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in &args {
                    let value = arg(scope, locals)?;
                    sandbox::ensure_safe_object(&value, &text)?;
                    values.push(value);
                }
                let result = func.call(&target.base, &values)?;
                sandbox::ensure_safe_object(&result, &text)?;
                Ok(result)
            })
        }))
    }

    /// Resolve an identifier or member access to its base object and name.
    fn reference(&self, id: ExprId, create: Create) -> Result<RefFn> {
        let text = Rc::clone(&self.text);
        match self.ast.arena.kind(id) {
            ExprKind::Identifier(name) => {
                sandbox::ensure_safe_member_name(name, &text)?;
                let name = Rc::clone(name);
                Ok(Rc::new(move |scope, locals| {
                    let base = if locals.has_member(&name) {
                        locals.clone()
                    } else {
                        scope.clone()
                    };
                    resolve(base, Rc::clone(&name), create, &text)
                }))
            }
            ExprKind::Member {
                object,
                property,
                computed,
            } => {
                let object_create = if create == Create::No {
                    Create::No
                } else {
                    Create::Path
                };
                let object =
                    ensure_sufficient_stack(|| self.value_in(*object, object_create)).map(guarded)?;
                if *computed {
                    if let ExprKind::Literal(key) = self.ast.arena.kind(*property) {
                        sandbox::ensure_safe_member_name(&key.to_display_string(), &text)?;
                    }
                    let property = self.value(*property)?;
                    Ok(Rc::new(move |scope, locals| {
                        ensure_sufficient_stack(|| {
                            let base = object(scope, locals)?;
                            let key = property(scope, locals)?.to_display_string();
                            sandbox::ensure_safe_member_name(&key, &text)?;
                            resolve(base, Rc::from(key), create, &text)
                        })
                    }))
                } else {
                    let ExprKind::Identifier(name) = self.ast.arena.kind(*property) else {
                        return Err(Error::Compile(format!(
                            "member name must be an identifier in [{text}]"
                        )));
                    };
                    sandbox::ensure_safe_member_name(name, &text)?;
                    let name = Rc::clone(name);
                    Ok(Rc::new(move |scope, locals| {
                        ensure_sufficient_stack(|| {
                            let base = object(scope, locals)?;
                            resolve(base, Rc::clone(&name), create, &text)
                        })
                    }))
                }
            }
            other => Err(Error::Compile(format!(
                "cannot take a reference to {other:?} in [{text}]"
            ))),
        }
    }

    /// `expression.assign(scope, value)` for an assignable program.
    fn assign_fn(&self, id: ExprId) -> Result<AssignFn> {
        let target = self.reference(id, Create::Target)?;
        let text = Rc::clone(&self.text);
        Ok(Rc::new(move |scope, value, locals| {
            let reference = target(scope, locals)?;
            store(&reference.base, &reference.name, value, &text)
        }))
    }
}

/// Owns one compiled child. Releasing a closure tree recurses once per
/// nesting level, the same as evaluating it, so the release is guarded too.
struct Node(Option<EvalFn>);

impl Drop for Node {
    fn drop(&mut self) {
        if let Some(eval) = self.0.take() {
            ensure_sufficient_stack(move || drop(eval));
        }
    }
}

fn guarded(eval: EvalFn) -> EvalFn {
    let node = Node(Some(eval));
    Rc::new(move |scope, locals| match &node.0 {
        Some(eval) => eval(scope, locals),
        None => Ok(Value::Undefined),
    })
}

/// Read `base[name]`, creating an empty object first in path mode.
fn resolve(base: Value, name: Rc<str>, create: Create, text: &str) -> Result<Reference> {
    if create == Create::Path {
        if let Value::Object(object) = &base {
            if object.get(&name).is_nullish() {
                object.set(Rc::clone(&name), Value::Object(tessel_ir::ObjectRef::new()));
            }
        }
    }
    let value = if base.is_nullish() {
        Value::Undefined
    } else {
        base.get_member(&name)
    };
    sandbox::ensure_safe_object(&value, text)?;
    Ok(Reference { base, name, value })
}

fn store(base: &Value, name: &str, value: Value, text: &str) -> Result<Value> {
    sandbox::ensure_safe_object(&value, text)?;
    if base.is_nullish() {
        return Err(Error::type_error(format!(
            "Cannot set property '{name}' of {} in expression [{text}]",
            base.type_of()
        )));
    }
    base.set_member(name, value.clone())?;
    Ok(value)
}
