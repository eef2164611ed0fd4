//! Watch registration: plain watchers, expression delegates and groups.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tessel_eval::{Expression, InputFn, WatchDelegate};
use tessel_ir::{ArrayRef, Result, Value};
use tracing::{trace, warn};

use crate::scope::{Scope, ScopeExpr, ScopeInner};

/// Watcher identity, unique within one tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

/// Watch function: computes the watched value from the scope.
pub type WatchFn = dyn Fn(&Scope) -> Result<Value>;

/// Listener: `(new, old, scope)`. On the first call `old` is `new`.
pub type ListenerFn = dyn Fn(&Value, &Value, &Scope) -> Result<()>;

pub(crate) struct Watcher {
    pub(crate) id: WatchId,
    pub(crate) watch_fn: Box<WatchFn>,
    pub(crate) listener: Box<ListenerFn>,
    pub(crate) value_eq: bool,
    /// `None` until the first evaluation.
    pub(crate) last: RefCell<Option<Value>>,
    pub(crate) removed: Cell<bool>,
}

/// Deregistration handle returned by the watch family.
///
/// Dropping the handle keeps the watch alive; call
/// [`deregister`](Self::deregister) to remove it. Deregistering twice is a
/// no-op.
#[derive(Clone, Default)]
pub struct WatchHandle {
    targets: Vec<(Weak<ScopeInner>, WatchId)>,
    on_deregister: Option<Rc<dyn Fn()>>,
}

impl WatchHandle {
    fn single(scope: &Scope, id: WatchId) -> Self {
        WatchHandle {
            targets: vec![(Rc::downgrade(&scope.0), id)],
            on_deregister: None,
        }
    }

    fn callback(func: impl Fn() + 'static) -> Self {
        WatchHandle {
            targets: Vec::new(),
            on_deregister: Some(Rc::new(func)),
        }
    }

    fn merge(&mut self, other: WatchHandle) {
        self.targets.extend(other.targets);
    }

    fn first_id(&self) -> Option<WatchId> {
        self.targets.first().map(|(_, id)| *id)
    }

    /// Whether the handle refers to nothing (registration on a destroyed
    /// scope).
    pub fn is_inert(&self) -> bool {
        self.targets.is_empty() && self.on_deregister.is_none()
    }

    pub fn deregister(&self) {
        for (scope, id) in &self.targets {
            if let Some(inner) = scope.upgrade() {
                Scope(inner).remove_watcher(*id);
            }
        }
        if let Some(func) = &self.on_deregister {
            func();
        }
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<WatchId> = self.targets.iter().map(|(_, id)| *id).collect();
        f.debug_struct("WatchHandle").field("ids", &ids).finish()
    }
}

/// Whether a one-time value has settled.
fn is_settled(value: &Value, literal: bool) -> bool {
    if !literal {
        return value.is_defined();
    }
    match value {
        Value::Array(items) => items.to_vec().iter().all(Value::is_defined),
        Value::Object(obj) => obj.entries().iter().all(|(_, v)| v.is_defined()),
        other => other.is_defined(),
    }
}

/// Whether an input kept its value. Compound inputs always count as changed
/// since their contents may have been mutated in place.
fn input_unchanged(new_value: &Value, old_value: Option<&Value>) -> bool {
    match old_value {
        Some(old) if !new_value.is_compound() => new_value.same_value(old),
        _ => false,
    }
}

impl Scope {
    /// Register a watcher.
    ///
    /// Each digest pass evaluates `watch_fn` and calls `listener` when the
    /// result differs from the previous one, by identity or, with `value_eq`,
    /// structurally. On a destroyed scope the registration is ignored and an
    /// inert handle is returned.
    pub fn watch(
        &self,
        watch_fn: impl Fn(&Scope) -> Result<Value> + 'static,
        listener: impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static,
        value_eq: bool,
    ) -> WatchHandle {
        match self.add_watcher(Box::new(watch_fn), Box::new(listener), value_eq) {
            Some(id) => WatchHandle::single(self, id),
            None => WatchHandle::default(),
        }
    }

    /// Watch a compiled expression, using its watch delegate.
    pub fn watch_expression(
        &self,
        expr: &Expression,
        listener: impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static,
        value_eq: bool,
    ) -> WatchHandle {
        match expr.watch_delegate() {
            WatchDelegate::None => {
                let expr = expr.clone();
                self.watch(
                    move |scope| expr.evaluate(&scope.value(), None),
                    listener,
                    value_eq,
                )
            }
            WatchDelegate::Constant => self.watch_constant(expr, listener, value_eq),
            WatchDelegate::OneTime => self.watch_one_time(expr, listener, value_eq, false),
            WatchDelegate::OneTimeLiteral => self.watch_one_time(expr, listener, true, true),
            WatchDelegate::Inputs => self.watch_inputs(expr, listener, value_eq),
        }
    }

    /// Parse `text` and watch it.
    pub fn watch_str(
        &self,
        text: &str,
        listener: impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static,
        value_eq: bool,
    ) -> Result<WatchHandle> {
        let expr = self.parser().parse(text)?;
        Ok(self.watch_expression(&expr, listener, value_eq))
    }

    /// Number of watchers in this subtree.
    pub fn count_watchers(&self) -> usize {
        let own = self.0.watchers.borrow().len();
        let children = self.children();
        own + children.iter().map(Scope::count_watchers).sum::<usize>()
    }

    pub(crate) fn add_watcher(
        &self,
        watch_fn: Box<WatchFn>,
        listener: Box<ListenerFn>,
        value_eq: bool,
    ) -> Option<WatchId> {
        if self.is_destroyed() {
            warn!(scope = %self.id(), "watch on destroyed scope ignored");
            return None;
        }
        let id = self.0.state.next_watch_id();
        let watcher = Rc::new(Watcher {
            id,
            watch_fn,
            listener,
            value_eq,
            last: RefCell::new(None),
            removed: Cell::new(false),
        });
        self.0.watchers.borrow_mut().insert(0, watcher);
        self.0.state.last_dirty.set(None);
        trace!(scope = %self.id(), watch = id.0, "watch registered");
        Some(id)
    }

    pub(crate) fn remove_watcher(&self, id: WatchId) -> bool {
        let removed = {
            let mut watchers = self.0.watchers.borrow_mut();
            watchers
                .iter()
                .position(|w| w.id == id)
                .map(|index| watchers.remove(index))
        };
        match removed {
            Some(watcher) => {
                watcher.removed.set(true);
                self.0.state.last_dirty.set(None);
                true
            }
            None => false,
        }
    }

    fn watch_constant(
        &self,
        expr: &Expression,
        listener: impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static,
        value_eq: bool,
    ) -> WatchHandle {
        let slot: Rc<Cell<Option<WatchId>>> = Rc::default();
        let own_slot = Rc::clone(&slot);
        let expr = expr.clone();
        let handle = self.watch(
            move |scope| {
                if let Some(id) = own_slot.take() {
                    scope.remove_watcher(id);
                }
                expr.evaluate(&scope.value(), None)
            },
            listener,
            value_eq,
        );
        slot.set(handle.first_id());
        handle
    }

    fn watch_one_time(
        &self,
        expr: &Expression,
        listener: impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static,
        value_eq: bool,
        literal: bool,
    ) -> WatchHandle {
        let slot: Rc<Cell<Option<WatchId>>> = Rc::default();
        let last: Rc<RefCell<Value>> = Rc::default();
        let own_slot = Rc::clone(&slot);
        let expr = expr.clone();
        let handle = self.watch(
            move |scope| expr.evaluate(&scope.value(), None),
            move |value, old, scope| {
                *last.borrow_mut() = value.clone();
                listener(value, old, scope)?;
                if is_settled(value, literal) {
                    let last = Rc::clone(&last);
                    let slot = Rc::clone(&own_slot);
                    let owner = scope.clone();
                    scope.post_digest(move || {
                        if is_settled(&last.borrow(), literal) {
                            if let Some(id) = slot.take() {
                                owner.remove_watcher(id);
                            }
                        }
                        Ok(())
                    });
                }
                Ok(())
            },
            value_eq,
        );
        slot.set(handle.first_id());
        handle
    }

    fn watch_inputs(
        &self,
        expr: &Expression,
        listener: impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static,
        value_eq: bool,
    ) -> WatchHandle {
        let inputs: Vec<InputFn> = expr.inputs().to_vec();
        let old_inputs: RefCell<Vec<Option<Value>>> = RefCell::new(vec![None; inputs.len()]);
        let result = RefCell::new(Value::Undefined);
        let expr = expr.clone();
        self.watch(
            move |scope| {
                let model = scope.value();
                let mut changed = false;
                for (index, input) in inputs.iter().enumerate() {
                    let value = input.evaluate(&model, None)?;
                    let unchanged = input_unchanged(&value, old_inputs.borrow()[index].as_ref());
                    if !unchanged {
                        changed = true;
                        old_inputs.borrow_mut()[index] = Some(value);
                    }
                }
                if changed {
                    let value = expr.evaluate(&model, None)?;
                    *result.borrow_mut() = value;
                }
                Ok(result.borrow().clone())
            },
            listener,
            value_eq,
        )
    }

    /// Watch several expressions with one listener receiving arrays of new
    /// and old values.
    ///
    /// The listener runs at most once per digest pass, via `eval_async`. On
    /// its first run both arguments are the same array. With no expressions
    /// the listener is scheduled once with empty arrays unless the handle is
    /// deregistered first.
    pub fn watch_group(
        &self,
        exprs: &[Expression],
        listener: impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static,
    ) -> WatchHandle {
        let listener: Rc<ListenerFn> = Rc::new(listener);
        let new_values = ArrayRef::from_vec(vec![Value::Undefined; exprs.len()]);
        let old_values = ArrayRef::from_vec(vec![Value::Undefined; exprs.len()]);

        if exprs.is_empty() {
            let should_call = Rc::new(Cell::new(true));
            let flag = Rc::clone(&should_call);
            self.eval_async(ScopeExpr::native(move |scope, _| {
                if flag.get() {
                    let empty = Value::Array(new_values.clone());
                    listener(&empty, &empty, scope)?;
                }
                Ok(Value::Undefined)
            }));
            return WatchHandle::callback(move || should_call.set(false));
        }

        let scheduled = Rc::new(Cell::new(false));
        let first_run = Rc::new(Cell::new(true));
        let mut handle = WatchHandle::default();
        for (index, expr) in exprs.iter().enumerate() {
            let listener = Rc::clone(&listener);
            let new_values = new_values.clone();
            let old_values = old_values.clone();
            let scheduled = Rc::clone(&scheduled);
            let first_run = Rc::clone(&first_run);
            let sub = self.watch_expression(
                expr,
                move |value, old, scope| {
                    new_values.set(index, value.clone());
                    old_values.set(index, old.clone());
                    if scheduled.replace(true) {
                        return Ok(());
                    }
                    let listener = Rc::clone(&listener);
                    let new_values = new_values.clone();
                    let old_values = old_values.clone();
                    let scheduled = Rc::clone(&scheduled);
                    let first_run = Rc::clone(&first_run);
                    scope.eval_async(ScopeExpr::native(move |scope, _| {
                        scheduled.set(false);
                        let current = Value::Array(new_values.clone());
                        if first_run.replace(false) {
                            listener(&current, &current, scope)?;
                        } else {
                            listener(&current, &Value::Array(old_values.clone()), scope)?;
                        }
                        Ok(Value::Undefined)
                    }));
                    Ok(())
                },
                false,
            );
            handle.merge(sub);
        }
        handle
    }
}
