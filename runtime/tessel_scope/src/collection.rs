//! Shallow collection watching.
//!
//! A collection watch keeps a shallow shadow copy of the watched value and
//! bumps a change counter whenever an element is added, removed or replaced.
//! The counter is what the underlying watcher dirty-checks, so the listener
//! fires once per pass with any changes. Arrays and objects are the only
//! collection kinds; every other value is compared by identity.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tessel_ir::{ObjectRef, Result, Value};

use crate::scope::{Scope, ScopeExpr};
use crate::watch::WatchHandle;

enum Shadow {
    Primitive(Value),
    Array(Vec<Value>),
    Object(FxHashMap<Rc<str>, Value>),
}

struct CollectionState {
    shadow: Shadow,
    changes: u32,
    current: Value,
    very_old: Value,
    first_run: bool,
}

impl CollectionState {
    fn new() -> Self {
        CollectionState {
            shadow: Shadow::Primitive(Value::Undefined),
            changes: 0,
            current: Value::Undefined,
            very_old: Value::Undefined,
            first_run: true,
        }
    }

    fn bump(&mut self, count: u32) {
        self.changes = self.changes.wrapping_add(count);
    }

    /// Record `value` and return the change counter.
    fn observe(&mut self, value: Value) -> u32 {
        match &value {
            Value::Array(items) => self.observe_array(&items.to_vec()),
            Value::Object(obj) => self.observe_object(obj),
            other => {
                let changed = match &self.shadow {
                    Shadow::Primitive(old) => !old.same_value(other),
                    Shadow::Array(_) | Shadow::Object(_) => true,
                };
                if changed {
                    self.shadow = Shadow::Primitive(other.clone());
                    self.bump(1);
                }
            }
        }
        self.current = value;
        self.changes
    }

    fn observe_array(&mut self, items: &[Value]) {
        if !matches!(self.shadow, Shadow::Array(_)) {
            self.shadow = Shadow::Array(Vec::new());
            self.bump(1);
        }
        let mut changes = 0;
        if let Shadow::Array(old) = &mut self.shadow {
            if old.len() != items.len() {
                changes += 1;
                old.resize(items.len(), Value::Undefined);
            }
            for (old_item, new_item) in old.iter_mut().zip(items) {
                if !old_item.same_value(new_item) {
                    changes += 1;
                    *old_item = new_item.clone();
                }
            }
        }
        self.bump(changes);
    }

    fn observe_object(&mut self, obj: &ObjectRef) {
        if !matches!(self.shadow, Shadow::Object(_)) {
            self.shadow = Shadow::Object(FxHashMap::default());
            self.bump(1);
        }
        let mut changes = 0;
        if let Shadow::Object(old) = &mut self.shadow {
            let entries = obj.entries();
            for (key, new_item) in &entries {
                match old.get_mut(key) {
                    Some(old_item) => {
                        if !old_item.same_value(new_item) {
                            changes += 1;
                            *old_item = new_item.clone();
                        }
                    }
                    None => {
                        changes += 1;
                        old.insert(Rc::clone(key), new_item.clone());
                    }
                }
            }
            if old.len() > entries.len() {
                changes += 1;
                old.retain(|key, _| obj.has_own(key));
            }
        }
        self.bump(changes);
    }
}

/// One level deep copy, for the listener's old value.
fn shallow_copy(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::array(items.to_vec()),
        Value::Object(obj) => Value::Object(ObjectRef::from_pairs(obj.entries())),
        other => other.clone(),
    }
}

impl Scope {
    /// Watch a value shallowly.
    ///
    /// For arrays the listener fires when the length or any element identity
    /// changes; for objects when a key is added, removed or rebound. The old
    /// value passed to the listener is a shallow copy from the previous call
    /// (the new value itself on the first call).
    pub fn watch_collection(
        &self,
        expr: impl Into<ScopeExpr>,
        listener: impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static,
    ) -> WatchHandle {
        let expr = expr.into();
        let state = Rc::new(RefCell::new(CollectionState::new()));
        let watch_state = Rc::clone(&state);
        self.watch(
            move |scope| {
                let value = scope.eval(expr.clone(), None)?;
                let changes = watch_state.borrow_mut().observe(value);
                Ok(Value::Number(f64::from(changes)))
            },
            move |_, _, scope| {
                let (current, old) = {
                    let mut state = state.borrow_mut();
                    let old = if state.first_run {
                        state.current.clone()
                    } else {
                        state.very_old.clone()
                    };
                    state.first_run = false;
                    (state.current.clone(), old)
                };
                let result = listener(&current, &old, scope);
                state.borrow_mut().very_old = shallow_copy(&current);
                result
            },
            false,
        )
    }

    /// Parse `text` and watch it as a collection.
    pub fn watch_collection_str(
        &self,
        text: &str,
        listener: impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static,
    ) -> Result<WatchHandle> {
        let expr = self.parser().parse(text)?;
        Ok(self.watch_collection(expr, listener))
    }
}
