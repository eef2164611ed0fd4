//! Filter registry.
//!
//! Filters are trusted transforms applied with the `|` pipe. A filter
//! declared `stateful` may return different output for identical input, so
//! the analyzer never treats a call to it as constant.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tessel_ir::{Error, FunctionRef, Result, Value};
use tracing::debug;

/// A registered filter function.
#[derive(Clone, Debug)]
pub struct Filter {
    pub func: FunctionRef,
    pub stateful: bool,
}

impl Filter {
    /// Stateless filter from a closure over its arguments.
    pub fn new(
        name: &str,
        body: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Filter {
            func: FunctionRef::new(name, move |_, args| body(args)),
            stateful: false,
        }
    }

    /// Mark the filter as stateful.
    #[must_use]
    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }
}

/// Shared name-to-filter map. Clones share the same table.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: Rc<RefCell<FxHashMap<Rc<str>, Filter>>>,
    /// Bumped on every registration.
    generation: Rc<Cell<u64>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `uppercase`, `lowercase` and `json`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("uppercase", Filter::new("uppercase", uppercase));
        registry.register("lowercase", Filter::new("lowercase", lowercase));
        registry.register("json", Filter::new("json", json));
        registry
    }

    /// Add or replace a filter.
    pub fn register(&self, name: &str, filter: Filter) {
        debug!(name, stateful = filter.stateful, "registered filter");
        self.filters.borrow_mut().insert(Rc::from(name), filter);
        self.generation.set(self.generation.get() + 1);
    }

    /// Changes whenever a filter is added or replaced. Compiled expressions
    /// hold the filters they resolved, so a cache keyed on source text is
    /// stale once this moves.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn get(&self, name: &str) -> Option<Filter> {
        self.filters.borrow().get(name).cloned()
    }

    /// Like [`get`](Self::get) but fails the way an unknown service lookup does.
    pub fn resolve(&self, name: &str) -> Result<Filter> {
        self.get(name).ok_or_else(|| Error::UnknownProvider {
            path: vec![format!("{name}FilterProvider"), format!("{name}Filter")],
        })
    }

    pub fn has(&self, name: &str) -> bool {
        self.filters.borrow().contains_key(name)
    }

    /// True only for a registered filter declared stateful.
    pub fn is_stateful(&self, name: &str) -> bool {
        self.filters.borrow().get(name).is_some_and(|f| f.stateful)
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filters = self.filters.borrow();
        let mut names: Vec<&str> = filters.keys().map(AsRef::as_ref).collect();
        names.sort_unstable();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

fn uppercase(args: &[Value]) -> Result<Value> {
    Ok(match args.first() {
        Some(Value::String(s)) => Value::from(s.to_uppercase()),
        Some(other) => other.clone(),
        None => Value::Undefined,
    })
}

fn lowercase(args: &[Value]) -> Result<Value> {
    Ok(match args.first() {
        Some(Value::String(s)) => Value::from(s.to_lowercase()),
        Some(other) => other.clone(),
        None => Value::Undefined,
    })
}

/// `value | json[:spacing]`, spacing defaults to 2.
fn json(args: &[Value]) -> Result<Value> {
    let input = args.first().cloned().unwrap_or_default();
    let spacing = args.get(1).map(Value::to_number).unwrap_or(f64::NAN);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let indent = if spacing.is_finite() && spacing >= 0.0 {
        spacing as usize
    } else {
        2
    };
    if input.is_undefined() {
        return Ok(Value::Undefined);
    }
    Ok(Value::from(input.to_json(indent)?))
}
