//! Scope tree and the state shared by every scope under one root.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use tessel_eval::{Expression, Parser};
use tessel_ir::{Error, ObjectRef, Result, Value};
use tracing::{debug, warn};

use crate::deferrer::{Deferrer, TaskId, TaskQueue};
use crate::events::Listener;
use crate::exception::{log_handler, SharedExceptionHandler};
use crate::watch::{WatchId, Watcher};

/// Default number of digest passes before giving up.
pub const DEFAULT_DIGEST_TTL: usize = 10;

/// Operation currently running somewhere in the tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    Digest,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Digest => f.write_str("$digest"),
            Phase::Apply => f.write_str("$apply"),
        }
    }
}

/// Scope identity, unique within one tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Native scope function: `(scope, locals) -> value`.
pub type NativeScopeFn = dyn Fn(&Scope, &Value) -> Result<Value>;

/// Something a scope can evaluate: a compiled expression or a closure that
/// receives the scope itself.
#[derive(Clone)]
pub enum ScopeExpr {
    Parsed(Expression),
    Native(Rc<NativeScopeFn>),
}

impl ScopeExpr {
    pub fn native(func: impl Fn(&Scope, &Value) -> Result<Value> + 'static) -> Self {
        ScopeExpr::Native(Rc::new(func))
    }
}

impl From<Expression> for ScopeExpr {
    fn from(expr: Expression) -> Self {
        ScopeExpr::Parsed(expr)
    }
}

impl From<&Expression> for ScopeExpr {
    fn from(expr: &Expression) -> Self {
        ScopeExpr::Parsed(expr.clone())
    }
}

impl fmt::Debug for ScopeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeExpr::Parsed(expr) => f.debug_tuple("Parsed").field(&expr.source()).finish(),
            ScopeExpr::Native(_) => f.write_str("Native"),
        }
    }
}

pub(crate) struct AsyncTask {
    pub(crate) scope: Scope,
    pub(crate) expr: ScopeExpr,
}

pub(crate) type PostDigestFn = Box<dyn FnOnce() -> Result<()>>;

/// Tree-wide state: phase, queues, dirty marker and collaborators.
pub(crate) struct RootState {
    pub(crate) phase: Cell<Option<Phase>>,
    pub(crate) async_queue: RefCell<VecDeque<AsyncTask>>,
    pub(crate) apply_async_queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    pub(crate) apply_async_id: Cell<Option<TaskId>>,
    pub(crate) post_digest_queue: RefCell<VecDeque<PostDigestFn>>,
    pub(crate) last_dirty: Cell<Option<WatchId>>,
    pub(crate) ttl: usize,
    pub(crate) exception_handler: SharedExceptionHandler,
    pub(crate) deferrer: Rc<dyn Deferrer>,
    pub(crate) parser: Parser,
    pub(crate) root: RefCell<Weak<ScopeInner>>,
    next_scope_id: Cell<u64>,
    next_watch_id: Cell<u64>,
    next_listener_id: Cell<u64>,
}

impl RootState {
    pub(crate) fn begin_phase(&self, phase: Phase) -> Result<()> {
        if let Some(current) = self.phase.get() {
            return Err(Error::Phase {
                phase: current.to_string(),
            });
        }
        self.phase.set(Some(phase));
        Ok(())
    }

    pub(crate) fn clear_phase(&self) {
        self.phase.set(None);
    }

    pub(crate) fn next_watch_id(&self) -> WatchId {
        let id = self.next_watch_id.get();
        self.next_watch_id.set(id + 1);
        WatchId(id)
    }

    pub(crate) fn next_listener_id(&self) -> u64 {
        let id = self.next_listener_id.get();
        self.next_listener_id.set(id + 1);
        id
    }

    fn next_scope_id(&self) -> ScopeId {
        let id = self.next_scope_id.get();
        self.next_scope_id.set(id + 1);
        ScopeId(id)
    }
}

pub(crate) struct ScopeInner {
    pub(crate) id: ScopeId,
    pub(crate) model: ObjectRef,
    pub(crate) isolate: bool,
    pub(crate) state: Rc<RootState>,
    pub(crate) parent: RefCell<Weak<ScopeInner>>,
    pub(crate) children: RefCell<Vec<Scope>>,
    pub(crate) watchers: RefCell<Vec<Rc<Watcher>>>,
    pub(crate) listeners: RefCell<FxHashMap<Rc<str>, Vec<Rc<Listener>>>>,
    pub(crate) destroyed: Cell<bool>,
}

/// A node in the scope tree.
///
/// Attributes live in [`Scope::model`], an object whose prototype is the
/// parent's model for non-isolated scopes: reads fall through to ancestors,
/// writes always land locally. Parents hold children strongly and children
/// point back weakly. Clones are handles to the same scope.
#[derive(Clone)]
pub struct Scope(pub(crate) Rc<ScopeInner>);

/// Builder for a root scope.
pub struct RootScopeBuilder {
    ttl: usize,
    exception_handler: Option<SharedExceptionHandler>,
    deferrer: Option<Rc<dyn Deferrer>>,
    parser: Option<Parser>,
}

impl RootScopeBuilder {
    pub fn new() -> Self {
        RootScopeBuilder {
            ttl: DEFAULT_DIGEST_TTL,
            exception_handler: None,
            deferrer: None,
            parser: None,
        }
    }

    /// Maximum number of digest passes.
    #[must_use]
    pub fn digest_ttl(mut self, ttl: usize) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn exception_handler(mut self, handler: SharedExceptionHandler) -> Self {
        self.exception_handler = Some(handler);
        self
    }

    /// Backend for `eval_async` and `apply_async` follow-ups.
    #[must_use]
    pub fn deferrer(mut self, deferrer: impl Deferrer + 'static) -> Self {
        self.deferrer = Some(Rc::new(deferrer));
        self
    }

    /// Parser used by the string-taking scope methods.
    #[must_use]
    pub fn parser(mut self, parser: Parser) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn build(self) -> Scope {
        let state = Rc::new(RootState {
            phase: Cell::new(None),
            async_queue: RefCell::default(),
            apply_async_queue: RefCell::default(),
            apply_async_id: Cell::new(None),
            post_digest_queue: RefCell::default(),
            last_dirty: Cell::new(None),
            ttl: self.ttl,
            exception_handler: self.exception_handler.unwrap_or_else(log_handler),
            deferrer: self
                .deferrer
                .unwrap_or_else(|| Rc::new(TaskQueue::new()) as Rc<dyn Deferrer>),
            parser: self.parser.unwrap_or_default(),
            root: RefCell::new(Weak::new()),
            next_scope_id: Cell::new(1),
            next_watch_id: Cell::new(1),
            next_listener_id: Cell::new(1),
        });
        let root = Scope(Rc::new(ScopeInner {
            id: state.next_scope_id(),
            model: ObjectRef::new(),
            isolate: false,
            state: Rc::clone(&state),
            parent: RefCell::new(Weak::new()),
            children: RefCell::default(),
            watchers: RefCell::default(),
            listeners: RefCell::default(),
            destroyed: Cell::new(false),
        }));
        *state.root.borrow_mut() = Rc::downgrade(&root.0);
        debug!(ttl = state.ttl, "root scope created");
        root
    }
}

impl Default for RootScopeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Root scope with default settings.
    pub fn new_root() -> Scope {
        RootScopeBuilder::new().build()
    }

    pub fn builder() -> RootScopeBuilder {
        RootScopeBuilder::new()
    }

    // Introspection

    pub fn id(&self) -> ScopeId {
        self.0.id
    }

    pub fn parent(&self) -> Option<Scope> {
        self.0.parent.borrow().upgrade().map(Scope)
    }

    /// Root of the tree. A scope whose root has been dropped is its own root.
    pub fn root(&self) -> Scope {
        self.0
            .state
            .root
            .borrow()
            .upgrade()
            .map_or_else(|| self.clone(), Scope)
    }

    pub fn is_root(&self) -> bool {
        self.0
            .state
            .root
            .borrow()
            .upgrade()
            .is_some_and(|root| Rc::ptr_eq(&root, &self.0))
    }

    pub fn children(&self) -> Vec<Scope> {
        self.0.children.borrow().clone()
    }

    /// Attribute bag. Non-isolated scopes read through to their ancestors.
    pub fn model(&self) -> &ObjectRef {
        &self.0.model
    }

    /// The attribute bag as a value, the `this` of expressions.
    pub fn value(&self) -> Value {
        Value::Object(self.0.model.clone())
    }

    /// Read an attribute, walking up the inheritance chain.
    pub fn get(&self, key: &str) -> Value {
        self.0.model.get(key)
    }

    /// Write an attribute on this scope, shadowing any inherited one.
    pub fn set(&self, key: impl Into<Rc<str>>, value: Value) {
        self.0.model.set(key, value);
    }

    pub fn is_isolate(&self) -> bool {
        self.0.isolate
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    /// Phase currently active anywhere in the tree.
    pub fn phase(&self) -> Option<Phase> {
        self.0.state.phase.get()
    }

    pub fn digest_ttl(&self) -> usize {
        self.0.state.ttl
    }

    pub fn parser(&self) -> &Parser {
        &self.0.state.parser
    }

    pub fn exception_handler(&self) -> &SharedExceptionHandler {
        &self.0.state.exception_handler
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn handle_error(&self, err: &Error, cause: &str) {
        self.0.state.exception_handler.handle(err, cause);
    }

    // Tree

    /// Child that inherits this scope's attributes.
    pub fn new_child(&self) -> Scope {
        self.new_child_of(self, false)
    }

    /// Child with an empty attribute bag that is still digested and
    /// destroyed with this scope.
    pub fn new_isolate(&self) -> Scope {
        self.new_child_of(self, true)
    }

    /// Child that inherits from this scope (unless `isolate`) but sits under
    /// `parent` in the digest tree.
    pub fn new_child_of(&self, parent: &Scope, isolate: bool) -> Scope {
        let state = Rc::clone(&self.0.state);
        let model = if isolate {
            ObjectRef::new()
        } else {
            ObjectRef::with_proto(Some(self.0.model.clone()))
        };
        let child = Scope(Rc::new(ScopeInner {
            id: state.next_scope_id(),
            model,
            isolate,
            state,
            parent: RefCell::new(Rc::downgrade(&parent.0)),
            children: RefCell::default(),
            watchers: RefCell::default(),
            listeners: RefCell::default(),
            destroyed: Cell::new(parent.is_destroyed()),
        }));
        if parent.is_destroyed() {
            warn!(parent = %parent.id(), "child created under destroyed scope");
        } else {
            parent.0.children.borrow_mut().push(child.clone());
        }
        child
    }

    /// Tear down this scope and its subtree.
    ///
    /// `$destroy` is broadcast first so every descendant sees it; afterwards
    /// the subtree is detached, its watchers and listeners are dropped and
    /// further registrations are ignored.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        self.broadcast("$destroy", &[]);
        self.mark_destroyed();
        if let Some(parent) = self.parent() {
            parent
                .0
                .children
                .borrow_mut()
                .retain(|child| !child.ptr_eq(self));
        }
        *self.0.parent.borrow_mut() = Weak::new();
        self.0.state.last_dirty.set(None);
        debug!(scope = %self.id(), "scope destroyed");
    }

    fn mark_destroyed(&self) {
        self.0.destroyed.set(true);
        let watchers = std::mem::take(&mut *self.0.watchers.borrow_mut());
        for watcher in &watchers {
            watcher.removed.set(true);
        }
        let listeners = std::mem::take(&mut *self.0.listeners.borrow_mut());
        drop(listeners);
        let children = std::mem::take(&mut *self.0.children.borrow_mut());
        for child in &children {
            child.mark_destroyed();
            *child.0.parent.borrow_mut() = Weak::new();
        }
    }

    // Evaluation

    /// Evaluate `expr` against this scope.
    pub fn eval(&self, expr: impl Into<ScopeExpr>, locals: Option<&Value>) -> Result<Value> {
        match expr.into() {
            ScopeExpr::Parsed(expr) => expr.evaluate(&self.value(), locals),
            ScopeExpr::Native(func) => func(self, locals.unwrap_or(&Value::Undefined)),
        }
    }

    /// Parse `text` with the tree's parser and evaluate it.
    pub fn eval_str(&self, text: &str, locals: Option<&Value>) -> Result<Value> {
        let expr = self.0.state.parser.parse(text)?;
        self.eval(expr, locals)
    }

    /// Queue `expr` to run during the next digest pass.
    ///
    /// When nothing is digesting and the queue was empty, a deferred task is
    /// scheduled that digests this scope if the queue is still non-empty.
    pub fn eval_async(&self, expr: impl Into<ScopeExpr>) {
        let state = &self.0.state;
        if state.phase.get().is_none() && state.async_queue.borrow().is_empty() {
            let scope = Rc::downgrade(&self.0);
            state.deferrer.defer(Box::new(move || {
                let Some(inner) = scope.upgrade() else {
                    return;
                };
                let scope = Scope(inner);
                if !scope.0.state.async_queue.borrow().is_empty() {
                    if let Err(err) = scope.digest() {
                        scope.handle_error(&err, "$evalAsync");
                    }
                }
            }));
        }
        state.async_queue.borrow_mut().push_back(AsyncTask {
            scope: self.clone(),
            expr: expr.into(),
        });
    }

    /// Evaluate `expr` in an `$apply` phase, then digest from the root.
    ///
    /// The digest runs whether or not evaluation failed. An evaluation error
    /// is returned after the digest; if the digest fails too, its error is
    /// returned and the evaluation error goes to the exception handler.
    pub fn apply(&self, expr: impl Into<ScopeExpr>) -> Result<Value> {
        let state = Rc::clone(&self.0.state);
        state.begin_phase(Phase::Apply)?;
        let result = self.eval(expr, None);
        state.clear_phase();
        if let Err(err) = self.root().digest() {
            if let Err(eval_err) = &result {
                self.handle_error(eval_err, "$apply");
            }
            return Err(err);
        }
        result
    }

    /// Parse `text` and [`apply`](Self::apply) it.
    pub fn apply_str(&self, text: &str) -> Result<Value> {
        let expr = self.0.state.parser.parse(text)?;
        self.apply(expr)
    }

    /// Queue `expr` for a coalesced `apply` in a later task.
    ///
    /// Calls made before the deferred task runs share one `apply`. A
    /// synchronous digest of any scope in the meantime flushes the queue and
    /// cancels the task.
    pub fn apply_async(&self, expr: impl Into<ScopeExpr>) {
        let expr = expr.into();
        let scope = self.clone();
        let state = &self.0.state;
        state.apply_async_queue.borrow_mut().push_back(Box::new(move || {
            if let Err(err) = scope.eval(expr, None) {
                scope.handle_error(&err, "$applyAsync");
            }
        }));
        if state.apply_async_id.get().is_none() {
            let root = Rc::downgrade(&self.root().0);
            let id = state.deferrer.defer(Box::new(move || {
                let Some(inner) = root.upgrade() else {
                    return;
                };
                let root = Scope(inner);
                let flush = ScopeExpr::native(|scope, _| {
                    scope.flush_apply_async();
                    Ok(Value::Undefined)
                });
                if let Err(err) = root.apply(flush) {
                    root.handle_error(&err, "$applyAsync");
                }
            }));
            state.apply_async_id.set(Some(id));
        }
    }

    pub(crate) fn flush_apply_async(&self) {
        let state = &self.0.state;
        loop {
            let task = state.apply_async_queue.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            task();
        }
        state.apply_async_id.set(None);
    }

    /// Run `callback` once after the next digest converges.
    pub fn post_digest(&self, callback: impl FnOnce() -> Result<()> + 'static) {
        self.0
            .state
            .post_digest_queue
            .borrow_mut()
            .push_back(Box::new(callback));
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.0.id)
            .field("isolate", &self.0.isolate)
            .field("destroyed", &self.0.destroyed.get())
            .field("watchers", &self.0.watchers.borrow().len())
            .field("children", &self.0.children.borrow().len())
            .finish()
    }
}
