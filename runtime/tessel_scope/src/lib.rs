//! Tessel Scope - hierarchical observable state with a dirty-checking
//! digest loop.
//!
//! A tree of [`Scope`]s shares one root state: the active [`Phase`], the
//! async and apply-async queues, the post-digest queue, the digest TTL, the
//! [`ExceptionHandler`] and the [`Deferrer`] that schedules follow-up tasks.
//!
//! - watching: [`Scope::watch`], [`Scope::watch_expression`],
//!   [`Scope::watch_group`], [`Scope::watch_collection`]
//! - running: [`Scope::digest`], [`Scope::apply`], [`Scope::eval_async`],
//!   [`Scope::apply_async`], [`Scope::post_digest`]
//! - events: [`Scope::on`], [`Scope::emit`], [`Scope::broadcast`]
//! - lifecycle: [`Scope::new_child`], [`Scope::new_isolate`],
//!   [`Scope::new_child_of`], [`Scope::destroy`]

mod collection;
mod deferrer;
mod digest;
mod events;
mod exception;
mod scope;
mod watch;

pub use deferrer::{Deferrer, Task, TaskId, TaskQueue};
pub use events::{Event, EventListenerFn, ListenerHandle};
pub use exception::{
    buffer_handler, log_handler, silent_handler, BufferExceptionHandler, ExceptionHandler,
    LogExceptionHandler, SharedExceptionHandler,
};
pub use scope::{
    NativeScopeFn, Phase, RootScopeBuilder, Scope, ScopeExpr, ScopeId, DEFAULT_DIGEST_TTL,
};
pub use watch::{ListenerFn, WatchFn, WatchHandle, WatchId};
