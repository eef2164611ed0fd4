//! The dirty-checking loop.
//!
//! A digest repeats passes over the subtree until a pass finds no dirty
//! watcher and the async queue is empty:
//!
//! 1. drain the async queue
//! 2. walk the subtree pre-order; on each scope evaluate every watcher,
//!    oldest first, and call the listener of each one whose value changed
//! 3. stop a pass early on reaching the last watcher that was dirty if it
//!    is now clean, since nothing after it can have changed
//!
//! Passes are capped by the tree's TTL. The post-digest queue drains once
//! the loop converges. A pending `apply_async` flush is run up front by
//! any digest, root or not, and its deferred task cancelled.

use std::ops::ControlFlow;
use std::rc::Rc;

use tessel_ir::{Error, Result};
use tracing::{debug, trace, warn};

use crate::scope::{Phase, Scope};
use crate::watch::Watcher;

impl Scope {
    /// Run watchers of this scope and its descendants until they settle.
    pub fn digest(&self) -> Result<()> {
        if self.is_destroyed() {
            warn!(scope = %self.id(), "digest on destroyed scope ignored");
            return Ok(());
        }
        let state = Rc::clone(&self.0.state);
        state.begin_phase(Phase::Digest)?;

        if let Some(id) = state.apply_async_id.get() {
            state.deferrer.cancel(id);
            self.flush_apply_async();
        }

        state.last_dirty.set(None);
        let mut passes = 0;
        let outcome = loop {
            self.drain_async_queue();
            let dirty = self.digest_once();
            passes += 1;
            let queued = !state.async_queue.borrow().is_empty();
            if !dirty && !queued {
                break Ok(());
            }
            if passes >= state.ttl {
                break Err(Error::DigestLimit { ttl: state.ttl });
            }
            trace!(pass = passes, dirty, queued, "digest pass");
        };
        state.clear_phase();
        outcome?;
        debug!(scope = %self.id(), passes, "digest converged");

        self.flush_post_digest();
        Ok(())
    }

    fn drain_async_queue(&self) {
        let state = &self.0.state;
        loop {
            let task = state.async_queue.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            if let Err(err) = task.scope.eval(task.expr, None) {
                task.scope.handle_error(&err, "$evalAsync");
            }
        }
    }

    fn flush_post_digest(&self) {
        let state = &self.0.state;
        loop {
            let callback = state.post_digest_queue.borrow_mut().pop_front();
            let Some(callback) = callback else {
                break;
            };
            if let Err(err) = callback() {
                self.handle_error(&err, "$$postDigest");
            }
        }
    }

    /// One pass over the subtree. Returns whether any watcher was dirty.
    fn digest_once(&self) -> bool {
        let mut dirty = false;
        if self.digest_subtree(&mut dirty).is_break() {
            trace!(scope = %self.id(), "pass stopped at last dirty watcher");
        }
        dirty
    }

    fn digest_subtree(&self, dirty: &mut bool) -> ControlFlow<()> {
        let watchers: Vec<Rc<Watcher>> = self.0.watchers.borrow().clone();
        for watcher in watchers.iter().rev() {
            if self.is_destroyed() {
                break;
            }
            if watcher.removed.get() {
                continue;
            }
            match self.check_watcher(watcher) {
                Some(true) => *dirty = true,
                Some(false) if self.0.state.last_dirty.get() == Some(watcher.id) => {
                    *dirty = false;
                    return ControlFlow::Break(());
                }
                Some(false) | None => {}
            }
        }
        for child in self.children() {
            if child.is_destroyed() {
                continue;
            }
            if child.digest_subtree(dirty).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Evaluate one watcher. `None` when the watch function failed.
    fn check_watcher(&self, watcher: &Watcher) -> Option<bool> {
        let value = match (watcher.watch_fn)(self) {
            Ok(value) => value,
            Err(err) => {
                self.handle_error(&err, "watcher");
                return None;
            }
        };
        let last = watcher.last.borrow().clone();
        let changed = match &last {
            None => true,
            Some(last) if watcher.value_eq => !value.deep_equals(last),
            Some(last) => !value.same_value(last),
        };
        if !changed {
            return Some(false);
        }
        self.0.state.last_dirty.set(Some(watcher.id));
        *watcher.last.borrow_mut() = Some(if watcher.value_eq {
            value.deep_copy()
        } else {
            value.clone()
        });
        let old = last.unwrap_or_else(|| value.clone());
        if let Err(err) = (watcher.listener)(&value, &old, self) {
            self.handle_error(&err, "watch listener");
        }
        Some(true)
    }
}
