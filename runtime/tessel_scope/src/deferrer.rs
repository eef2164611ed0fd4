//! Deferred task scheduling.
//!
//! `eval_async` and `apply_async` hand their follow-up work to a
//! [`Deferrer`]. The host event loop decides when deferred tasks run;
//! [`TaskQueue`] is a manual single-threaded queue for embedding and tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::trace;

/// Identifier of a deferred task, used for cancellation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TaskId(u64);

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

/// Macrotask scheduler.
pub trait Deferrer {
    /// Run `task` later, after the current call stack unwinds.
    fn defer(&self, task: Task) -> TaskId;

    /// Drop a pending task. Returns false if it already ran or was unknown.
    fn cancel(&self, id: TaskId) -> bool;
}

#[derive(Default)]
struct TaskQueueInner {
    next_id: Cell<u64>,
    tasks: RefCell<VecDeque<(TaskId, Task)>>,
}

/// FIFO macrotask queue drained explicitly by the host. Clones share the
/// same queue.
#[derive(Clone, Default)]
pub struct TaskQueue(Rc<TaskQueueInner>);

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.0.tasks.borrow().len()
    }

    /// Run the oldest pending task. Returns false if the queue was empty.
    pub fn run_next(&self) -> bool {
        let next = self.0.tasks.borrow_mut().pop_front();
        match next {
            Some((id, task)) => {
                trace!(task = id.0, "running deferred task");
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks deferred by the
    /// tasks being run. Returns how many ran.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Deferrer for TaskQueue {
    fn defer(&self, task: Task) -> TaskId {
        let id = TaskId(self.0.next_id.get());
        self.0.next_id.set(id.0 + 1);
        self.0.tasks.borrow_mut().push_back((id, task));
        id
    }

    fn cancel(&self, id: TaskId) -> bool {
        let mut tasks = self.0.tasks.borrow_mut();
        match tasks.iter().position(|(task_id, _)| *task_id == id) {
            Some(index) => {
                let removed = tasks.remove(index);
                drop(tasks);
                drop(removed);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_run_in_fifo_order() {
        let queue = TaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let log = Rc::clone(&log);
            queue.defer(Box::new(move || log.borrow_mut().push(n)));
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.flush(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn flush_runs_tasks_deferred_by_tasks() {
        let queue = TaskQueue::new();
        let ran = Rc::new(Cell::new(0));
        let inner_queue = queue.clone();
        let inner_ran = Rc::clone(&ran);
        queue.defer(Box::new(move || {
            let ran = Rc::clone(&inner_ran);
            inner_queue.defer(Box::new(move || ran.set(ran.get() + 1)));
        }));
        assert_eq!(queue.flush(), 2);
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn cancelled_tasks_do_not_run() {
        let queue = TaskQueue::new();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let id = queue.defer(Box::new(move || flag.set(true)));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        queue.flush();
        assert!(!ran.get());
    }
}
