//! Exception handler for errors raised inside watchers, listeners and
//! queued callbacks.
//!
//! Such errors never abort the digest loop or an event dispatch; they are
//! reported here and processing continues. Destinations:
//! - Log: `tracing::error!` (default)
//! - Buffer: captured for assertions in tests
//! - Silent: discarded

use std::rc::Rc;

use parking_lot::Mutex;
use tessel_ir::Error;
use tracing::error;

/// Handler that reports through `tracing`.
#[derive(Default)]
pub struct LogExceptionHandler;

impl LogExceptionHandler {
    pub fn handle(&self, err: &Error, cause: &str) {
        error!(cause, %err, "unhandled exception");
    }
}

/// Handler that captures errors to a buffer.
pub struct BufferExceptionHandler {
    errors: Mutex<Vec<(Error, String)>>,
}

impl BufferExceptionHandler {
    pub fn new() -> Self {
        BufferExceptionHandler {
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn handle(&self, err: &Error, cause: &str) {
        self.errors.lock().push((err.clone(), cause.to_string()));
    }

    /// Captured errors, oldest first.
    pub fn errors(&self) -> Vec<Error> {
        self.errors.lock().iter().map(|(err, _)| err.clone()).collect()
    }

    /// Where each captured error was raised (`"watcher"`, `"$emit"`, ...).
    pub fn causes(&self) -> Vec<String> {
        self.errors
            .lock()
            .iter()
            .map(|(_, cause)| cause.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}

impl Default for BufferExceptionHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Exception handler using enum dispatch.
pub enum ExceptionHandler {
    Log(LogExceptionHandler),
    Buffer(BufferExceptionHandler),
    Silent,
}

impl ExceptionHandler {
    /// Report `err`; `cause` names the kind of callback that raised it.
    pub fn handle(&self, err: &Error, cause: &str) {
        match self {
            Self::Log(h) => h.handle(err, cause),
            Self::Buffer(h) => h.handle(err, cause),
            Self::Silent => {}
        }
    }

    /// Captured errors. Empty for handlers that don't capture.
    pub fn errors(&self) -> Vec<Error> {
        match self {
            Self::Buffer(h) => h.errors(),
            Self::Log(_) | Self::Silent => Vec::new(),
        }
    }

    /// Clear captured errors.
    pub fn clear(&self) {
        if let Self::Buffer(h) = self {
            h.clear();
        }
    }
}

/// Shared exception handler.
pub type SharedExceptionHandler = Rc<ExceptionHandler>;

/// Create the default logging handler.
pub fn log_handler() -> SharedExceptionHandler {
    Rc::new(ExceptionHandler::Log(LogExceptionHandler))
}

/// Create a capturing handler.
pub fn buffer_handler() -> SharedExceptionHandler {
    Rc::new(ExceptionHandler::Buffer(BufferExceptionHandler::new()))
}

/// Create a handler that discards everything.
pub fn silent_handler() -> SharedExceptionHandler {
    Rc::new(ExceptionHandler::Silent)
}
