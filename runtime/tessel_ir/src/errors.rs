//! Error taxonomy shared across the runtime.
//!
//! Lexing and parsing errors surface synchronously from `parse`; security
//! errors surface when a compiled expression is evaluated; injector, phase
//! and digest-limit errors surface to the direct caller. Errors raised by a
//! single watcher, listener or event handler are routed to an exception
//! handler by the scope engine instead of propagating.

use thiserror::Error;

/// Result alias used throughout the runtime.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the runtime can report.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error {
    /// Malformed token in expression source.
    #[error("Lexer Error: {message} at column {column} in expression [{text}]")]
    Lex {
        message: String,
        column: usize,
        text: String,
    },

    /// Malformed expression structure.
    #[error("Syntax Error: {message} in expression [{text}]")]
    Parse { message: String, text: String },

    /// Sandbox violation while compiling or evaluating an expression.
    #[error("Security Error: {0}")]
    Security(String),

    /// AST shape that a valid parse never produces.
    #[error("Compile Error: {0}")]
    Compile(String),

    /// Invalid service or module registration.
    #[error("Registration Error: {0}")]
    Registration(String),

    /// Re-entrant resolution of a key already being instantiated.
    ///
    /// `path` lists the requested key first, then the resolution stack from
    /// the innermost request outwards.
    #[error("Circular dependency found: {}", path.join(" <- "))]
    CircularDependency { path: Vec<String> },

    /// Requested key has no provider.
    #[error("Unknown provider: {}", path.join(" <- "))]
    UnknownProvider { path: Vec<String> },

    /// Bad injection annotation or strict-mode violation.
    #[error("Injection Error: {0}")]
    Injection(String),

    /// Enforcing factory returned `undefined`.
    #[error("Provider '{name}' must return a value from $get factory method")]
    Factory { name: String },

    /// Module lookup failure.
    #[error("Module '{name}' is not available")]
    Module { name: String },

    /// `digest`/`apply` started while a phase is already active.
    #[error("{phase} already in progress")]
    Phase { phase: String },

    /// Watch graph did not stabilise.
    #[error("{ttl} digest limit reached")]
    DigestLimit { ttl: usize },

    /// Operation applied to a value of the wrong kind.
    #[error("Type Error: {0}")]
    Type(String),

    /// Error raised by host code (native functions, listeners, factories).
    #[error("{0}")]
    Host(String),
}

impl Error {
    /// Error raised by host code.
    pub fn host(message: impl Into<String>) -> Self {
        Error::Host(message.into())
    }

    /// Sandbox violation.
    pub fn security(message: impl Into<String>) -> Self {
        Error::Security(message.into())
    }

    /// Wrong value kind.
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type(message.into())
    }
}

#[cfg(test)]
mod tests;
