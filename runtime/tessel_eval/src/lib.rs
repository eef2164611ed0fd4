//! Tessel Eval - turns expression text into sandboxed evaluators.
//!
//! Pipeline: [`tessel_parse::parse`] builds the AST, [`analyze`] marks
//! constant subtrees and watch inputs, [`compile`] builds the closure tree.
//! [`Parser`] ties these together behind a cache and picks the
//! [`WatchDelegate`] a scope should use.

mod analyze;
mod compile;
mod expression;
mod filters;
mod operators;
mod parser;
pub mod sandbox;

pub use analyze::analyze;
pub use compile::{compile, Compiled};
pub use expression::{AssignFn, EvalFn, Expression, InputFn, WatchDelegate};
pub use filters::{Filter, FilterRegistry};
pub use parser::Parser;

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
