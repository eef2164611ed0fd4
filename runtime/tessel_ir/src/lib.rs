//! Tessel IR - shared data model for the Tessel runtime.
//!
//! Every other crate in the workspace builds on the types defined here:
//!
//! - [`Value`]: the dynamic value model. Compound values (arrays, objects,
//!   functions, host handles) have reference identity, so dirty checking can
//!   compare by identity and deep equality separately.
//! - [`Token`]: lexer output consumed by the parser.
//! - [`ExprArena`], [`ExprId`], [`ExprKind`]: the flat expression tree and its
//!   analysis annotations (`constant`, `to_watch`).
//! - [`Error`]: the error taxonomy shared by lexer, parser, compiler,
//!   injector and scope engine.

mod ast;
mod errors;
mod token;
mod value;

pub use ast::{
    Ast, BinaryOp, Expr, ExprArena, ExprId, ExprKind, LogicalOp, Property, PropertyKey, UnaryOp,
    WatchSet,
};
pub use errors::{Error, Result};
pub use token::Token;
pub use value::{
    ArrayRef, Function, FunctionKind, FunctionRef, HostRef, NativeFn, Object, ObjectRef, Value,
};
