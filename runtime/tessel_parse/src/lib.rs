//! Recursive descent parser for Tessel expressions.
//!
//! Produces a flat [`Ast`] backed by an [`ExprArena`]. One grammar rule per
//! precedence level, lowest first:
//!
//! ```text
//! program      := filterChain (';' filterChain)* ';'?
//! filterChain  := assignment ('|' ident (':' assignment)*)*
//! assignment   := ternary ('=' assignment)?
//! ternary      := logicalOr ('?' assignment ':' assignment)?
//! logicalOr    := logicalAnd ('||' logicalAnd)*
//! logicalAnd   := equality ('&&' equality)*
//! equality     := relational (('==' | '!=' | '===' | '!==') relational)*
//! relational   := additive (('<' | '>' | '<=' | '>=') additive)*
//! additive     := multiplicative (('+' | '-') multiplicative)*
//! multiplicative := unary (('*' | '/' | '%') unary)*
//! unary        := ('+' | '-' | '!') unary | primary
//! primary      := ('(' filterChain ')' | array | object | constant | ident | literal)
//!                 ('.' ident | '[' assignment ']' | '(' args ')')*
//! ```

mod cursor;
mod error;
mod grammar;

pub use error::{ParseError, ParseErrorKind};

use tessel_ir::{Ast, Error, ExprArena, Token};
use tracing::trace;

use cursor::Cursor;

/// Lex and parse `text` into an unanalyzed AST.
pub fn parse(text: &str) -> Result<Ast, Error> {
    let tokens = tessel_lexer::lex(text)?;
    Ok(parse_tokens(text, tokens)?)
}

/// Parse an already lexed token stream. `text` is used for error messages.
pub fn parse_tokens(text: &str, tokens: Vec<Token>) -> Result<Ast, ParseError> {
    let mut parser = Parser::new(tokens, text);
    let body = parser.parse_program()?;
    trace!(text, nodes = parser.arena.len(), "parsed expression");
    Ok(Ast {
        arena: parser.arena,
        body,
    })
}

/// Parser state.
pub(crate) struct Parser<'a> {
    cursor: Cursor<'a>,
    arena: ExprArena,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token>, text: &'a str) -> Self {
        Parser {
            cursor: Cursor::new(tokens, text),
            arena: ExprArena::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
