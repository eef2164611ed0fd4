//! Lexer tokens.

use crate::Value;

/// A single token of expression source.
///
/// Operators and punctuation carry only `text`. Numbers and strings carry
/// their decoded literal in `value`. Identifiers set `identifier`.
#[derive(Clone, Debug)]
pub struct Token {
    /// Source text of the token (decoded text for strings is in `value`).
    pub text: String,
    /// Literal value for number and string tokens.
    pub value: Option<Value>,
    /// True for identifier tokens.
    pub identifier: bool,
    /// Character offset of the token start in the source.
    pub index: usize,
}

impl Token {
    /// Operator or punctuation token.
    pub fn op(text: impl Into<String>, index: usize) -> Self {
        Token {
            text: text.into(),
            value: None,
            identifier: false,
            index,
        }
    }

    /// Literal token (number or string).
    pub fn literal(text: impl Into<String>, value: Value, index: usize) -> Self {
        Token {
            text: text.into(),
            value: Some(value),
            identifier: false,
            index,
        }
    }

    /// Identifier token.
    pub fn ident(text: impl Into<String>, index: usize) -> Self {
        Token {
            text: text.into(),
            value: None,
            identifier: true,
            index,
        }
    }

    /// True if this is an operator/punctuation token with exactly `text`.
    #[inline]
    pub fn is(&self, text: &str) -> bool {
        !self.identifier && self.value.is_none() && self.text == text
    }
}
