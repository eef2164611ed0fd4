//! Lexer error type.
//!
//! Each error records where scanning stopped (`start..end`, in characters),
//! what went wrong, and the full expression text so the rendered message can
//! quote it.

use tessel_ir::Error;

/// A lexing failure.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct LexError {
    pub kind: LexErrorKind,
    /// Character offset where the offending token starts.
    pub start: usize,
    /// Character offset just past the offending input.
    pub end: usize,
    /// Whole expression source.
    pub text: String,
}

/// What went wrong.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum LexErrorKind {
    /// Exponent marker not followed by a digit (`42e-`, `42e-a`).
    InvalidExponent,
    /// Digits that do not form a number.
    InvalidNumber,
    /// Missing closing quote.
    UnterminatedString,
    /// `\u` not followed by exactly four hex digits.
    InvalidUnicodeEscape { escape: String },
    /// Character outside the expression alphabet.
    UnexpectedCharacter { found: char },
}

impl LexErrorKind {
    fn message(&self) -> String {
        match self {
            LexErrorKind::InvalidExponent => "Invalid exponent".to_string(),
            LexErrorKind::InvalidNumber => "Invalid number".to_string(),
            LexErrorKind::UnterminatedString => "Unterminated quote".to_string(),
            LexErrorKind::InvalidUnicodeEscape { escape } => {
                format!("Invalid unicode escape [\\u{escape}]")
            }
            LexErrorKind::UnexpectedCharacter { found } => {
                format!("Unexpected next character [{found}]")
            }
        }
    }
}

impl LexError {
    #[cold]
    pub(crate) fn new(kind: LexErrorKind, start: usize, end: usize, text: &str) -> Self {
        LexError {
            kind,
            start,
            end,
            text: text.to_string(),
        }
    }

    /// Human-readable description without location.
    pub fn message(&self) -> String {
        self.kind.message()
    }
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at column {} in expression [{}]",
            self.message(),
            self.start,
            self.text
        )
    }
}

impl std::error::Error for LexError {}

impl From<LexError> for Error {
    fn from(err: LexError) -> Self {
        Error::Lex {
            message: err.message(),
            column: err.start,
            text: err.text,
        }
    }
}
