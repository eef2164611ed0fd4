//! Token cursor.
//!
//! Tokens are consumed front to back; lookahead never exceeds one token
//! past the current one.

use tessel_ir::Token;

use crate::error::{ParseError, ParseErrorKind};

pub(crate) struct Cursor<'a> {
    tokens: Vec<Token>,
    pos: usize,
    text: &'a str,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(tokens: Vec<Token>, text: &'a str) -> Self {
        Cursor {
            tokens,
            pos: 0,
            text,
        }
    }

    #[inline]
    pub(crate) fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    #[inline]
    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// True if the current token is the operator/punctuation `text`.
    #[inline]
    pub(crate) fn check(&self, text: &str) -> bool {
        self.current().is_some_and(|t| t.is(text))
    }

    /// True if the current token is any of `texts`.
    pub(crate) fn check_any(&self, texts: &[&str]) -> bool {
        texts.iter().any(|t| self.check(t))
    }

    /// Consume the current token if it is `text`.
    pub(crate) fn eat(&mut self, text: &str) -> bool {
        if self.check(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume and return the current token.
    pub(crate) fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consume `expected` or fail.
    pub(crate) fn expect(&mut self, expected: &'static str) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(ParseErrorKind::Expected { expected }))
        }
    }

    /// Error located at the current token.
    #[cold]
    pub(crate) fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.current().map(|t| t.index), self.text)
    }

    /// Error for the current token not fitting any rule.
    #[cold]
    pub(crate) fn unexpected(&self) -> ParseError {
        match self.current() {
            Some(token) => self.error(ParseErrorKind::UnexpectedToken {
                found: token.text.clone(),
            }),
            None => self.error(ParseErrorKind::UnexpectedEnd),
        }
    }
}
