//! Tessel Lexer - tokenizes expression source text.
//!
//! Single pass, no backtracking over characters. Produces a flat token list
//! of numbers, strings, identifiers, operators and punctuation; the parser
//! consumes it front to back.
//!
//! Operators are matched longest-first among the 3, 2 and 1 character
//! tables so `!==` never lexes as `!=` followed by `=`.

mod escape;
mod lex_error;

pub use lex_error::{LexError, LexErrorKind};

use tessel_ir::{Token, Value};
use tracing::trace;

/// Operator table; `|` doubles as the filter pipe.
const OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "!", "<", ">", "<=", ">=", "==", "!=", "===", "!==", "=", "&&", "||",
    "|",
];

/// Tokenize `text`.
pub fn lex(text: &str) -> Result<Vec<Token>, LexError> {
    let tokens = Lexer::new(text).run()?;
    trace!(text, tokens = tokens.len(), "lexed expression");
    Ok(tokens)
}

struct Lexer<'a> {
    text: &'a str,
    chars: Vec<char>,
    index: usize,
    tokens: Vec<Token>,
}

#[inline]
fn is_number(c: char) -> bool {
    c.is_ascii_digit()
}

#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

#[inline]
fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || is_number(c)
}

#[inline]
fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\r' | '\t' | '\n' | '\u{000B}' | '\u{00A0}')
}

#[inline]
fn is_exp_operator(c: char) -> bool {
    c == '-' || c == '+' || is_number(c)
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer {
            text,
            chars: text.chars().collect(),
            index: 0,
            tokens: Vec::new(),
        }
    }

    #[inline]
    fn current(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    #[inline]
    fn peek(&self, n: usize) -> Option<char> {
        self.chars.get(self.index + n).copied()
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end.min(self.chars.len())].iter().collect()
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.current() {
            if c == '\'' || c == '"' {
                self.read_string(c)?;
            } else if is_number(c) || (c == '.' && self.peek(1).is_some_and(is_number)) {
                self.read_number()?;
            } else if is_ident_start(c) {
                self.read_ident();
            } else if "[]{}:,.()?;".contains(c) {
                self.tokens.push(Token::op(c.to_string(), self.index));
                self.index += 1;
            } else if is_whitespace(c) {
                self.index += 1;
            } else {
                self.read_operator(c)?;
            }
        }
        Ok(self.tokens)
    }

    fn read_operator(&mut self, c: char) -> Result<(), LexError> {
        for width in [3, 2, 1] {
            if self.index + width > self.chars.len() {
                continue;
            }
            let candidate = self.slice(self.index, self.index + width);
            if OPERATORS.contains(&candidate.as_str()) {
                self.tokens.push(Token::op(candidate, self.index));
                self.index += width;
                return Ok(());
            }
        }
        Err(LexError::new(
            LexErrorKind::UnexpectedCharacter { found: c },
            self.index,
            self.index + 1,
            self.text,
        ))
    }

    fn read_number(&mut self) -> Result<(), LexError> {
        let start = self.index;
        let mut number = String::new();
        while let Some(raw) = self.current() {
            let c = raw.to_ascii_lowercase();
            if c == '.' || is_number(c) {
                number.push(c);
            } else {
                let next = self.peek(1);
                let after_exponent = number.ends_with('e');
                if c == 'e' && next.is_some_and(is_exp_operator) {
                    number.push(c);
                } else if is_exp_operator(c) && after_exponent && next.is_some_and(is_number) {
                    number.push(c);
                } else if is_exp_operator(c) && after_exponent {
                    return Err(LexError::new(
                        LexErrorKind::InvalidExponent,
                        start,
                        self.index + 1,
                        self.text,
                    ));
                } else {
                    break;
                }
            }
            self.index += 1;
        }
        let value: f64 = number.parse().map_err(|_| {
            LexError::new(LexErrorKind::InvalidNumber, start, self.index, self.text)
        })?;
        self.tokens
            .push(Token::literal(number, Value::Number(value), start));
        Ok(())
    }

    fn read_ident(&mut self) {
        let start = self.index;
        while self.current().is_some_and(is_ident_part) {
            self.index += 1;
        }
        let name = self.slice(start, self.index);
        self.tokens.push(Token::ident(name, start));
    }

    fn read_string(&mut self, quote: char) -> Result<(), LexError> {
        let start = self.index;
        self.index += 1;
        let mut decoded = String::new();
        while let Some(c) = self.current() {
            if c == '\\' {
                self.index += 1;
                let escaped = self.current().ok_or_else(|| {
                    LexError::new(
                        LexErrorKind::UnterminatedString,
                        start,
                        self.index,
                        self.text,
                    )
                })?;
                if escaped == 'u' {
                    let hex = self.slice(self.index + 1, self.index + 5);
                    let ch = escape::decode_unicode(&hex).ok_or_else(|| {
                        LexError::new(
                            LexErrorKind::InvalidUnicodeEscape { escape: hex.clone() },
                            self.index - 1,
                            self.index + 5,
                            self.text,
                        )
                    })?;
                    decoded.push(ch);
                    self.index += 5;
                } else {
                    decoded.push(escape::resolve_escape(escaped));
                    self.index += 1;
                }
            } else if c == quote {
                self.index += 1;
                let raw = self.slice(start, self.index);
                self.tokens
                    .push(Token::literal(raw, Value::from(decoded), start));
                return Ok(());
            } else {
                decoded.push(c);
                self.index += 1;
            }
        }
        Err(LexError::new(
            LexErrorKind::UnterminatedString,
            start,
            self.index,
            self.text,
        ))
    }
}
