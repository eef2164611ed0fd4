//! Parse error types.

use tessel_ir::Error;

/// What the parser tripped over.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ParseErrorKind {
    /// A specific punctuation token was required.
    Expected { expected: &'static str },
    /// A token appeared where no rule accepts it.
    UnexpectedToken { found: String },
    /// Input ran out in the middle of an expression.
    UnexpectedEnd,
    /// A name was required after `.` or as a filter name.
    NotIdentifier { found: String },
    /// Left side of `=` is neither an identifier nor a member access.
    NonAssignable,
}

/// A parse failure, carrying the source text for the rendered message.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Character offset of the offending token, if any.
    pub index: Option<usize>,
    pub text: String,
}

impl ParseError {
    #[cold]
    pub(crate) fn new(kind: ParseErrorKind, index: Option<usize>, text: &str) -> Self {
        ParseError {
            kind,
            index,
            text: text.to_string(),
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            ParseErrorKind::Expected { expected } => format!("Unexpected. Expecting: {expected}"),
            ParseErrorKind::UnexpectedToken { found } => format!("Unexpected token: {found}"),
            ParseErrorKind::UnexpectedEnd => "Unexpected end of expression".to_string(),
            ParseErrorKind::NotIdentifier { found } => {
                format!("Token '{found}' is not a valid identifier")
            }
            ParseErrorKind::NonAssignable => "Trying to assign a value to a non l-value".to_string(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in expression [{}]", self.message(), self.text)
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse {
            message: err.message(),
            text: err.text,
        }
    }
}
