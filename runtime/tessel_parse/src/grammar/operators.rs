//! Operator matching helpers.

use tessel_ir::{BinaryOp, UnaryOp};

use crate::Parser;

impl Parser<'_> {
    fn match_binary_op(&self, ops: &[&str]) -> Option<BinaryOp> {
        let token = self.cursor.current()?;
        if token.identifier || token.value.is_some() || !ops.contains(&token.text.as_str()) {
            return None;
        }
        BinaryOp::from_symbol(&token.text)
    }

    pub(crate) fn match_equality_op(&self) -> Option<BinaryOp> {
        self.match_binary_op(&["==", "!=", "===", "!=="])
    }

    pub(crate) fn match_relational_op(&self) -> Option<BinaryOp> {
        self.match_binary_op(&["<", ">", "<=", ">="])
    }

    pub(crate) fn match_additive_op(&self) -> Option<BinaryOp> {
        self.match_binary_op(&["+", "-"])
    }

    pub(crate) fn match_multiplicative_op(&self) -> Option<BinaryOp> {
        self.match_binary_op(&["*", "/", "%"])
    }

    pub(crate) fn match_unary_op(&self) -> Option<UnaryOp> {
        if self.cursor.check("+") {
            Some(UnaryOp::Plus)
        } else if self.cursor.check("-") {
            Some(UnaryOp::Neg)
        } else if self.cursor.check("!") {
            Some(UnaryOp::Not)
        } else {
            None
        }
    }
}
