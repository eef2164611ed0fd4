//! Expression grammar.
//!
//! - `mod.rs`: program, filter chain and the binary precedence chain
//! - `operators.rs`: operator matching helpers
//! - `primary.rs`: literals, identifiers, array/object literals, member
//!   access and calls

mod operators;
mod primary;

use tessel_ir::{BinaryOp, Expr, ExprId, ExprKind, LogicalOp};
use tessel_stack::ensure_sufficient_stack;

use crate::error::{ParseError, ParseErrorKind};
use crate::Parser;

impl Parser<'_> {
    /// Parse `;`-separated statements until the tokens run out.
    pub(crate) fn parse_program(&mut self) -> Result<Vec<ExprId>, ParseError> {
        let mut body = Vec::new();
        loop {
            if !self.cursor.is_at_end() && !self.cursor.check_any(&["}", ")", ";", "]"]) {
                body.push(self.parse_filter_chain()?);
            }
            if !self.cursor.eat(";") {
                break;
            }
        }
        if !self.cursor.is_at_end() {
            return Err(self.cursor.unexpected());
        }
        Ok(body)
    }

    /// `expr | name:arg:arg | other`
    pub(crate) fn parse_filter_chain(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_expr()?;
        while self.cursor.eat("|") {
            left = self.parse_filter(left)?;
        }
        Ok(left)
    }

    fn parse_filter(&mut self, input: ExprId) -> Result<ExprId, ParseError> {
        let callee = self.parse_identifier()?;
        let mut args = vec![input];
        while self.cursor.eat(":") {
            args.push(self.parse_expr()?);
        }
        Ok(self.alloc(ExprKind::Call {
            callee,
            args,
            filter: true,
        }))
    }

    /// Parse an expression (assignment level).
    ///
    /// Uses `ensure_sufficient_stack` so deeply nested input cannot
    /// overflow the native stack.
    pub(crate) fn parse_expr(&mut self) -> Result<ExprId, ParseError> {
        ensure_sufficient_stack(|| self.parse_assignment())
    }

    fn parse_assignment(&mut self) -> Result<ExprId, ParseError> {
        let target = self.parse_ternary()?;
        if !self.cursor.check("=") {
            return Ok(target);
        }
        if !matches!(
            self.arena.kind(target),
            ExprKind::Identifier(_) | ExprKind::Member { .. }
        ) {
            return Err(self.cursor.error(ParseErrorKind::NonAssignable));
        }
        self.cursor.advance();
        let value = self.parse_expr()?;
        Ok(self.alloc(ExprKind::Assign { target, value }))
    }

    fn parse_ternary(&mut self) -> Result<ExprId, ParseError> {
        let test = self.parse_logical_or()?;
        if !self.cursor.eat("?") {
            return Ok(test);
        }
        let consequent = self.parse_expr()?;
        self.cursor.expect(":")?;
        let alternate = self.parse_expr()?;
        Ok(self.alloc(ExprKind::Conditional {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_logical_or(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_logical_and()?;
        while self.cursor.eat("||") {
            let right = self.parse_logical_and()?;
            left = self.alloc(ExprKind::Logical {
                op: LogicalOp::Or,
                left,
                right,
            });
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_equality()?;
        while self.cursor.eat("&&") {
            let right = self.parse_equality()?;
            left = self.alloc(ExprKind::Logical {
                op: LogicalOp::And,
                left,
                right,
            });
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_relational()?;
        while let Some(op) = self.match_equality_op() {
            self.cursor.advance();
            let right = self.parse_relational()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_additive()?;
        while let Some(op) = self.match_relational_op() {
            self.cursor.advance();
            let right = self.parse_additive()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.match_additive_op() {
            self.cursor.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<ExprId, ParseError> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.match_multiplicative_op() {
            self.cursor.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExprId, ParseError> {
        if let Some(op) = self.match_unary_op() {
            self.cursor.advance();
            let argument = ensure_sufficient_stack(|| self.parse_unary())?;
            return Ok(self.alloc(ExprKind::Unary { op, argument }));
        }
        self.parse_primary()
    }

    #[inline]
    pub(crate) fn alloc(&mut self, kind: ExprKind) -> ExprId {
        self.arena.alloc_expr(Expr::new(kind))
    }

    fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.alloc(ExprKind::Binary { op, left, right })
    }
}
