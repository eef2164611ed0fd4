//! Primary expressions and postfix chains.

use std::rc::Rc;

use tessel_ir::{ExprId, ExprKind, Property, PropertyKey, Value};

use crate::error::{ParseError, ParseErrorKind};
use crate::Parser;

impl Parser<'_> {
    /// Primary expression followed by any number of `.name`, `[expr]` and
    /// `(args)` suffixes.
    pub(crate) fn parse_primary(&mut self) -> Result<ExprId, ParseError> {
        let mut primary = if self.cursor.eat("(") {
            let inner = self.parse_filter_chain()?;
            self.cursor.expect(")")?;
            inner
        } else if self.cursor.eat("[") {
            self.parse_array()?
        } else if self.cursor.eat("{") {
            self.parse_object()?
        } else {
            self.parse_atom()?
        };

        loop {
            if self.cursor.eat("(") {
                let args = self.parse_arguments()?;
                self.cursor.expect(")")?;
                primary = self.alloc(ExprKind::Call {
                    callee: primary,
                    args,
                    filter: false,
                });
            } else if self.cursor.eat("[") {
                let property = self.parse_expr()?;
                self.cursor.expect("]")?;
                primary = self.alloc(ExprKind::Member {
                    object: primary,
                    property,
                    computed: true,
                });
            } else if self.cursor.eat(".") {
                let property = self.parse_identifier()?;
                primary = self.alloc(ExprKind::Member {
                    object: primary,
                    property,
                    computed: false,
                });
            } else {
                return Ok(primary);
            }
        }
    }

    /// Constants, identifiers and literal tokens.
    fn parse_atom(&mut self) -> Result<ExprId, ParseError> {
        let Some(token) = self.cursor.current() else {
            return Err(self.cursor.unexpected());
        };
        let kind = if token.identifier {
            match token.text.as_str() {
                "true" => ExprKind::Literal(Value::Bool(true)),
                "false" => ExprKind::Literal(Value::Bool(false)),
                "null" => ExprKind::Literal(Value::Null),
                "undefined" => ExprKind::Literal(Value::Undefined),
                "this" => ExprKind::This,
                "$locals" => ExprKind::Locals,
                name => ExprKind::Identifier(Rc::from(name)),
            }
        } else if let Some(value) = &token.value {
            ExprKind::Literal(value.clone())
        } else {
            return Err(self.cursor.unexpected());
        };
        self.cursor.advance();
        Ok(self.alloc(kind))
    }

    /// A bare name, as used after `.` and for filter names.
    pub(crate) fn parse_identifier(&mut self) -> Result<ExprId, ParseError> {
        match self.cursor.current() {
            Some(token) if token.identifier => {
                let name: Rc<str> = Rc::from(token.text.as_str());
                self.cursor.advance();
                Ok(self.alloc(ExprKind::Identifier(name)))
            }
            Some(token) => {
                let found = token.text.clone();
                Err(self.cursor.error(ParseErrorKind::NotIdentifier { found }))
            }
            None => Err(self.cursor.error(ParseErrorKind::UnexpectedEnd)),
        }
    }

    /// `[a, b, c,]` after the opening bracket.
    fn parse_array(&mut self) -> Result<ExprId, ParseError> {
        let mut elements = Vec::new();
        if !self.cursor.check("]") {
            loop {
                if self.cursor.check("]") {
                    break;
                }
                elements.push(self.parse_expr()?);
                if !self.cursor.eat(",") {
                    break;
                }
            }
        }
        self.cursor.expect("]")?;
        Ok(self.alloc(ExprKind::Array(elements)))
    }

    /// `{a: 1, 'b': 2, [c]: 3,}` after the opening brace.
    fn parse_object(&mut self) -> Result<ExprId, ParseError> {
        let mut properties = Vec::new();
        if !self.cursor.check("}") {
            loop {
                if self.cursor.check("}") {
                    break;
                }
                let key = self.parse_property_key()?;
                self.cursor.expect(":")?;
                let value = self.parse_expr()?;
                properties.push(Property { key, value });
                if !self.cursor.eat(",") {
                    break;
                }
            }
        }
        self.cursor.expect("}")?;
        Ok(self.alloc(ExprKind::Object(properties)))
    }

    fn parse_property_key(&mut self) -> Result<PropertyKey, ParseError> {
        if self.cursor.eat("[") {
            let key = self.parse_expr()?;
            self.cursor.expect("]")?;
            return Ok(PropertyKey::Computed(key));
        }
        let Some(token) = self.cursor.current() else {
            return Err(self.cursor.unexpected());
        };
        let name = if token.identifier {
            Rc::from(token.text.as_str())
        } else if let Some(value) = &token.value {
            Rc::from(value.to_display_string())
        } else {
            return Err(self.cursor.unexpected());
        };
        self.cursor.advance();
        Ok(PropertyKey::Named(name))
    }

    fn parse_arguments(&mut self) -> Result<Vec<ExprId>, ParseError> {
        let mut args = Vec::new();
        if !self.cursor.check(")") {
            loop {
                args.push(self.parse_filter_chain()?);
                if !self.cursor.eat(",") {
                    break;
                }
            }
        }
        Ok(args)
    }
}
