use super::*;
use pretty_assertions::assert_eq;
use tessel_ir::{ExprId, ExprKind, PropertyKey};

/// Render a parsed program as an s-expression for structural comparison.
fn sexpr(text: &str) -> String {
    let ast = parse(text).unwrap();
    ast.body
        .iter()
        .map(|&id| render(&ast.arena, id))
        .collect::<Vec<_>>()
        .join("; ")
}

fn render(arena: &ExprArena, id: ExprId) -> String {
    match arena.kind(id) {
        ExprKind::Literal(value) => match value {
            tessel_ir::Value::String(s) => format!("'{s}'"),
            other => other.to_display_string(),
        },
        ExprKind::Identifier(name) => name.to_string(),
        ExprKind::Array(items) => format!(
            "[{}]",
            items
                .iter()
                .map(|&i| render(arena, i))
                .collect::<Vec<_>>()
                .join(" ")
        ),
        ExprKind::Object(props) => format!(
            "{{{}}}",
            props
                .iter()
                .map(|p| {
                    let key = match &p.key {
                        PropertyKey::Named(name) => name.to_string(),
                        PropertyKey::Computed(k) => format!("[{}]", render(arena, *k)),
                    };
                    format!("{key}:{}", render(arena, p.value))
                })
                .collect::<Vec<_>>()
                .join(" ")
        ),
        ExprKind::This => "this".to_string(),
        ExprKind::Locals => "$locals".to_string(),
        ExprKind::Member {
            object,
            property,
            computed,
        } => {
            let object = render(arena, *object);
            let property = render(arena, *property);
            if *computed {
                format!("(index {object} {property})")
            } else {
                format!("(. {object} {property})")
            }
        }
        ExprKind::Call {
            callee,
            args,
            filter,
        } => {
            let head = if *filter { "filter" } else { "call" };
            let mut parts = vec![head.to_string(), render(arena, *callee)];
            parts.extend(args.iter().map(|&a| render(arena, a)));
            format!("({})", parts.join(" "))
        }
        ExprKind::Assign { target, value } => {
            format!("(= {} {})", render(arena, *target), render(arena, *value))
        }
        ExprKind::Unary { op, argument } => {
            let sym = match op {
                tessel_ir::UnaryOp::Plus => "+",
                tessel_ir::UnaryOp::Neg => "-",
                tessel_ir::UnaryOp::Not => "!",
            };
            format!("({sym} {})", render(arena, *argument))
        }
        ExprKind::Binary { op, left, right } => format!(
            "({} {} {})",
            op.as_symbol(),
            render(arena, *left),
            render(arena, *right)
        ),
        ExprKind::Logical { op, left, right } => {
            let sym = match op {
                tessel_ir::LogicalOp::And => "&&",
                tessel_ir::LogicalOp::Or => "||",
            };
            format!("({sym} {} {})", render(arena, *left), render(arena, *right))
        }
        ExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => format!(
            "(? {} {} {})",
            render(arena, *test),
            render(arena, *consequent),
            render(arena, *alternate)
        ),
    }
}

fn parse_err(text: &str) -> ParseErrorKind {
    let tokens = tessel_lexer::lex(text).unwrap();
    parse_tokens(text, tokens).unwrap_err().kind
}

// === Precedence ===

#[test]
fn multiplicative_binds_tighter_than_additive() {
    assert_eq!(sexpr("1 + 2 * 3"), "(+ 1 (* 2 3))");
    assert_eq!(sexpr("1 * 2 + 3 % 4"), "(+ (* 1 2) (% 3 4))");
}

#[test]
fn binary_operators_are_left_associative() {
    assert_eq!(sexpr("1 - 2 - 3"), "(- (- 1 2) 3)");
}

#[test]
fn relational_binds_tighter_than_equality() {
    assert_eq!(sexpr("a == b < c"), "(== a (< b c))");
    assert_eq!(sexpr("a < b === c > d"), "(=== (< a b) (> c d))");
}

#[test]
fn and_binds_tighter_than_or() {
    assert_eq!(sexpr("a || b && c"), "(|| a (&& b c))");
}

#[test]
fn ternary_and_assignment() {
    assert_eq!(sexpr("a ? b : c ? d : e"), "(? a b (? c d e))");
    assert_eq!(sexpr("a = b = 1"), "(= a (= b 1))");
    assert_eq!(sexpr("a = b ? 1 : 2"), "(= a (? b 1 2))");
}

#[test]
fn unary_operators_nest() {
    assert_eq!(sexpr("!!a"), "(! (! a))");
    assert_eq!(sexpr("-a * +b"), "(* (- a) (+ b))");
}

#[test]
fn parentheses_override_precedence() {
    assert_eq!(sexpr("(1 + 2) * 3"), "(* (+ 1 2) 3)");
}

// === Primaries ===

#[test]
fn constants() {
    assert_eq!(sexpr("true"), "true");
    assert_eq!(sexpr("null"), "null");
    assert_eq!(sexpr("undefined"), "undefined");
    assert_eq!(sexpr("this"), "this");
    assert_eq!(sexpr("$locals"), "$locals");
}

#[test]
fn member_chains_and_calls() {
    assert_eq!(sexpr("a.b.c"), "(. (. a b) c)");
    assert_eq!(sexpr("a[b].c"), "(. (index a b) c)");
    assert_eq!(sexpr("a.b(1, c)"), "(call (. a b) 1 c)");
    assert_eq!(sexpr("f()()"), "(call (call f))");
}

#[test]
fn array_literals_allow_trailing_comma() {
    assert_eq!(sexpr("[1, 'a', b,]"), "[1 'a' b]");
    assert_eq!(sexpr("[]"), "[]");
}

#[test]
fn object_literals() {
    assert_eq!(
        sexpr("{a: 1, 'b': [2, 3], c: {d: 4},}"),
        "{a:1 b:[2 3] c:{d:4}}"
    );
    assert_eq!(sexpr("{[k]: v}"), "{[k]:v}");
    assert_eq!(sexpr("{}"), "{}");
}

// === Filters and statements ===

#[test]
fn filter_chains() {
    assert_eq!(sexpr("a | upper"), "(filter upper a)");
    assert_eq!(
        sexpr("a | f:1:b | g"),
        "(filter g (filter f a 1 b))"
    );
}

#[test]
fn filter_inside_call_arguments() {
    assert_eq!(sexpr("fn(a | f)"), "(call fn (filter f a))");
}

#[test]
fn statements() {
    assert_eq!(sexpr("a = 1; b = 2"), "(= a 1); (= b 2)");
    assert_eq!(sexpr("a;"), "a");
    assert_eq!(sexpr(""), "");
}

// === Errors ===

#[test]
fn missing_closing_bracket() {
    assert_eq!(parse_err("[1, 2"), ParseErrorKind::Expected { expected: "]" });
    assert_eq!(parse_err("a[1"), ParseErrorKind::Expected { expected: "]" });
    assert_eq!(parse_err("a ? b"), ParseErrorKind::Expected { expected: ":" });
}

#[test]
fn dangling_operator() {
    assert_eq!(parse_err("1 +"), ParseErrorKind::UnexpectedEnd);
}

#[test]
fn trailing_garbage() {
    assert_eq!(
        parse_err("a b"),
        ParseErrorKind::UnexpectedToken {
            found: "b".to_string()
        }
    );
    assert_eq!(
        parse_err("a)"),
        ParseErrorKind::UnexpectedToken {
            found: ")".to_string()
        }
    );
}

#[test]
fn member_name_must_be_identifier() {
    assert_eq!(
        parse_err("a.+"),
        ParseErrorKind::NotIdentifier {
            found: "+".to_string()
        }
    );
    assert_eq!(parse_err("a."), ParseErrorKind::UnexpectedEnd);
}

#[test]
fn non_assignable_target() {
    assert_eq!(parse_err("1 = 2"), ParseErrorKind::NonAssignable);
    assert_eq!(parse_err("f() = 2"), ParseErrorKind::NonAssignable);
}

#[test]
fn errors_convert_to_shared_error() {
    let err = parse("[1, 2").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Syntax Error: Unexpected. Expecting: ] in expression [[1, 2]"
    );
    assert!(matches!(parse("42e-"), Err(Error::Lex { .. })));
}
