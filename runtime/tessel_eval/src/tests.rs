use super::*;
use pretty_assertions::assert_eq;
use tessel_ir::{Error, FunctionKind, FunctionRef, ObjectRef, Value};

fn parser() -> Parser {
    Parser::new(FilterRegistry::with_builtins())
}

fn eval(text: &str) -> Value {
    parser().parse(text).unwrap().evaluate(&Value::Undefined, None).unwrap()
}

fn eval_on(text: &str, scope: &Value) -> tessel_ir::Result<Value> {
    parser().parse(text)?.evaluate(scope, None)
}

fn is_security(result: tessel_ir::Result<Value>) -> bool {
    matches!(result, Err(Error::Security(_)))
}

// === Literals ===

#[test]
fn numeric_literals() {
    assert_eq!(eval("42"), Value::from(42));
    assert_eq!(eval("4.2"), Value::from(4.2));
    assert_eq!(eval("42e3"), Value::from(42000));
    assert_eq!(eval(".42e+2"), Value::from(42));
    assert_eq!(eval("4e-2"), Value::from(0.04));
    assert!(parser().parse("42e-").is_err());
    assert!(parser().parse("42e-a").is_err());
}

#[test]
fn string_and_constant_literals() {
    assert_eq!(eval("'a\\nb'"), Value::from("a\nb"));
    assert_eq!(eval("'\\u00A0'"), Value::from("\u{00A0}"));
    assert_eq!(eval("true"), Value::Bool(true));
    assert_eq!(eval("null"), Value::Null);
    assert!(eval("undefined").is_undefined());
    assert!(eval("").is_undefined());
}

#[test]
fn object_literal_round_trip() {
    let expected = Value::object([
        ("a", Value::from(1)),
        ("b", Value::array(vec![Value::from(2), Value::from(3)])),
        ("c", Value::object([("d", Value::from(4))])),
    ]);
    assert_eq!(eval("{a:1,b:[2,3],c:{d:4}}"), expected);
}

#[test]
fn literals_produce_fresh_values() {
    let expression = parser().parse("[1, 2]").unwrap();
    let first = expression.evaluate(&Value::Undefined, None).unwrap();
    let second = expression.evaluate(&Value::Undefined, None).unwrap();
    assert!(first.deep_equals(&second));
    assert!(!first.same_value(&second));
}

#[test]
fn computed_object_keys() {
    let scope = Value::object([("k", Value::from("dyn"))]);
    let result = eval_on("{[k]: 1}", &scope).unwrap();
    assert_eq!(result, Value::object([("dyn", Value::from(1))]));
}

// === Operators ===

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(eval("1 + 2 * 3"), Value::from(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::from(9));
    assert_eq!(eval("7 % 4 - 1"), Value::from(2));
    assert_eq!(eval("'a' + 1"), Value::from("a1"));
    assert_eq!(eval("-(-2)"), Value::from(2));
}

#[test]
fn undefined_operands_count_as_zero() {
    assert_eq!(eval("undefined + 1"), Value::from(1));
    assert_eq!(eval("1 - undefined"), Value::from(1));
    assert_eq!(eval("-undefined"), Value::from(0));
    assert_eq!(eval("undefined + undefined"), Value::from(0));
    let empty = Value::Object(ObjectRef::new());
    assert_eq!(eval_on("a + 1", &empty).unwrap(), Value::from(1));
    assert_eq!(eval_on("a + b", &empty).unwrap(), Value::from(0));
    assert_eq!(eval_on("a - b", &empty).unwrap(), Value::from(0));
}

#[test]
fn comparisons() {
    assert_eq!(eval("1 < 2 == true"), Value::Bool(true));
    assert_eq!(eval("'a' < 'b'"), Value::Bool(true));
    assert_eq!(eval("1 == '1'"), Value::Bool(true));
    assert_eq!(eval("1 === '1'"), Value::Bool(false));
    assert_eq!(eval("null == undefined"), Value::Bool(true));
    assert_eq!(eval("null !== undefined"), Value::Bool(true));
}

#[test]
fn logical_operators_return_operands() {
    assert_eq!(eval("0 || 'x'"), Value::from("x"));
    assert_eq!(eval("1 && 'y'"), Value::from("y"));
    assert_eq!(eval("'' && 'y'"), Value::from(""));
    assert_eq!(eval("true ? 1 : 2"), Value::from(1));
}

#[test]
fn logical_operators_short_circuit() {
    let scope = ObjectRef::new();
    let value = Value::Object(scope.clone());
    eval_on("false && (a = 1)", &value).unwrap();
    eval_on("true || (b = 1)", &value).unwrap();
    assert!(!scope.has_own("a"));
    assert!(!scope.has_own("b"));
}

// === Scope and locals ===

#[test]
fn identifiers_prefer_locals() {
    let expression = parser().parse("a + b").unwrap();
    let scope = Value::object([("a", Value::from(1)), ("b", Value::from(2))]);
    let locals = Value::object([("b", Value::from(10))]);
    assert_eq!(
        expression.evaluate(&scope, Some(&locals)).unwrap(),
        Value::from(11)
    );
}

#[test]
fn this_and_locals_keywords() {
    let scope = Value::object([("a", Value::from(1))]);
    let locals = Value::object([("a", Value::from(2))]);
    let expression = parser().parse("this.a + $locals.a").unwrap();
    assert_eq!(
        expression.evaluate(&scope, Some(&locals)).unwrap(),
        Value::from(3)
    );
}

#[test]
fn missing_members_read_undefined() {
    let scope = Value::Object(ObjectRef::new());
    assert!(eval_on("a.b.c", &scope).unwrap().is_undefined());
    assert!(eval_on("a[0]", &scope).unwrap().is_undefined());
}

#[test]
fn assignment_creates_intermediate_objects() {
    let scope = ObjectRef::new();
    let value = Value::Object(scope.clone());
    assert_eq!(eval_on("a.b.c = 1", &value).unwrap(), Value::from(1));
    assert_eq!(
        Value::Object(scope).get_member("a"),
        Value::object([("b", Value::object([("c", Value::from(1))]))])
    );
}

#[test]
fn assignment_targets_locals_when_present() {
    let scope = ObjectRef::new();
    let locals = ObjectRef::from_pairs([("x", Value::from(0))]);
    parser()
        .parse("x = 5")
        .unwrap()
        .evaluate(&Value::Object(scope.clone()), Some(&Value::Object(locals.clone())))
        .unwrap();
    assert_eq!(locals.get("x"), Value::from(5));
    assert!(!scope.has_own("x"));
}

#[test]
fn assign_through_expression() {
    let expression = parser().parse("user.name").unwrap();
    assert!(expression.is_assignable());
    let scope = ObjectRef::new();
    expression
        .assign(&Value::Object(scope.clone()), Value::from("Ann"), None)
        .unwrap();
    assert_eq!(
        Value::Object(scope).get_member("user").get_member("name"),
        Value::from("Ann")
    );
    assert!(!parser().parse("a + b").unwrap().is_assignable());
}

#[test]
fn computed_member_and_array_index() {
    let scope = Value::object([
        ("list", Value::array(vec![Value::from(10), Value::from(20)])),
        ("i", Value::from(1)),
    ]);
    assert_eq!(eval_on("list[i]", &scope).unwrap(), Value::from(20));
    assert_eq!(eval_on("list.length", &scope).unwrap(), Value::from(2));
    assert_eq!(eval_on("list[i] = 3; list[1]", &scope).unwrap(), Value::from(3));
}

// === Calls ===

#[test]
fn method_calls_bind_this() {
    let counter = ObjectRef::from_pairs([("n", Value::from(41))]);
    counter.set(
        "next",
        Value::function("next", |this, _| Ok(Value::from(this.get_member("n").to_number() + 1.0))),
    );
    let scope = Value::object([("counter", Value::Object(counter))]);
    assert_eq!(eval_on("counter.next()", &scope).unwrap(), Value::from(42));
}

#[test]
fn call_arguments() {
    let scope = Value::object([(
        "add",
        Value::function("add", |_, args| {
            Ok(Value::from(args.iter().map(Value::to_number).sum::<f64>()))
        }),
    )]);
    assert_eq!(eval_on("add(1, 2, 3)", &scope).unwrap(), Value::from(6));
}

#[test]
fn calling_undefined_is_undefined() {
    let scope = Value::Object(ObjectRef::new());
    assert!(eval_on("missing()", &scope).unwrap().is_undefined());
}

#[test]
fn calling_non_function_is_type_error() {
    let scope = Value::object([("n", Value::from(1))]);
    assert!(matches!(eval_on("n()", &scope), Err(Error::Type(_))));
}

// === Sandbox ===

#[test]
fn forbidden_member_names_fail_at_parse() {
    for text in [
        "obj.__proto__",
        "obj.constructor",
        "obj['__proto__']",
        "__defineGetter__",
        "obj.__lookupSetter__",
    ] {
        assert!(
            matches!(parser().parse(text), Err(Error::Security(_))),
            "{text} should be rejected"
        );
    }
}

#[test]
fn forbidden_computed_member_fails_at_evaluation() {
    let scope = Value::object([
        ("obj", Value::Object(ObjectRef::new())),
        ("key", Value::from("__proto__")),
    ]);
    assert!(is_security(eval_on("obj[key]", &scope)));
}

#[test]
fn window_like_objects_are_rejected() {
    let window = Value::object([
        ("document", Value::Object(ObjectRef::new())),
        ("location", Value::Object(ObjectRef::new())),
        ("alert", Value::function("alert", |_, _| Ok(Value::Undefined))),
        ("setInterval", Value::function("setInterval", |_, _| Ok(Value::Undefined))),
    ]);
    let scope = Value::object([("wnd", window)]);
    assert!(is_security(eval_on("wnd", &scope)));
}

#[test]
fn dom_like_objects_are_rejected() {
    let node = Value::object([
        ("children", Value::array(vec![])),
        ("nodeName", Value::from("DIV")),
    ]);
    let element = Value::object([
        ("children", Value::array(vec![])),
        ("prop", Value::Null),
        ("attr", Value::Null),
        ("find", Value::Null),
    ]);
    let scope = Value::object([("node", node), ("el", element)]);
    assert!(is_security(eval_on("node", &scope)));
    assert!(is_security(eval_on("el", &scope)));
}

#[test]
fn object_constructor_is_rejected() {
    let object_ctor = Value::object([(
        "getOwnPropertyNames",
        Value::function("getOwnPropertyNames", |_, _| Ok(Value::Undefined)),
    )]);
    let scope = Value::object([("O", object_ctor)]);
    assert!(is_security(eval_on("O", &scope)));
}

#[test]
fn function_constructor_is_rejected() {
    let ctor = FunctionRef::with_kind("Function", FunctionKind::FunctionConstructor, |_, _| {
        Ok(Value::Undefined)
    });
    let scope = Value::object([("F", Value::Function(ctor))]);
    assert!(is_security(eval_on("F", &scope)));
}

#[test]
fn self_constructing_function_is_rejected() {
    let func = FunctionRef::new("f", |_, _| Ok(Value::Undefined));
    func.props().set("constructor", Value::Function(func.clone()));
    let scope = Value::object([("f", Value::Function(func))]);
    assert!(is_security(eval_on("f()", &scope)));
}

#[test]
fn call_apply_bind_are_rejected() {
    let scope = Value::object([
        ("fn", Value::function("fn", |_, _| Ok(Value::from(1)))),
        ("obj", Value::Object(ObjectRef::new())),
    ]);
    assert!(is_security(eval_on("fn.call(obj)", &scope)));
    assert!(is_security(eval_on("fn.apply(obj)", &scope)));
    assert!(is_security(eval_on("fn.bind(obj)()", &scope)));
}

#[test]
fn unsafe_results_and_assignments_are_rejected() {
    let window = Value::object([
        ("document", Value::Null),
        ("location", Value::Null),
        ("alert", Value::Null),
        ("setInterval", Value::Null),
    ]);
    let scope = Value::object([(
        "getWindow",
        Value::function("getWindow", move |_, _| Ok(window.clone())),
    )]);
    assert!(is_security(eval_on("getWindow()", &scope)));
    assert!(is_security(eval_on("w = getWindow()", &scope)));
}

#[test]
fn ordinary_access_is_allowed() {
    let scope = Value::object([
        ("obj", Value::object([("name", Value::from("ok"))])),
        ("fn", Value::function("fn", |_, args| Ok(args.first().cloned().unwrap_or_default()))),
    ]);
    assert_eq!(eval_on("fn(obj.name)", &scope).unwrap(), Value::from("ok"));
}

// === Filters ===

#[test]
fn builtin_filters() {
    assert_eq!(eval("'abc' | uppercase"), Value::from("ABC"));
    assert_eq!(eval("'ABC' | lowercase | uppercase"), Value::from("ABC"));
    assert_eq!(eval("{a: 1} | json:0"), Value::from(r#"{"a":1}"#));
    assert_eq!(eval("[1] | json"), Value::from("[\n  1\n]"));
}

#[test]
fn filter_arguments() {
    let filters = FilterRegistry::new();
    filters.register(
        "repeat",
        Filter::new("repeat", |args| {
            let text = args[0].to_display_string();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let times = args[1].to_number() as usize;
            Ok(Value::from(text.repeat(times)))
        }),
    );
    let parser = Parser::new(filters);
    let result = parser
        .parse("'ab' | repeat:2")
        .unwrap()
        .evaluate(&Value::Undefined, None)
        .unwrap();
    assert_eq!(result, Value::from("abab"));
}

#[test]
fn unknown_filter_fails_at_parse() {
    let err = parser().parse("a | nope").unwrap_err();
    assert_eq!(err.to_string(), "Unknown provider: nopeFilterProvider <- nopeFilter");
}

#[test]
fn replaced_filter_is_seen_by_later_parses() {
    let filters = FilterRegistry::new();
    filters.register("tag", Filter::new("tag", |_| Ok(Value::from("old"))));
    let p = Parser::new(filters.clone());
    let before = p.parse("x | tag").unwrap();
    assert_eq!(before.evaluate(&Value::Undefined, None).unwrap(), Value::from("old"));

    filters.register("tag", Filter::new("tag", |_| Ok(Value::from("new"))));
    let after = p.parse("x | tag").unwrap();
    assert!(!after.ptr_eq(&before));
    assert_eq!(after.evaluate(&Value::Undefined, None).unwrap(), Value::from("new"));
    assert_eq!(p.cache_len(), 1);
}

#[test]
fn filter_registered_after_a_failed_parse() {
    let filters = FilterRegistry::new();
    let p = Parser::new(filters.clone());
    assert!(p.parse("x | late").is_err());
    filters.register("late", Filter::new("late", |_| Ok(Value::from(7))));
    assert_eq!(
        p.parse("x | late").unwrap().evaluate(&Value::Undefined, None).unwrap(),
        Value::from(7)
    );
}

// === Nesting ===

#[test]
fn deeply_nested_unary_evaluates() {
    let text = format!("{}1", "-".repeat(30_000));
    assert_eq!(eval(&text), Value::from(1));
}

#[test]
fn deeply_nested_parentheses_evaluate() {
    let depth = 10_000;
    let text = format!("{}1{}", "1 + (".repeat(depth), ")".repeat(depth));
    #[allow(clippy::cast_precision_loss)]
    let expected = (depth + 1) as f64;
    assert_eq!(eval(&text), Value::Number(expected));
}

#[test]
fn deeply_nested_member_chain_evaluates() {
    let depth = 10_000;
    let node = ObjectRef::new();
    node.set("next", Value::Object(node.clone()));
    node.set("v", Value::from(5));
    let scope = Value::object([("root", Value::Object(node.clone()))]);
    let text = format!("root{}.v", ".next".repeat(depth));
    assert_eq!(eval_on(&text, &scope).unwrap(), Value::from(5));
    node.set("next", Value::Null);
}

// === Analysis ===

#[test]
fn constant_propagation() {
    let p = parser();
    assert!(p.parse("[1,2,3]").unwrap().is_constant());
    assert!(!p.parse("[1,2,a]").unwrap().is_constant());
    assert!(!p.parse("a=b").unwrap().is_constant());
    assert!(p.parse("true?1:2").unwrap().is_constant());
    assert!(!p.parse("a?1:2").unwrap().is_constant());
    assert!(p.parse("{a: 1}.a").unwrap().is_constant());
    assert!(p.parse("1 + 2 | uppercase").unwrap().is_constant());
}

#[test]
fn stateful_filters_are_never_constant() {
    let filters = FilterRegistry::new();
    filters.register("now", Filter::new("now", |_| Ok(Value::from(1))).stateful());
    let parser = Parser::new(filters);
    let expression = parser.parse("1 | now").unwrap();
    assert!(!expression.is_constant());
    assert_eq!(expression.watch_delegate(), WatchDelegate::None);
}

#[test]
fn literal_flag() {
    let p = parser();
    assert!(p.parse("[a]").unwrap().is_literal());
    assert!(p.parse("{a: b}").unwrap().is_literal());
    assert!(p.parse("1").unwrap().is_literal());
    assert!(!p.parse("a").unwrap().is_literal());
}

#[test]
fn inputs_for_decomposable_expressions() {
    let p = parser();
    let sum = p.parse("a + b").unwrap();
    assert_eq!(sum.inputs().len(), 2);
    assert_eq!(sum.watch_delegate(), WatchDelegate::Inputs);

    let scope = Value::object([("a", Value::from(1)), ("b", Value::from(2))]);
    let values: Vec<Value> = sum
        .inputs()
        .iter()
        .map(|input| input.evaluate(&scope, None).unwrap())
        .collect();
    assert_eq!(values, vec![Value::from(1), Value::from(2)]);

    let single = p.parse("a").unwrap();
    assert!(single.inputs().is_empty());
    assert_eq!(single.watch_delegate(), WatchDelegate::None);

    let call = p.parse("f(a)").unwrap();
    assert!(call.inputs().is_empty());
}

#[test]
fn unary_shares_argument_inputs() {
    let negated = parser().parse("!a.b").unwrap();
    assert_eq!(negated.inputs().len(), 1);
    assert_eq!(negated.watch_delegate(), WatchDelegate::Inputs);
}

// === Parser service ===

#[test]
fn delegates() {
    let p = parser();
    assert_eq!(p.parse("1 + 1").unwrap().watch_delegate(), WatchDelegate::Constant);
    assert_eq!(p.parse("::a").unwrap().watch_delegate(), WatchDelegate::OneTime);
    assert_eq!(
        p.parse("::[a, b]").unwrap().watch_delegate(),
        WatchDelegate::OneTimeLiteral
    );
    assert_eq!(p.parse("::1").unwrap().watch_delegate(), WatchDelegate::Constant);
}

#[test]
fn one_time_prefix_is_stripped() {
    let expression = parser().parse("  ::a.b ").unwrap();
    assert!(expression.is_one_time());
    assert_eq!(expression.source(), "a.b");
}

#[test]
fn cache_reuses_compiled_expressions() {
    let p = parser();
    let first = p.parse("a + b").unwrap();
    let second = p.parse(" a + b ").unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(p.cache_len(), 1);
    let one_time = p.parse("::a + b").unwrap();
    assert!(!one_time.ptr_eq(&first));
}

#[test]
fn native_closures_wrap_as_expressions() {
    let expression = parser().parse_fn(|scope, _| Ok(scope.get_member("x")));
    let scope = Value::object([("x", Value::from(3))]);
    assert_eq!(expression.evaluate(&scope, None).unwrap(), Value::from(3));
    assert_eq!(expression.watch_delegate(), WatchDelegate::None);
}
