use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tessel_ir::{Error, ObjectRef, Value};

use super::*;

fn constant(value: Value) -> Injectable {
    Injectable::new(&[], move |_| Ok(value.clone()))
}

fn load(registry: &ModuleRegistry, names: &[&str]) -> tessel_ir::Result<Injector> {
    let specs: Vec<ModuleSpec> = names.iter().map(|name| ModuleSpec::from(*name)).collect();
    create_injector(registry, &specs, false)
}

/// Injectable that appends `label` to `log`.
fn logging(log: &Rc<RefCell<Vec<String>>>, label: &str) -> Injectable {
    let log = Rc::clone(log);
    let label = label.to_string();
    Injectable::new(&[], move |_| {
        log.borrow_mut().push(label.clone());
        Ok(Value::Undefined)
    })
}

// Injector

#[test]
fn services_are_singletons() {
    let injector = Injector::new(false);
    let calls = Rc::new(Cell::new(0));
    let counted = Rc::clone(&calls);
    injector
        .provide()
        .factory(
            "answer",
            Injectable::new(&[], move |_| {
                counted.set(counted.get() + 1);
                Ok(Value::from(42))
            }),
            true,
        )
        .unwrap();

    assert_eq!(injector.get("answer").unwrap(), Value::from(42));
    assert_eq!(injector.get("answer").unwrap(), Value::from(42));
    assert_eq!(calls.get(), 1);
}

#[test]
fn has_sees_providers_and_builtins() {
    let injector = Injector::new(false);
    injector.provide().value("a", Value::from(1)).unwrap();

    assert!(injector.has("a"));
    assert!(injector.has("$injector"));
    assert!(!injector.has("b"));
    assert!(!injector.has("$provide"));
    assert!(injector.provider_injector().has("$provide"));
}

#[test]
fn invoke_prefers_own_locals() {
    let injector = Injector::new(false);
    let provide = injector.provide();
    provide.value("a", Value::from(1)).unwrap();
    provide.value("b", Value::from(100)).unwrap();

    let sum = Injectable::new(&["a", "b"], |args| {
        Ok(Value::from(args[0].to_number() + args[1].to_number()))
    });
    let locals = Value::object([("b", Value::from(2))]);

    assert_eq!(
        injector.invoke(&sum, &Value::Undefined, Some(&locals)).unwrap(),
        Value::from(3)
    );
    assert_eq!(
        injector.invoke(&sum, &Value::Undefined, None).unwrap(),
        Value::from(101)
    );
}

#[test]
fn instantiate_links_prototype() {
    let injector = Injector::new(false);
    injector.provide().value("a", Value::from(1)).unwrap();

    let proto = ObjectRef::new();
    proto.set("greeting", Value::from("hi"));
    let constructor = Injectable::method(&["a"], |this, args| {
        this.set_member("a", args[0].clone())?;
        Ok(Value::Undefined)
    })
    .with_prototype(proto);

    let instance = injector.instantiate(&constructor, None).unwrap();
    assert_eq!(instance.get_member("a"), Value::from(1));
    assert_eq!(instance.get_member("greeting"), Value::from("hi"));
}

#[test]
fn instantiate_keeps_compound_result() {
    let injector = Injector::new(false);
    let replacement = Value::object([("replaced", Value::Bool(true))]);
    let returned = replacement.clone();
    let constructor = Injectable::method(&[], move |_, _| Ok(returned.clone()));

    let instance = injector.instantiate(&constructor, None).unwrap();
    assert!(instance.same_value(&replacement));
}

#[test]
fn strict_mode_rejects_unannotated() {
    let body = Injectable::unannotated(|_, args| Ok(Value::from(args.len())));

    let lenient = Injector::new(false);
    assert_eq!(
        lenient.invoke(&body, &Value::Undefined, None).unwrap(),
        Value::from(0)
    );

    let strict = Injector::new(true);
    let err = strict.invoke(&body, &Value::Undefined, None).unwrap_err();
    assert!(matches!(err, Error::Injection(_)));
    assert!(err.to_string().contains("strict mode"));
}

#[test]
fn annotate_rejects_non_string_tokens() {
    let injector = Injector::new(false);
    let value = Value::array(vec![
        Value::from(1),
        Value::function("f", |_, _| Ok(Value::Undefined)),
    ]);
    let injectable = Injectable::from_value(&value).unwrap();

    let err = injector.annotate(&injectable).unwrap_err();
    assert!(err
        .to_string()
        .contains("Incorrect injection token! Expected service name as string, got 1"));
}

#[test]
fn from_value_reads_inject_property() {
    let func = Value::function("f", |_, args| Ok(args[0].clone()));
    func.as_function()
        .unwrap()
        .props()
        .set("$inject", Value::array(vec![Value::from("a")]));
    let injectable = Injectable::from_value(&func).unwrap();

    let injector = Injector::new(true);
    injector.provide().value("a", Value::from("found")).unwrap();
    assert_eq!(
        injector.invoke(&injectable, &Value::Undefined, None).unwrap(),
        Value::from("found")
    );
}

#[test]
fn from_value_rejects_non_functions() {
    let err = Injectable::from_value(&Value::from(3)).unwrap_err();
    assert!(err.to_string().contains("is not a function"));
}

#[test]
fn unknown_provider_reports_path() {
    let injector = Injector::new(false);
    let err = injector.get("x").unwrap_err();
    assert_eq!(err.to_string(), "Unknown provider: xProvider <- x");

    injector
        .provide()
        .factory("y", Injectable::new(&["x"], |_| Ok(Value::Null)), true)
        .unwrap();
    let err = injector.get("y").unwrap_err();
    assert_eq!(err.to_string(), "Unknown provider: xProvider <- x <- y");
}

#[test]
fn circular_dependency_reports_path() {
    let injector = Injector::new(false);
    let provide = injector.provide();
    for (key, dep) in [("a", "b"), ("b", "c"), ("c", "a")] {
        provide
            .factory(key, Injectable::new(&[dep], |args| Ok(args[0].clone())), true)
            .unwrap();
    }

    let err = injector.get("a").unwrap_err();
    assert!(matches!(err, Error::CircularDependency { .. }));
    assert_eq!(
        err.to_string(),
        "Circular dependency found: a <- c <- b <- a"
    );
}

#[test]
fn failed_factory_is_retried() {
    let injector = Injector::new(false);
    let calls = Rc::new(Cell::new(0));
    let counted = Rc::clone(&calls);
    injector
        .provide()
        .factory(
            "flaky",
            Injectable::new(&[], move |_| {
                counted.set(counted.get() + 1);
                Err(Error::host("boom"))
            }),
            true,
        )
        .unwrap();

    let first = injector.get("flaky").unwrap_err();
    let second = injector.get("flaky").unwrap_err();
    assert_eq!(first.to_string(), "boom");
    assert_eq!(second.to_string(), "boom");
    assert_eq!(calls.get(), 2);
}

#[test]
fn factory_must_return_value() {
    let injector = Injector::new(false);
    let provide = injector.provide();
    provide
        .factory("empty", constant(Value::Undefined), true)
        .unwrap();
    provide
        .factory("allowed", constant(Value::Undefined), false)
        .unwrap();

    let err = injector.get("empty").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Provider 'empty' must return a value from $get factory method"
    );
    assert_eq!(injector.get("allowed").unwrap(), Value::Undefined);
}

#[test]
fn provider_requires_get() {
    let injector = Injector::new(false);
    let err = injector
        .provide()
        .provider("broken", &Value::object([("other", Value::Null)]))
        .unwrap_err();
    assert!(matches!(err, Error::Registration(_)));
}

#[test]
fn repeated_registration_collects_all() {
    let injector = Injector::new(false);
    let provide = injector.provide();
    provide.value("x", Value::from(1)).unwrap();
    provide.value("x", Value::from(2)).unwrap();
    provide.factory("x", constant(Value::from(3)), true).unwrap();

    assert_eq!(
        injector.get("x").unwrap(),
        Value::array(vec![Value::from(1), Value::from(2), Value::from(3)])
    );
}

#[test]
fn service_is_instantiated_once() {
    let injector = Injector::new(false);
    let provide = injector.provide();
    provide.value("a", Value::from(1)).unwrap();
    provide
        .service(
            "svc",
            Injectable::method(&["a"], |this, args| {
                this.set_member("value", args[0].clone())?;
                Ok(Value::Undefined)
            }),
        )
        .unwrap();

    let first = injector.get("svc").unwrap();
    let second = injector.get("svc").unwrap();
    assert_eq!(first.get_member("value"), Value::from(1));
    assert!(first.same_value(&second));
}

#[test]
fn decorator_wraps_delegate() {
    let injector = Injector::new(false);
    let provide = injector.provide();
    provide
        .factory("greeting", constant(Value::from("hello")), true)
        .unwrap();
    provide
        .decorator(
            "greeting",
            Injectable::new(&["$delegate"], |args| {
                Ok(Value::from(format!("{} world", args[0].to_display_string())))
            }),
        )
        .unwrap();

    assert_eq!(injector.get("greeting").unwrap(), Value::from("hello world"));
}

#[test]
fn has_own_property_is_reserved() {
    let injector = Injector::new(false);
    let err = injector
        .provide()
        .value("hasOwnProperty", Value::Null)
        .unwrap_err();
    assert!(err.to_string().contains("hasOwnProperty is not a valid service name"));

    let registry = ModuleRegistry::new();
    let err = registry.module("hasOwnProperty", &[]).unwrap_err();
    assert!(err.to_string().contains("hasOwnProperty is not a valid module name"));
}

// Modules

#[test]
fn constants_are_hoisted() {
    let registry = ModuleRegistry::new();
    let app = registry.module("app", &[]).unwrap();
    let constructor = Injectable::method(&["limit"], |this, args| {
        let limit = args[0].clone();
        this.set_member(
            "$get",
            Injectable::new(&[], move |_| Ok(limit.clone())).to_value(),
        )?;
        Ok(Value::Undefined)
    });
    app.provider("capped", constructor.to_value())
        .constant("limit", Value::from(5));

    let injector = load(&registry, &["app"]).unwrap();
    assert_eq!(injector.get("capped").unwrap(), Value::from(5));
    assert_eq!(injector.get("limit").unwrap(), Value::from(5));
}

#[test]
fn config_runs_before_run_blocks() {
    let registry = ModuleRegistry::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let app = registry.module("app", &[]).unwrap();
    app.run(logging(&log, "run"))
        .config(logging(&log, "config"));

    load(&registry, &["app"]).unwrap();
    assert_eq!(*log.borrow(), vec!["config".to_string(), "run".to_string()]);
}

#[test]
fn config_sees_constants_only() {
    let registry = ModuleRegistry::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&seen);
    let app = registry.module("app", &[]).unwrap();
    app.constant("limit", Value::from(5))
        .value("plain", Value::from(1))
        .config(Injectable::new(&["limit"], move |args| {
            record.borrow_mut().push(args[0].clone());
            Ok(Value::Undefined)
        }));
    load(&registry, &["app"]).unwrap();
    assert_eq!(*seen.borrow(), vec![Value::from(5)]);

    let failing = registry.module("failing", &[]).unwrap();
    failing
        .value("plain", Value::from(1))
        .config(Injectable::new(&["plain"], |_| Ok(Value::Undefined)));
    let err = load(&registry, &["failing"]).unwrap_err();
    assert!(matches!(err, Error::UnknownProvider { .. }));
}

#[test]
fn required_modules_load_first_and_once() {
    let registry = ModuleRegistry::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    registry
        .module("app", &["left", "right"])
        .unwrap()
        .run(logging(&log, "app"));
    registry
        .module("left", &["core"])
        .unwrap()
        .run(logging(&log, "left"));
    registry
        .module("right", &["core"])
        .unwrap()
        .run(logging(&log, "right"));
    registry
        .module("core", &[])
        .unwrap()
        .run(logging(&log, "core"));

    load(&registry, &["app"]).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            "core".to_string(),
            "left".to_string(),
            "right".to_string(),
            "app".to_string()
        ]
    );
}

#[test]
fn missing_module_is_an_error() {
    let registry = ModuleRegistry::new();
    registry.module("app", &["ghost"]).unwrap();

    let err = load(&registry, &["app"]).unwrap_err();
    assert_eq!(err.to_string(), "Module 'ghost' is not available");
    assert!(registry.get_module("ghost").is_err());
    assert!(registry.has_module("app"));
}

#[test]
fn module_redefinition_replaces() {
    let registry = ModuleRegistry::new();
    registry
        .module("app", &[])
        .unwrap()
        .value("a", Value::from(1));
    registry
        .module("app", &[])
        .unwrap()
        .value("b", Value::from(2));

    let injector = load(&registry, &["app"]).unwrap();
    assert!(!injector.has("a"));
    assert_eq!(injector.get("b").unwrap(), Value::from(2));
    assert_eq!(registry.names().len(), 1);
}

#[test]
fn builtin_services_are_injectable() {
    let registry = ModuleRegistry::new();
    let seen = Rc::new(RefCell::new(None));
    let record = Rc::clone(&seen);
    registry
        .module("app", &[])
        .unwrap()
        .config(Injectable::new(&["$provide"], |args| {
            let provide = args[0].as_host::<Provide>().unwrap();
            provide.value("late", Value::from(7))?;
            Ok(Value::Undefined)
        }))
        .run(Injectable::new(&["$injector"], move |args| {
            let injector = injector_arg(args)?;
            *record.borrow_mut() = Some(injector.get("late")?);
            Ok(Value::Undefined)
        }));

    load(&registry, &["app"]).unwrap();
    assert_eq!(*seen.borrow(), Some(Value::from(7)));
}

#[test]
fn inline_config_specs_run() {
    let registry = ModuleRegistry::new();
    let specs = [ModuleSpec::from(Injectable::new(&["$provide"], |args| {
        let provide = args[0].as_host::<Provide>().unwrap();
        provide.constant("mode", Value::from("test"))?;
        Ok(Value::Undefined)
    }))];

    let injector = create_injector(&registry, &specs, true).unwrap();
    assert!(injector.is_strict());
    assert_eq!(injector.get("mode").unwrap(), Value::from("test"));
}

#[test]
fn filters_register_with_filter_provider() {
    let registry = ModuleRegistry::new();
    let names = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&names);
    let filter_provider = Value::object([
        (
            "register",
            Value::function("register", move |_, args| {
                record.borrow_mut().push(args[0].to_display_string());
                Ok(Value::Undefined)
            }),
        ),
        ("$get", constant(Value::Null).to_value()),
    ]);
    registry
        .module("app", &[])
        .unwrap()
        .provider("$filter", filter_provider)
        .filter("shout", constant(Value::Null));

    load(&registry, &["app"]).unwrap();
    assert_eq!(*names.borrow(), vec!["shout".to_string()]);
}

#[test]
fn module_decorators_apply_in_order() {
    let registry = ModuleRegistry::new();
    let suffix = |tail: &'static str| {
        Injectable::new(&["$delegate"], move |args| {
            Ok(Value::from(format!("{}{tail}", args[0].to_display_string())))
        })
    };
    registry
        .module("app", &[])
        .unwrap()
        .decorator("word", suffix("-1"))
        .value("word", Value::from("w"))
        .decorator("word", suffix("-2"));

    let injector = load(&registry, &["app"]).unwrap();
    assert_eq!(injector.get("word").unwrap(), Value::from("w-1-2"));
}
