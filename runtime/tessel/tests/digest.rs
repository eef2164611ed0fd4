#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Scopes driven through a bootstrapped runtime.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use tessel::inject::ModuleRegistry;
use tessel::ir::{Error, Result, Value};
use tessel::scope::Scope;
use tessel::{bootstrap, Runtime, RuntimeConfig};

fn runtime() -> Runtime {
    bootstrap(&ModuleRegistry::new(), &[], &RuntimeConfig::default()).unwrap()
}

fn record_into(
    log: &Rc<RefCell<Vec<Value>>>,
) -> impl Fn(&Value, &Value, &Scope) -> Result<()> + 'static {
    let log = Rc::clone(log);
    move |new, _, _| {
        log.borrow_mut().push(new.clone());
        Ok(())
    }
}

#[test]
fn apply_on_a_child_writes_locally() {
    let runtime = runtime();
    let root = runtime.root_scope();
    let child = root.new_child();
    let root_log = Rc::new(RefCell::new(Vec::new()));
    let child_log = Rc::new(RefCell::new(Vec::new()));
    root.watch_str("count", record_into(&root_log), false).unwrap();
    child.watch_str("count", record_into(&child_log), false).unwrap();

    root.set("count", Value::from(0));
    child.apply_str("count = 1").unwrap();

    assert_eq!(*root_log.borrow(), vec![Value::from(0)]);
    assert_eq!(*child_log.borrow(), vec![Value::from(1)]);
    assert_eq!(root.get("count"), Value::from(0));
}

#[test]
fn apply_async_waits_for_the_browser() {
    let runtime = runtime();
    let root = runtime.root_scope();
    let log = Rc::new(RefCell::new(Vec::new()));
    root.watch_str("n", record_into(&log), false).unwrap();

    let expr = runtime.parse("n = 2").unwrap();
    root.apply_async(expr.clone());
    root.apply_async(expr);
    assert!(log.borrow().is_empty());
    assert_eq!(runtime.browser().pending(), 1);

    runtime.flush();
    assert_eq!(*log.borrow(), vec![Value::from(2)]);
}

#[test]
fn eval_async_schedules_a_digest() {
    let runtime = runtime();
    let root = runtime.root_scope();
    let log = Rc::new(RefCell::new(Vec::new()));
    root.watch_str("flag", record_into(&log), false).unwrap();

    root.eval_async(runtime.parse("flag = true").unwrap());
    assert_eq!(runtime.flush(), 1);
    assert_eq!(*log.borrow(), vec![Value::Bool(true)]);
}

#[test]
fn unstable_watch_hits_the_digest_limit() {
    let registry = ModuleRegistry::new();
    let config = RuntimeConfig::builder().digest_ttl(4).build();
    let runtime = bootstrap(&registry, &[], &config).unwrap();
    let root = runtime.root_scope();
    root.set("n", Value::from(0));
    root.watch_str(
        "n",
        |_, _, scope| scope.eval_str("n = n + 1", None).map(drop),
        false,
    )
    .unwrap();

    let err = root.digest().unwrap_err();
    assert!(matches!(err, Error::DigestLimit { ttl: 4 }));
    assert_eq!(err.to_string(), "4 digest limit reached");
}

#[test]
fn parse_is_cached_across_the_runtime() {
    let runtime = runtime();
    let first = runtime.parse("a + b").unwrap();
    let second = runtime.parse("  a + b  ").unwrap();
    assert!(first.ptr_eq(&second));
}

#[test]
fn sandbox_rejects_dangerous_members() {
    let runtime = runtime();
    let err = runtime.parse("obj.constructor").unwrap_err();
    assert!(matches!(err, Error::Security(_)));
}

#[test]
fn events_cross_scope_boundaries() {
    let runtime = runtime();
    let root = runtime.root_scope();
    let child = root.new_child();
    let heard = Rc::new(RefCell::new(Vec::new()));

    let up = Rc::clone(&heard);
    root.on("saved", move |event, args| {
        let from_child = !event.target_scope().is_root();
        up.borrow_mut()
            .push(format!("root:{}:{from_child}", args[0].to_display_string()));
        Ok(())
    });
    let down = Rc::clone(&heard);
    child.on("reset", move |_, _| {
        down.borrow_mut().push("child:reset".to_string());
        Ok(())
    });

    child.emit("saved", &[Value::from("doc")]);
    root.broadcast("reset", &[]);

    assert_eq!(
        *heard.borrow(),
        vec!["root:doc:true".to_string(), "child:reset".to_string()]
    );
}
