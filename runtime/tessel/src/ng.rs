//! The core `ng` module.
//!
//! Services: `$exceptionHandler`, `$browser`, `$filter`, `$parse` and
//! `$rootScope`. Providers with configuration hooks: `$filterProvider`
//! (`register(name, factory)`) and `$rootScopeProvider` (`digestTtl(n)`).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tessel_eval::{Filter, FilterRegistry, Parser};
use tessel_inject::{injector_arg, Injectable, Module, ModuleRegistry};
use tessel_ir::{Error, Result, Value};
use tessel_scope::{log_handler, Scope, SharedExceptionHandler, TaskQueue, DEFAULT_DIGEST_TTL};
use tracing::debug;

/// Name of the core module.
pub const NG_MODULE: &str = "ng";

/// Register the `ng` module in `registry`, replacing any previous one.
pub fn register_ng(registry: &ModuleRegistry) -> Result<Module> {
    let ng = registry.module(NG_MODULE, &[])?;
    ng.provider("$exceptionHandler", exception_handler_provider())
        .provider("$browser", browser_provider())
        .provider("$filter", filter_provider())
        .provider("$parse", parse_provider())
        .provider("$rootScope", root_scope_provider());
    Ok(ng)
}

/// Downcast the host value injected at `index`.
pub(crate) fn host_arg<T: Clone + 'static>(args: &[Value], index: usize, name: &str) -> Result<T> {
    args.get(index)
        .and_then(Value::as_host::<T>)
        .map(|host| (*host).clone())
        .ok_or_else(|| Error::Injection(format!("'{name}' is not the expected service")))
}

fn provider_of(getter: Injectable) -> Value {
    Value::object([("$get", getter.to_value())])
}

fn exception_handler_provider() -> Value {
    provider_of(Injectable::new(&[], |_| Ok(Value::host(log_handler()))))
}

fn browser_provider() -> Value {
    provider_of(Injectable::new(&[], |_| Ok(Value::host(TaskQueue::new()))))
}

/// `$filterProvider`: queues filter factories, invoked on the instance tier
/// when `$filter` is first built.
fn filter_provider() -> Value {
    let pending: Rc<RefCell<Vec<(Rc<str>, Injectable)>>> = Rc::default();

    let queue = Rc::clone(&pending);
    let register = Value::function("register", move |_, args| {
        let Some(Value::String(name)) = args.first() else {
            return Err(Error::Registration(
                "filter name must be a string".to_string(),
            ));
        };
        let factory = match args.get(1) {
            Some(value) => Injectable::from_value(value)?,
            None => return Err(Error::Registration(format!("filter '{name}' has no factory"))),
        };
        queue.borrow_mut().push((Rc::clone(name), factory));
        Ok(Value::Undefined)
    });

    let getter = Injectable::new(&["$injector"], move |args| {
        let injector = injector_arg(args)?;
        let registry = FilterRegistry::with_builtins();
        let factories = pending.borrow().clone();
        for (name, factory) in &factories {
            let Value::Function(func) = injector.invoke(factory, &Value::Undefined, None)? else {
                return Err(Error::Registration(format!(
                    "filter factory '{name}' must return a function"
                )));
            };
            let stateful = func
                .props()
                .get_own("$stateful")
                .is_some_and(|flag| flag.is_truthy());
            registry.register(name, Filter { func, stateful });
        }
        debug!(filters = factories.len(), "filters instantiated");
        Ok(Value::host(registry))
    });

    Value::object([("register", register), ("$get", getter.to_value())])
}

fn parse_provider() -> Value {
    provider_of(Injectable::new(&["$filter"], |args| {
        let filters: FilterRegistry = host_arg(args, 0, "$filter")?;
        Ok(Value::host(Parser::new(filters)))
    }))
}

/// `$rootScopeProvider`: `digestTtl(n)` sets the TTL (and returns it);
/// `$get` builds the root scope from the other core services.
fn root_scope_provider() -> Value {
    let ttl = Rc::new(Cell::new(DEFAULT_DIGEST_TTL));

    let setting = Rc::clone(&ttl);
    let digest_ttl = Value::function("digestTtl", move |_, args| {
        if let Some(value) = args.first() {
            let n = value.to_number();
            if !(n.is_finite() && n >= 1.0) {
                return Err(Error::type_error(format!(
                    "digestTtl expects a positive number, got {}",
                    value.to_display_string()
                )));
            }
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "checked finite and positive above"
            )]
            setting.set(n as usize);
        }
        Ok(Value::from(setting.get()))
    });

    let getter = Injectable::new(&["$exceptionHandler", "$parse", "$browser"], move |args| {
        let handler: SharedExceptionHandler = host_arg(args, 0, "$exceptionHandler")?;
        let parser: Parser = host_arg(args, 1, "$parse")?;
        let browser: TaskQueue = host_arg(args, 2, "$browser")?;
        let root = Scope::builder()
            .digest_ttl(ttl.get())
            .exception_handler(handler)
            .parser(parser)
            .deferrer(browser)
            .build();
        Ok(Value::host(root))
    });

    Value::object([("digestTtl", digest_ttl), ("$get", getter.to_value())])
}
