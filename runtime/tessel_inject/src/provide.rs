//! Provider-tier registration, the `$provide` service.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tessel_ir::{Error, FunctionRef, Result, Value};
use tracing::debug;

use crate::injectable::Injectable;
use crate::injector::{injector_arg, Injector, Slot, PROVIDER_SUFFIX};

/// Registers constants and providers on an injector.
#[derive(Clone)]
pub struct Provide {
    providers: Injector,
}

fn ensure_valid_key(key: &str) -> Result<()> {
    if key == "hasOwnProperty" {
        return Err(Error::Registration(
            "hasOwnProperty is not a valid service name".to_string(),
        ));
    }
    Ok(())
}

impl Provide {
    pub(crate) fn new(providers: Injector) -> Self {
        Provide { providers }
    }

    /// Value available on both tiers, so config blocks can inject it.
    pub fn constant(&self, key: &str, value: Value) -> Result<()> {
        ensure_valid_key(key)?;
        let shared = &self.providers.shared;
        shared
            .provider_cache
            .borrow_mut()
            .insert(Rc::from(key), Slot::Ready(value.clone()));
        shared
            .instance_cache
            .borrow_mut()
            .insert(Rc::from(key), Slot::Ready(value));
        debug!(key, "registered constant");
        Ok(())
    }

    /// Register a provider: an object with a `$get` injectable, or a
    /// constructor (array-style or function) instantiated on the provider
    /// tier to produce one.
    ///
    /// A second provider under the same key does not replace the first: the
    /// service then resolves to an array of every provider's `$get` result,
    /// in registration order.
    pub fn provider(&self, key: &str, provider: &Value) -> Result<Value> {
        ensure_valid_key(key)?;
        let provider = match provider {
            Value::Function(_) | Value::Array(_) => {
                let constructor = Injectable::from_value(provider)?;
                self.providers.instantiate(&constructor, None)?
            }
            other => other.clone(),
        };
        if provider.get_member("$get").is_undefined() {
            return Err(Error::Registration(format!(
                "Provider '{key}' must define $get factory method"
            )));
        }

        let provider_key: Rc<str> = Rc::from(format!("{key}{PROVIDER_SUFFIX}"));
        let registered = {
            let mut providers = self.providers.shared.providers.borrow_mut();
            let list = providers.entry(Rc::clone(&provider_key)).or_default();
            list.borrow_mut().push(provider.clone());
            Rc::clone(list)
        };
        let count = registered.borrow().len();
        if count <= 2 {
            let entry = if count == 1 {
                provider.clone()
            } else {
                combined_provider(registered)
            };
            self.providers
                .shared
                .provider_cache
                .borrow_mut()
                .insert(provider_key, Slot::Ready(entry));
        }
        debug!(key, providers = count, "registered provider");
        Ok(provider)
    }

    /// Register a factory. With enforcement, a factory returning
    /// `undefined` fails instead of caching it.
    pub fn factory(&self, key: &str, factory: Injectable, enforce: bool) -> Result<Value> {
        let getter = if enforce {
            enforce_return_value(key, factory)
        } else {
            factory
        };
        let provider = Value::object([("$get", getter.to_value())]);
        self.provider(key, &provider)
    }

    /// Register a fixed value.
    pub fn value(&self, key: &str, value: Value) -> Result<Value> {
        self.factory(key, Injectable::new(&[], move |_| Ok(value.clone())), false)
    }

    /// Register a constructor; the service is `instantiate(constructor)`.
    pub fn service(&self, key: &str, constructor: Injectable) -> Result<Value> {
        let getter = Injectable::new(&["$injector"], move |args| {
            let injector = injector_arg(args)?;
            injector.instantiate(&constructor, None)
        });
        self.factory(key, getter, true)
    }

    /// Wrap the service `key` once it is built.
    ///
    /// `decorator` is invoked with the original instance available as the
    /// local `$delegate`; its result becomes the service.
    pub fn decorator(&self, key: &str, decorator: Injectable) -> Result<()> {
        let provider = self
            .providers
            .get(&format!("{key}{PROVIDER_SUFFIX}"))?;
        let original = Injectable::from_value(&provider.get_member("$get"))?;
        let decorated = Injectable::method(&["$injector"], move |this, args| {
            let injector = injector_arg(args)?;
            let instance = injector.invoke(&original, this, None)?;
            let locals = Value::object([("$delegate", instance)]);
            injector.invoke(&decorator, &Value::Null, Some(&locals))
        });
        provider.set_member("$get", decorated.to_value())?;
        debug!(key, "registered decorator");
        Ok(())
    }
}

/// `$get` that fails when `factory` returns `undefined`.
fn enforce_return_value(key: &str, factory: Injectable) -> Injectable {
    let name = key.to_string();
    let tokens = factory.tokens().map(<[Value]>::to_vec);
    let func = FunctionRef::new("enforcedFactory", move |this, args| {
        let result = factory.function().call(this, args)?;
        if result.is_undefined() {
            return Err(Error::Factory { name: name.clone() });
        }
        Ok(result)
    });
    Injectable::from_parts(tokens, func)
}

/// Provider whose `$get` collects every registered provider's result.
fn combined_provider(registered: Rc<RefCell<Vec<Value>>>) -> Value {
    let getter = Injectable::new(&["$injector"], move |args| {
        let injector = injector_arg(args)?;
        let providers = registered.borrow().clone();
        let mut results = Vec::with_capacity(providers.len());
        for provider in &providers {
            let getter = Injectable::from_value(&provider.get_member("$get"))?;
            results.push(injector.invoke(&getter, provider, None)?);
        }
        Ok(Value::array(results))
    });
    Value::object([("$get", getter.to_value())])
}

impl fmt::Debug for Provide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provide").finish_non_exhaustive()
    }
}
