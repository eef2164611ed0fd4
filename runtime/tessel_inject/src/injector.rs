//! Two-tier injector.
//!
//! The provider tier holds provider objects under `<key>Provider` plus
//! constants; the instance tier holds the services built from them. An
//! instance lookup that misses asks the provider tier for `<key>Provider`
//! and invokes its `$get`. Both tiers share one resolution path, so a cycle
//! is detected however deep the nesting goes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tessel_ir::{Error, ObjectRef, Result, Value};
use tracing::{debug, trace};

use crate::injectable::Injectable;
use crate::provide::Provide;

pub(crate) const PROVIDER_SUFFIX: &str = "Provider";

/// Cache entry. `Instantiating` marks a key whose factory is running.
#[derive(Clone)]
pub(crate) enum Slot {
    Instantiating,
    Ready(Value),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Tier {
    Provider,
    Instance,
}

pub(crate) struct InjectorShared {
    pub(crate) provider_cache: RefCell<FxHashMap<Rc<str>, Slot>>,
    pub(crate) instance_cache: RefCell<FxHashMap<Rc<str>, Slot>>,
    /// Keys being resolved, innermost first.
    path: RefCell<Vec<Rc<str>>>,
    /// Providers registered under each key, in registration order.
    pub(crate) providers: RefCell<FxHashMap<Rc<str>, Rc<RefCell<Vec<Value>>>>>,
    strict: bool,
}

/// Handle to one tier of an injector. Clones share the same caches.
#[derive(Clone)]
pub struct Injector {
    pub(crate) shared: Rc<InjectorShared>,
    tier: Tier,
}

impl Injector {
    /// Empty injector; returns the instance tier. With `strict`, unannotated
    /// injectables are rejected.
    pub fn new(strict: bool) -> Injector {
        let shared = Rc::new(InjectorShared {
            provider_cache: RefCell::default(),
            instance_cache: RefCell::default(),
            path: RefCell::default(),
            providers: RefCell::default(),
            strict,
        });
        Injector {
            shared,
            tier: Tier::Instance,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.shared.strict
    }

    /// Whether this handle is the provider tier.
    pub fn is_provider_tier(&self) -> bool {
        self.tier == Tier::Provider
    }

    pub fn provider_injector(&self) -> Injector {
        Injector {
            shared: Rc::clone(&self.shared),
            tier: Tier::Provider,
        }
    }

    pub fn instance_injector(&self) -> Injector {
        Injector {
            shared: Rc::clone(&self.shared),
            tier: Tier::Instance,
        }
    }

    /// Registration API, the `$provide` service.
    pub fn provide(&self) -> Provide {
        Provide::new(self.provider_injector())
    }

    fn cache(&self) -> &RefCell<FxHashMap<Rc<str>, Slot>> {
        match self.tier {
            Tier::Provider => &self.shared.provider_cache,
            Tier::Instance => &self.shared.instance_cache,
        }
    }

    /// Resolve `key` on this tier, building and caching it on first use.
    pub fn get(&self, key: &str) -> Result<Value> {
        if key == "$injector" {
            return Ok(Value::host(self.clone()));
        }
        if key == "$provide" && self.tier == Tier::Provider {
            return Ok(Value::host(self.provide()));
        }

        let cached = self.cache().borrow().get(key).cloned();
        match cached {
            Some(Slot::Ready(value)) => return Ok(value),
            Some(Slot::Instantiating) => {
                let mut path = vec![key.to_string()];
                path.extend(self.shared.path.borrow().iter().map(ToString::to_string));
                return Err(Error::CircularDependency { path });
            }
            None => {}
        }

        let key: Rc<str> = Rc::from(key);
        trace!(key = &*key, tier = ?self.tier, "resolving");
        self.shared.path.borrow_mut().insert(0, Rc::clone(&key));
        self.cache()
            .borrow_mut()
            .insert(Rc::clone(&key), Slot::Instantiating);

        let result = self.build(&key);
        match &result {
            Ok(value) => {
                self.cache()
                    .borrow_mut()
                    .insert(Rc::clone(&key), Slot::Ready(value.clone()));
                if self.tier == Tier::Instance {
                    debug!(key = &*key, "instantiated service");
                }
            }
            Err(_) => {
                let mut cache = self.cache().borrow_mut();
                if matches!(cache.get(&*key), Some(Slot::Instantiating)) {
                    cache.remove(&*key);
                }
            }
        }
        self.shared.path.borrow_mut().remove(0);
        result
    }

    fn build(&self, key: &str) -> Result<Value> {
        match self.tier {
            Tier::Provider => Err(Error::UnknownProvider {
                path: self
                    .shared
                    .path
                    .borrow()
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            }),
            Tier::Instance => {
                let provider = self
                    .provider_injector()
                    .get(&format!("{key}{PROVIDER_SUFFIX}"))?;
                let getter = Injectable::from_value(&provider.get_member("$get"))?;
                self.invoke(&getter, &provider, None)
            }
        }
    }

    /// Whether `key` is cached on this tier or has a provider.
    pub fn has(&self, key: &str) -> bool {
        if key == "$injector" || (key == "$provide" && self.tier == Tier::Provider) {
            return true;
        }
        self.cache().borrow().contains_key(key)
            || self
                .shared
                .provider_cache
                .borrow()
                .contains_key(format!("{key}{PROVIDER_SUFFIX}").as_str())
    }

    /// Dependency keys of `injectable`.
    pub fn annotate(&self, injectable: &Injectable) -> Result<Vec<Rc<str>>> {
        injectable.keys(self.shared.strict)
    }

    /// Call `injectable` with its dependencies. Keys present as own
    /// properties of `locals` are taken from there instead.
    pub fn invoke(
        &self,
        injectable: &Injectable,
        this: &Value,
        locals: Option<&Value>,
    ) -> Result<Value> {
        let keys = self.annotate(injectable)?;
        let mut args = Vec::with_capacity(keys.len());
        for key in &keys {
            let local = match locals {
                Some(Value::Object(locals)) => locals.get_own(key),
                _ => None,
            };
            match local {
                Some(value) => args.push(value),
                None => args.push(self.get(key)?),
            }
        }
        injectable.call(this, &args)
    }

    /// Call `injectable` as a constructor.
    ///
    /// A fresh object inheriting from the injectable's prototype is passed
    /// as `this`. A compound return value replaces it.
    pub fn instantiate(&self, injectable: &Injectable, locals: Option<&Value>) -> Result<Value> {
        let instance = Value::Object(ObjectRef::with_proto(injectable.prototype()));
        let result = self.invoke(injectable, &instance, locals)?;
        Ok(if result.is_compound() { result } else { instance })
    }
}

/// Recover the injector injected as the first argument (`["$injector", ...]`).
pub fn injector_arg(args: &[Value]) -> Result<Rc<Injector>> {
    args.first()
        .and_then(Value::as_host::<Injector>)
        .ok_or_else(|| Error::Injection("expected $injector as first argument".to_string()))
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("tier", &self.tier)
            .field("strict", &self.shared.strict)
            .field("providers", &self.shared.provider_cache.borrow().len())
            .field("instances", &self.shared.instance_cache.borrow().len())
            .finish()
    }
}
