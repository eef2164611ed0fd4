//! Modules and injector construction.
//!
//! A [`ModuleRegistry`] is created once by the host and passed to
//! [`create_injector`]. Modules queue registrations; nothing runs until an
//! injector loads them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tessel_ir::{Error, Result, Value};
use tracing::debug;

use crate::injectable::Injectable;
use crate::injector::Injector;

/// A queued provider-tier call.
#[derive(Clone, Debug)]
enum Registration {
    Constant(Rc<str>, Value),
    Provider(Rc<str>, Value),
    Factory(Rc<str>, Injectable, bool),
    Service(Rc<str>, Injectable),
    Value(Rc<str>, Value),
    Decorator(Rc<str>, Injectable),
    /// Call `method` on the provider registered as `provider`.
    Invoke {
        provider: Rc<str>,
        method: Rc<str>,
        args: Vec<Value>,
    },
    Config(Injectable),
}

#[derive(Default)]
struct Queues {
    constants: Vec<Registration>,
    invoke: Vec<Registration>,
    config: Vec<Registration>,
    run: Vec<Injectable>,
}

struct ModuleData {
    name: Rc<str>,
    requires: Vec<Rc<str>>,
    queues: RefCell<Queues>,
}

/// A named bundle of registrations. Clones share the same queues.
///
/// Constants are applied first, then providers, factories, services and
/// values in registration order, then config blocks and decorators in
/// registration order. Run blocks wait until every module has loaded.
#[derive(Clone)]
pub struct Module(Rc<ModuleData>);

impl Module {
    fn new(name: &str, requires: &[&str]) -> Self {
        Module(Rc::new(ModuleData {
            name: Rc::from(name),
            requires: requires.iter().map(|r| Rc::from(*r)).collect(),
            queues: RefCell::default(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Modules loaded before this one.
    pub fn requires(&self) -> &[Rc<str>] {
        &self.0.requires
    }

    fn queue(&self, registration: Registration) -> &Self {
        let mut queues = self.0.queues.borrow_mut();
        match registration {
            Registration::Constant(..) => queues.constants.push(registration),
            Registration::Decorator(..) | Registration::Config(_) => {
                queues.config.push(registration);
            }
            _ => queues.invoke.push(registration),
        }
        self
    }

    pub fn constant(&self, key: &str, value: Value) -> &Self {
        self.queue(Registration::Constant(Rc::from(key), value))
    }

    pub fn provider(&self, key: &str, provider: Value) -> &Self {
        self.queue(Registration::Provider(Rc::from(key), provider))
    }

    pub fn factory(&self, key: &str, factory: Injectable) -> &Self {
        self.queue(Registration::Factory(Rc::from(key), factory, true))
    }

    /// Factory allowed to produce `undefined`.
    pub fn factory_unchecked(&self, key: &str, factory: Injectable) -> &Self {
        self.queue(Registration::Factory(Rc::from(key), factory, false))
    }

    pub fn service(&self, key: &str, constructor: Injectable) -> &Self {
        self.queue(Registration::Service(Rc::from(key), constructor))
    }

    pub fn value(&self, key: &str, value: Value) -> &Self {
        self.queue(Registration::Value(Rc::from(key), value))
    }

    pub fn decorator(&self, key: &str, decorator: Injectable) -> &Self {
        self.queue(Registration::Decorator(Rc::from(key), decorator))
    }

    /// Register a filter factory with `$filterProvider`.
    pub fn filter(&self, name: &str, factory: Injectable) -> &Self {
        self.queue(Registration::Invoke {
            provider: Rc::from("$filterProvider"),
            method: Rc::from("register"),
            args: vec![Value::from(name), factory.to_value()],
        })
    }

    /// Block run on the provider tier while the module loads.
    pub fn config(&self, block: Injectable) -> &Self {
        self.queue(Registration::Config(block))
    }

    /// Block run on the instance tier once every module has loaded.
    pub fn run(&self, block: Injectable) -> &Self {
        self.0.queues.borrow_mut().run.push(block);
        self
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.0.name)
            .field("requires", &self.0.requires)
            .finish_non_exhaustive()
    }
}

/// Name-to-module table.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RefCell<IndexMap<Rc<str>, Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) the module `name`.
    pub fn module(&self, name: &str, requires: &[&str]) -> Result<Module> {
        if name == "hasOwnProperty" {
            return Err(Error::Registration(
                "hasOwnProperty is not a valid module name".to_string(),
            ));
        }
        let module = Module::new(name, requires);
        self.modules
            .borrow_mut()
            .insert(Rc::from(name), module.clone());
        debug!(name, ?requires, "module created");
        Ok(module)
    }

    /// Look up an existing module.
    pub fn get_module(&self, name: &str) -> Result<Module> {
        self.modules
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Module {
                name: name.to_string(),
            })
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.borrow().contains_key(name)
    }

    /// Registered module names, in creation order.
    pub fn names(&self) -> Vec<Rc<str>> {
        self.modules.borrow().keys().cloned().collect()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

/// What to load into an injector: a registered module or an inline config
/// block.
#[derive(Clone, Debug)]
pub enum ModuleSpec {
    Name(Rc<str>),
    Config(Injectable),
}

impl From<&str> for ModuleSpec {
    fn from(name: &str) -> Self {
        ModuleSpec::Name(Rc::from(name))
    }
}

impl From<Injectable> for ModuleSpec {
    fn from(block: Injectable) -> Self {
        ModuleSpec::Config(block)
    }
}

/// Build an injector from `modules`.
///
/// Each module loads once, after the modules it requires. Run blocks of
/// every loaded module execute, in load order, once all modules are in.
pub fn create_injector(
    registry: &ModuleRegistry,
    modules: &[ModuleSpec],
    strict: bool,
) -> Result<Injector> {
    let injector = Injector::new(strict);
    let mut loader = Loader {
        registry,
        injector: &injector,
        loaded: FxHashSet::default(),
        run_blocks: Vec::new(),
    };
    loader.load_all(modules)?;
    let run_blocks = loader.run_blocks;
    for block in &run_blocks {
        injector.invoke(block, &Value::Undefined, None)?;
    }
    debug!(modules = modules.len(), strict, "injector created");
    Ok(injector)
}

struct Loader<'a> {
    registry: &'a ModuleRegistry,
    injector: &'a Injector,
    loaded: FxHashSet<Rc<str>>,
    run_blocks: Vec<Injectable>,
}

impl Loader<'_> {
    fn load_all(&mut self, modules: &[ModuleSpec]) -> Result<()> {
        for spec in modules {
            match spec {
                ModuleSpec::Name(name) => self.load(name)?,
                ModuleSpec::Config(block) => {
                    self.injector
                        .provider_injector()
                        .invoke(block, &Value::Undefined, None)?;
                }
            }
        }
        Ok(())
    }

    fn load(&mut self, name: &Rc<str>) -> Result<()> {
        if !self.loaded.insert(Rc::clone(name)) {
            return Ok(());
        }
        let module = self.registry.get_module(name)?;
        let requires: Vec<ModuleSpec> = module
            .requires()
            .iter()
            .map(|r| ModuleSpec::Name(Rc::clone(r)))
            .collect();
        self.load_all(&requires)?;

        debug!(module = &**name, "loading module");
        let (constants, invoke, config, run) = {
            let queues = module.0.queues.borrow();
            (
                queues.constants.clone(),
                queues.invoke.clone(),
                queues.config.clone(),
                queues.run.clone(),
            )
        };
        for registration in constants.iter().chain(&invoke).chain(&config) {
            self.apply(registration)?;
        }
        self.run_blocks.extend(run);
        Ok(())
    }

    fn apply(&self, registration: &Registration) -> Result<()> {
        let provide = self.injector.provide();
        match registration {
            Registration::Constant(key, value) => provide.constant(key, value.clone()),
            Registration::Provider(key, provider) => provide.provider(key, provider).map(drop),
            Registration::Factory(key, factory, enforce) => {
                provide.factory(key, factory.clone(), *enforce).map(drop)
            }
            Registration::Service(key, constructor) => {
                provide.service(key, constructor.clone()).map(drop)
            }
            Registration::Value(key, value) => provide.value(key, value.clone()).map(drop),
            Registration::Decorator(key, decorator) => provide.decorator(key, decorator.clone()),
            Registration::Invoke {
                provider,
                method,
                args,
            } => {
                let target = self.injector.provider_injector().get(provider)?;
                let Value::Function(func) = target.get_member(method) else {
                    return Err(Error::Injection(format!(
                        "{provider} has no method '{method}'"
                    )));
                };
                func.call(&target, args).map(drop)
            }
            Registration::Config(block) => self
                .injector
                .provider_injector()
                .invoke(block, &Value::Undefined, None)
                .map(drop),
        }
    }
}
