//! Tessel - a dependency-injected runtime with sandboxed expressions and
//! dirty-checked scopes.
//!
//! [`bootstrap`] loads the core `ng` module plus the application's modules
//! into an injector and builds the root scope. The engine crates are
//! re-exported for direct use.
//!
//! Enable logging with [`init_tracing`] and `RUST_LOG=tessel_scope=debug`.

mod config;
mod ng;

use std::sync::Once;

use tessel_eval::Expression;
use tessel_inject::{create_injector, Injectable, Injector, ModuleRegistry, ModuleSpec};
use tessel_ir::{Error, Result, Value};
use tessel_scope::{Scope, TaskQueue};
use tracing::debug;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use ng::{register_ng, NG_MODULE};

pub use tessel_eval as eval;
pub use tessel_inject as inject;
pub use tessel_ir as ir;
pub use tessel_lexer as lexer;
pub use tessel_parse as parse;
pub use tessel_scope as scope;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// A bootstrapped application: its injector and root scope.
#[derive(Clone, Debug)]
pub struct Runtime {
    injector: Injector,
    root_scope: Scope,
    browser: TaskQueue,
}

impl Runtime {
    /// Instance-tier injector.
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn root_scope(&self) -> &Scope {
        &self.root_scope
    }

    /// Task queue backing `eval_async` and `apply_async`.
    pub fn browser(&self) -> &TaskQueue {
        &self.browser
    }

    /// Resolve a service.
    pub fn get(&self, key: &str) -> Result<Value> {
        self.injector.get(key)
    }

    /// Parse with the runtime's `$parse` service.
    pub fn parse(&self, text: &str) -> Result<Expression> {
        self.root_scope.parser().parse(text)
    }

    /// Run every deferred task, including ones queued while flushing.
    pub fn flush(&self) -> usize {
        self.browser.flush()
    }
}

/// Load `ng` and `modules` from `registry` and build the root scope.
///
/// `ng` is registered on demand. `config.digest_ttl` is applied through
/// `$rootScopeProvider` before any application config block runs.
pub fn bootstrap(
    registry: &ModuleRegistry,
    modules: &[&str],
    config: &RuntimeConfig,
) -> Result<Runtime> {
    if !registry.has_module(NG_MODULE) {
        register_ng(registry)?;
    }

    let ttl = config.digest_ttl;
    let apply_config = Injectable::new(&["$rootScopeProvider"], move |args| {
        let provider = args.first().cloned().unwrap_or_default();
        let Value::Function(set_ttl) = provider.get_member("digestTtl") else {
            return Err(Error::Injection(
                "$rootScopeProvider has no digestTtl".to_string(),
            ));
        };
        set_ttl.call(&provider, &[Value::from(ttl)])
    });

    let mut specs = vec![ModuleSpec::from(NG_MODULE), ModuleSpec::from(apply_config)];
    specs.extend(modules.iter().map(|name| ModuleSpec::from(*name)));
    let injector = create_injector(registry, &specs, config.strict_di)?;

    let root_scope = ng::host_arg::<Scope>(&[injector.get("$rootScope")?], 0, "$rootScope")?;
    let browser = ng::host_arg::<TaskQueue>(&[injector.get("$browser")?], 0, "$browser")?;
    debug!(
        modules = modules.len(),
        ttl = root_scope.digest_ttl(),
        strict = config.strict_di,
        "runtime bootstrapped"
    );
    Ok(Runtime {
        injector,
        root_scope,
        browser,
    })
}
