//! Tessel Inject - dependency injection for the Tessel runtime.
//!
//! An [`Injector`] has two tiers sharing one set of caches. The provider
//! tier holds constants and provider objects (keyed `<name>Provider`), the
//! instance tier holds the services their `$get` methods build. Services
//! are singletons per injector.
//!
//! Registrations are grouped into [`Module`]s held by a [`ModuleRegistry`];
//! [`create_injector`] loads them, resolving `requires` first.

mod injectable;
mod injector;
mod module;
mod provide;

pub use injectable::Injectable;
pub use injector::{injector_arg, Injector};
pub use module::{create_injector, Module, ModuleRegistry, ModuleSpec};
pub use provide::Provide;

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
