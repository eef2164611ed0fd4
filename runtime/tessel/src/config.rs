//! Runtime configuration consumed by [`bootstrap`](crate::bootstrap).

use tessel_scope::DEFAULT_DIGEST_TTL;

/// Settings applied when a runtime is bootstrapped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuntimeConfig {
    /// Maximum digest passes before `DigestLimit`.
    pub digest_ttl: usize,
    /// Reject injectables without explicit dependency tokens.
    pub strict_di: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            digest_ttl: DEFAULT_DIGEST_TTL,
            strict_di: false,
        }
    }
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    #[must_use]
    pub fn digest_ttl(mut self, ttl: usize) -> Self {
        self.config.digest_ttl = ttl;
        self
    }

    #[must_use]
    pub fn strict_di(mut self, strict: bool) -> Self {
        self.config.strict_di = strict;
        self
    }

    pub fn build(self) -> RuntimeConfig {
        self.config
    }
}
