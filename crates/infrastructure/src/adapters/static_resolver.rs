//! Fixed-value resolver

use aas_application::ports::AasResolver;

/// Resolver that always yields the same value.
///
/// Used when no location service is configured; `None` makes the session
/// fall back to its configured server URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticResolver(Option<String>);

impl StaticResolver {
    /// Resolver yielding `url`.
    #[must_use]
    pub fn new(url: Option<String>) -> Self {
        Self(url)
    }
}

impl AasResolver for StaticResolver {
    async fn resolve(&self) -> Option<String> {
        self.0.clone()
    }
}
