//! AAS server URL resolution port

use std::future::Future;

/// Port for discovering the identity server's base URL.
///
/// Implementations swallow their own failures: a resolver that cannot
/// answer yields `None` and the caller falls back to static configuration.
pub trait AasResolver: Send + Sync {
    /// Resolves the AAS server URL, if one is registered.
    fn resolve(&self) -> impl Future<Output = Option<String>> + Send;
}
