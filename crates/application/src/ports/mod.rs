//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod aas_resolver;
mod clock;
mod identity_client;

pub use aas_resolver::AasResolver;
pub use clock::Clock;
pub use identity_client::{IdentityClient, IdentityClientFactory, TokenExpiredHook};
