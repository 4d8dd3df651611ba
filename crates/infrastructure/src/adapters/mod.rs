//! Infrastructure adapters

mod location_resolver;
mod static_resolver;
mod system_clock;

pub use location_resolver::{DEFAULT_AAS_CONNECTION, DEFAULT_WITHIN_SECS, LocationServiceResolver};
pub use static_resolver::StaticResolver;
pub use system_clock::SystemClock;
