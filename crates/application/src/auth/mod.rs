//! Authentication session for the AAS client.
//!
//! This module provides:
//! - The session store that builds, refreshes and adopts identity clients
//! - Events published when tokens are refreshed or refresh fails
//! - Token status for display

mod events;
mod session;
mod status;

pub use events::AuthEvent;
pub use session::{AuthSession, Authentication, PendingInit};
pub use status::{DEFAULT_REFRESH_BUFFER_SECONDS, TokenStatus};
