//! AAS Application - Session store and ports
//!
//! This crate defines the application layer with:
//! - Port traits (interfaces for the identity client and URL resolution)
//! - The authentication session store
//! - Application-level error handling

pub mod auth;
pub mod error;
pub mod ports;

pub use auth::{AuthEvent, AuthSession, Authentication, PendingInit, TokenStatus};
pub use error::{ApplicationError, ApplicationResult};
pub use ports::{AasResolver, Clock, IdentityClient, IdentityClientFactory, TokenExpiredHook};
