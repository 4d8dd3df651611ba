//! AAS Domain - Core authentication types
//!
//! This crate defines the domain model of the AAS authentication session.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod claims;
pub mod config;
pub mod error;
pub mod init;
pub mod session;

pub use auth::{AuthError, TokenSet};
pub use claims::{RealmAccess, ResourceAccess, TokenClaims, UserInfo};
pub use config::{AuthConfig, PartialAuthConfig, StaticConfig};
pub use error::{DomainError, DomainResult};
pub use init::{Flow, InitOptions, InitStatus, OnLoad};
pub use session::SessionSnapshot;
